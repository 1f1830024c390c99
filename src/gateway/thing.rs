//! REST routes for `thingapi.ThingRpc`.
//!
//! | HTTP | RPC |
//! |---|---|
//! | `GET /api/things` | `ThingFind` |
//! | `GET /api/things/{id}` | `ThingGet` |
//! | `POST /api/things` | `ThingSave` |
//! | `DELETE /api/things/{id}` | `ThingDelete` |
//! | `GET /api/stream/things` | `ThingFindStream`, one JSON object per line |

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::StreamExt;
use http::{header, HeaderValue, StatusCode};
use serde_json::json;
use tonic::transport::Channel;

use super::{outgoing, GatewayContext, GatewayError, JsonMarshaler};
use crate::http::request::is_body_too_large;
use crate::http::response::{http_status, payload_too_large, StatusResponse};
use crate::proto::{Thing, ThingId, ThingRpcClient};

#[derive(Clone)]
struct ThingGateway {
    client: ThingRpcClient<Channel>,
    marshaler: JsonMarshaler,
}

/// Gateway registration for the thing routes.
pub fn register(context: &GatewayContext) -> Result<Router, GatewayError> {
    let state = ThingGateway {
        client: ThingRpcClient::new(context.channel()),
        marshaler: context.marshaler(),
    };
    Ok(Router::new()
        .route("/api/things", get(find).post(save))
        .route("/api/things/{id}", get(get_one).delete(delete))
        .route("/api/stream/things", get(find_stream))
        .with_state(state))
}

async fn find(State(gateway): State<ThingGateway>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    let mut client = gateway.client.clone();
    match client.thing_find(outgoing((), &parts.headers, &parts.extensions)).await {
        Ok(response) => gateway.marshaler.respond(response.get_ref()),
        Err(status) => StatusResponse(status).into_response(),
    }
}

async fn get_one(State(gateway): State<ThingGateway>, Path(id): Path<String>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    let mut client = gateway.client.clone();
    match client
        .thing_get(outgoing(ThingId { id }, &parts.headers, &parts.extensions))
        .await
    {
        Ok(response) => gateway.marshaler.respond(response.get_ref()),
        Err(status) => StatusResponse(status).into_response(),
    }
}

async fn save(State(gateway): State<ThingGateway>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) if is_body_too_large(&e) => return payload_too_large(),
        Err(e) => return StatusResponse(tonic::Status::invalid_argument(e.to_string())).into_response(),
    };
    let thing: Thing = match gateway.marshaler.decode(&bytes) {
        Ok(thing) => thing,
        Err(e) => return StatusResponse(e.into_status()).into_response(),
    };

    let mut client = gateway.client.clone();
    match client.thing_save(outgoing(thing, &parts.headers, &parts.extensions)).await {
        Ok(response) => gateway.marshaler.respond(response.get_ref()),
        Err(status) => StatusResponse(status).into_response(),
    }
}

async fn delete(State(gateway): State<ThingGateway>, Path(id): Path<String>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    let mut client = gateway.client.clone();
    match client
        .thing_delete(outgoing(ThingId { id }, &parts.headers, &parts.extensions))
        .await
    {
        Ok(_) => (StatusCode::OK, Json(json!({}))).into_response(),
        Err(status) => StatusResponse(status).into_response(),
    }
}

async fn find_stream(State(gateway): State<ThingGateway>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    let mut client = gateway.client.clone();
    let stream = match client
        .thing_find_stream(outgoing((), &parts.headers, &parts.extensions))
        .await
    {
        Ok(response) => response.into_inner(),
        Err(status) => return StatusResponse(status).into_response(),
    };

    let marshaler = gateway.marshaler;
    // Ends after the first error line.
    let lines = futures_util::stream::unfold(Some(stream), move |state| async move {
        let mut stream = state?;
        match stream.message().await {
            Ok(Some(thing)) => Some((result_line(&marshaler, &thing), Some(stream))),
            Ok(None) => None,
            Err(status) => Some((error_line(&status), None)),
        }
    });

    (
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        Body::from_stream(lines.map(Ok::<_, Infallible>)),
    )
        .into_response()
}

fn result_line(marshaler: &JsonMarshaler, thing: &Thing) -> Bytes {
    match marshaler.to_value(thing) {
        Ok(value) => ndjson(&json!({ "result": value })),
        Err(e) => error_line(&tonic::Status::internal(e.to_string())),
    }
}

fn error_line(status: &tonic::Status) -> Bytes {
    let http = http_status(status.code());
    ndjson(&json!({
        "error": {
            "grpc_code": status.code() as i32,
            "http_code": http.as_u16(),
            "message": status.message(),
            "http_status": http.canonical_reason().unwrap_or_default(),
        }
    }))
}

fn ndjson(value: &serde_json::Value) -> Bytes {
    let mut line = value.to_string().into_bytes();
    line.push(b'\n');
    Bytes::from(line)
}
