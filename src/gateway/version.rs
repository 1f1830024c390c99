//! REST route for `thingapi.VersionRpc`: `GET /version`.

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tonic::transport::Channel;

use super::{outgoing, GatewayContext, GatewayError, JsonMarshaler};
use crate::http::response::StatusResponse;
use crate::proto::VersionRpcClient;

#[derive(Clone)]
struct VersionGateway {
    client: VersionRpcClient<Channel>,
    marshaler: JsonMarshaler,
}

pub fn register(context: &GatewayContext) -> Result<Router, GatewayError> {
    let state = VersionGateway {
        client: VersionRpcClient::new(context.channel()),
        marshaler: context.marshaler(),
    };
    Ok(Router::new().route("/version", get(version)).with_state(state))
}

async fn version(State(gateway): State<VersionGateway>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    let mut client = gateway.client.clone();
    match client.version(outgoing((), &parts.headers, &parts.extensions)).await {
        Ok(response) => gateway.marshaler.respond(response.get_ref()),
        Err(status) => StatusResponse(status).into_response(),
    }
}
