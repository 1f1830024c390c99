//! Error responses shared by the HTTP router and the gateway.
//!
//! # Responsibilities
//! - Map RPC status codes to HTTP status codes
//! - Render errors as a JSON body with the RPC code and message

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tonic::Code;

/// HTTP status used when an RPC outcome is returned over REST.
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        // 499 Client Closed Request
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::FailedPrecondition => StatusCode::BAD_REQUEST,
        Code::Aborted => StatusCode::CONFLICT,
        Code::OutOfRange => StatusCode::BAD_REQUEST,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON error body: `{"error": ..., "code": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: i32,
    pub message: String,
}

/// An RPC status rendered as an HTTP response.
#[derive(Debug)]
pub struct StatusResponse(pub tonic::Status);

impl From<tonic::Status> for StatusResponse {
    fn from(status: tonic::Status) -> Self {
        Self(status)
    }
}

impl IntoResponse for StatusResponse {
    fn into_response(self) -> Response {
        let status = self.0;
        let body = ErrorBody {
            error: status.message().to_string(),
            code: status.code() as i32,
            message: status.message().to_string(),
        };
        (http_status(status.code()), Json(body)).into_response()
    }
}

/// Body over the configured limit.
pub fn payload_too_large() -> Response {
    let body = ErrorBody {
        error: "Payload Too Large".to_string(),
        code: Code::InvalidArgument as i32,
        message: "request body exceeds the configured limit".to_string(),
    };
    (StatusCode::PAYLOAD_TOO_LARGE, Json(body)).into_response()
}

/// Fallback for paths no route or gateway handles.
pub async fn not_found() -> Response {
    StatusResponse(tonic::Status::not_found("Not Found")).into_response()
}
