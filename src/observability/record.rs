//! Request log records and the sinks that receive them.
//!
//! # Responsibilities
//! - Describe one logged call independently of how it is rendered
//! - Render records as tracing events in the configured field layout
//! - Collect records in memory for tests
//!
//! # Design Decisions
//! - Both layouts carry status, duration, remote, request ID and error text
//! - A payload that fails to serialize is dropped from the record; the record
//!   itself is still emitted

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::config::RequestLogEncoding;

/// Which call boundary produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Http,
    Unary,
    StreamStart,
    StreamComplete,
}

impl RecordKind {
    /// Log message of the event.
    pub fn message(&self) -> &'static str {
        match self {
            RecordKind::Http => "HTTP Request",
            RecordKind::Unary => "GRPC Request",
            RecordKind::StreamStart => "GRPC Stream Start",
            RecordKind::StreamComplete => "GRPC Stream Complete",
        }
    }

    pub fn package(&self) -> &'static str {
        match self {
            RecordKind::Http => "server.http",
            RecordKind::Unary => "server.grpc",
            RecordKind::StreamStart | RecordKind::StreamComplete => "server.grpc.stream",
        }
    }
}

/// Outcome of a finished call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Http(http::StatusCode),
    Rpc(tonic::Code),
}

impl Outcome {
    /// HTTP status, or the equivalent of an RPC code as the gateway maps it.
    pub fn http_status(&self) -> u16 {
        match self {
            Outcome::Http(status) => status.as_u16(),
            Outcome::Rpc(code) => crate::http::response::http_status(*code).as_u16(),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Http(status) => write!(f, "{}", status.as_u16()),
            Outcome::Rpc(code) => f.write_str(code_name(*code)),
        }
    }
}

/// Canonical name of a gRPC status code (`OK`, `NotFound`, `Canceled`, ...).
pub fn code_name(code: tonic::Code) -> &'static str {
    use tonic::Code;
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "Canceled",
        Code::Unknown => "Unknown",
        Code::InvalidArgument => "InvalidArgument",
        Code::DeadlineExceeded => "DeadlineExceeded",
        Code::NotFound => "NotFound",
        Code::AlreadyExists => "AlreadyExists",
        Code::PermissionDenied => "PermissionDenied",
        Code::ResourceExhausted => "ResourceExhausted",
        Code::FailedPrecondition => "FailedPrecondition",
        Code::Aborted => "Aborted",
        Code::OutOfRange => "OutOfRange",
        Code::Unimplemented => "Unimplemented",
        Code::Internal => "Internal",
        Code::Unavailable => "Unavailable",
        Code::DataLoss => "DataLoss",
        Code::Unauthenticated => "Unauthenticated",
    }
}

/// Error text of a failed RPC.
pub fn status_error(status: &tonic::Status) -> String {
    format!("rpc error: code = {} desc = {}", code_name(status.code()), status.message())
}

/// Captured request or response content.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Text(text) => f.write_str(text),
            Payload::Json(value) => write!(f, "{}", value),
        }
    }
}

/// One logged call (or, for streams, one call boundary).
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub kind: RecordKind,
    /// URI path and query for HTTP, full method name for RPC.
    pub path: String,
    /// HTTP method, or `GRPC` / `GRPC Stream`.
    pub method: String,
    pub protocol: String,
    /// Absent on stream start records.
    pub status: Option<Outcome>,
    pub duration: Option<Duration>,
    pub remote: Option<String>,
    pub request_id: Option<String>,
    pub error: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub request_size: Option<u64>,
    pub response_size: Option<u64>,
    pub request: Option<Payload>,
    pub response: Option<Payload>,
}

impl LogRecord {
    pub fn new(kind: RecordKind, path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            method: method.into(),
            protocol: String::new(),
            status: None,
            duration: None,
            remote: None,
            request_id: None,
            error: None,
            user_agent: None,
            referer: None,
            request_size: None,
            response_size: None,
            request: None,
            response: None,
        }
    }
}

/// Destination of request log records.
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: LogRecord);
}

/// Sink that writes records as `tracing` events with target `thing_api::request`.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    encoding: RequestLogEncoding,
}

impl TracingSink {
    pub fn new(encoding: RequestLogEncoding) -> Self {
        Self { encoding }
    }
}

impl RecordSink for TracingSink {
    fn emit(&self, record: LogRecord) {
        match self.encoding {
            RequestLogEncoding::Default => emit_default(&record),
            RequestLogEncoding::StructuredCloud => emit_structured_cloud(&record),
        }
    }
}

fn emit_default(record: &LogRecord) {
    let status = record.status.map(|s| s.to_string());
    let request = record.request.as_ref().map(|p| p.to_string());
    let response = record.response.as_ref().map(|p| p.to_string());
    tracing::info!(
        target: "thing_api::request",
        package = record.kind.package(),
        path = %record.path,
        method = %record.method,
        status = status.as_deref(),
        duration_ms = record.duration.map(|d| d.as_secs_f64() * 1000.0),
        remote = record.remote.as_deref(),
        request_id = record.request_id.as_deref(),
        error = record.error.as_deref(),
        request = request.as_deref(),
        response = response.as_deref(),
        "{}",
        record.kind.message()
    );
}

/// `httpRequest` payload in the common cloud logging layout.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestPayload {
    pub request_method: String,
    pub request_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<String>,
    pub protocol: String,
}

impl HttpRequestPayload {
    pub fn from_record(record: &LogRecord) -> Self {
        let request_method = match record.kind {
            RecordKind::Http => record.method.clone(),
            other => other.message().to_string(),
        };
        Self {
            request_method,
            request_url: record.path.clone(),
            request_size: record.request_size.map(|n| n.to_string()),
            status: record.status.map(|s| s.http_status()),
            response_size: record.response_size.map(|n| n.to_string()),
            user_agent: record.user_agent.clone(),
            remote_ip: record.remote.clone(),
            referer: record.referer.clone(),
            latency: record.duration.map(|d| format!("{:.6}s", d.as_secs_f64())),
            protocol: record.protocol.clone(),
        }
    }
}

fn emit_structured_cloud(record: &LogRecord) {
    let http_request = serde_json::to_string(&HttpRequestPayload::from_record(record)).ok();
    let grpc_status = match record.status {
        Some(Outcome::Rpc(code)) => Some(code_name(code)),
        _ => None,
    };
    let request = record.request.as_ref().map(|p| p.to_string());
    let response = record.response.as_ref().map(|p| p.to_string());
    tracing::info!(
        target: "thing_api::request",
        package = record.kind.package(),
        http_request = http_request.as_deref(),
        status = grpc_status,
        request_id = record.request_id.as_deref(),
        error = record.error.as_deref(),
        request = request.as_deref(),
        response = response.as_deref(),
        "{}",
        record.kind.message()
    );
}

/// Sink that keeps every record, for inspection in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records emitted so far, in emission order.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl RecordSink for MemorySink {
    fn emit(&self, record: LogRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_record() -> LogRecord {
        LogRecord {
            protocol: "HTTP/1.1".into(),
            status: Some(Outcome::Http(http::StatusCode::CREATED)),
            duration: Some(Duration::from_micros(1234)),
            remote: Some("203.0.113.9".into()),
            user_agent: Some("curl/8".into()),
            request_size: Some(17),
            response_size: Some(40),
            ..LogRecord::new(RecordKind::Http, "/api/things", "POST")
        }
    }

    #[test]
    fn cloud_payload_shape() {
        let payload = serde_json::to_value(HttpRequestPayload::from_record(&http_record())).unwrap();
        assert_eq!(
            payload,
            serde_json::json!({
                "requestMethod": "POST",
                "requestUrl": "/api/things",
                "requestSize": "17",
                "status": 201,
                "responseSize": "40",
                "userAgent": "curl/8",
                "remoteIp": "203.0.113.9",
                "latency": "0.001234s",
                "protocol": "HTTP/1.1"
            })
        );
    }

    #[test]
    fn rpc_records_use_message_as_method_and_mapped_status() {
        let record = LogRecord {
            status: Some(Outcome::Rpc(tonic::Code::NotFound)),
            protocol: "GRPC".into(),
            ..LogRecord::new(RecordKind::Unary, "/thingapi.ThingRpc/ThingGet", "GRPC")
        };
        let payload = HttpRequestPayload::from_record(&record);
        assert_eq!(payload.request_method, "GRPC Request");
        assert_eq!(payload.status, Some(404));
        assert_eq!(record.status.unwrap().to_string(), "NotFound");
    }

    #[test]
    fn status_error_text() {
        let status = tonic::Status::not_found("Not Found");
        assert_eq!(status_error(&status), "rpc error: code = NotFound desc = Not Found");
        assert_eq!(code_name(tonic::Code::Cancelled), "Canceled");
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.emit(LogRecord::new(RecordKind::StreamStart, "/a", "GRPC Stream"));
        sink.emit(LogRecord::new(RecordKind::StreamComplete, "/a", "GRPC Stream"));
        let kinds: Vec<_> = sink.records().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![RecordKind::StreamStart, RecordKind::StreamComplete]);
        sink.clear();
        assert!(sink.records().is_empty());
    }

    #[test]
    fn tracing_sink_accepts_every_kind() {
        for encoding in [RequestLogEncoding::Default, RequestLogEncoding::StructuredCloud] {
            let sink = TracingSink::new(encoding);
            sink.emit(http_record());
            sink.emit(LogRecord::new(RecordKind::StreamStart, "/a", "GRPC Stream"));
        }
    }
}
