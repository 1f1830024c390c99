//! Request logging interceptors for both protocols.
//!
//! # Responsibilities
//! - One record per HTTP request and per unary RPC
//! - A start record and a completion record per streaming RPC
//! - Skip suppressed paths and methods
//! - Skip RPC calls bridged from the HTTP gateway (they were logged as HTTP)
//!
//! # Design Decisions
//! - Suppression matches the URI path exactly, ignoring the query string
//! - Stream completion is tied to the response stream: it ends, fails, or is
//!   dropped by the transport (reported as cancelled)
//! - Bodies are buffered only when payload capture is enabled, and never past
//!   the HTTP body limit: larger requests are refused with 413, larger or
//!   streamed responses pass through uncaptured

use std::collections::HashSet;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use async_trait::async_trait;
use axum::body::{Body, HttpBody};
use axum::extract::{ConnectInfo, Request};
use axum::response::{IntoResponse, Response};
use futures_util::{Stream, StreamExt};
use http::{header, HeaderMap, StatusCode};

use crate::config::{HttpConfig, RequestLogConfig};
use crate::http::response::payload_too_large;
use crate::http::request::{
    is_body_too_large, remote_addr, request_id, GATEWAY_MARKER, X_FORWARDED_FOR, X_REQUEST_ID,
};
use crate::interceptor::rpc::{ErasedRequest, StreamResult, UnaryResult};
use crate::interceptor::{
    HttpInterceptor, HttpNext, InterceptorChain, MessageStream, MethodInfo, RpcMessage,
    StreamInterceptor, StreamNext, UnaryInterceptor, UnaryNext,
};
use crate::observability::record::{
    status_error, LogRecord, Outcome, Payload, RecordKind, RecordSink, TracingSink,
};

/// Exact paths or full method names exempt from logging.
#[derive(Debug, Clone, Default)]
pub struct SuppressionSet {
    entries: HashSet<String>,
}

impl SuppressionSet {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }
}

/// Builds the logging interceptors from configuration.
pub struct LoggingPipeline {
    config: RequestLogConfig,
    sink: Arc<dyn RecordSink>,
    body_limit: usize,
}

impl LoggingPipeline {
    /// Pipeline writing to `tracing` in the configured encoding.
    pub fn from_config(config: &RequestLogConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink::new(config.encoding)))
    }

    pub fn with_sink(config: &RequestLogConfig, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            config: config.clone(),
            sink,
            body_limit: HttpConfig::default().max_body_size,
        }
    }

    /// Largest body buffered for payload capture. Should match
    /// `http.max_body_size`.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Append the logging interceptors to `chain`. Adds nothing when request
    /// logging is disabled.
    pub fn install(self, chain: InterceptorChain) -> InterceptorChain {
        if !self.config.enabled {
            return chain;
        }
        let log_bodies = self.config.log_request_body;
        chain
            .with_http(HttpLogInterceptor {
                sink: Arc::clone(&self.sink),
                suppressed: SuppressionSet::new(self.config.disabled_http.iter().cloned()),
                log_bodies,
                body_limit: self.body_limit,
            })
            .with_unary(UnaryLogInterceptor {
                sink: Arc::clone(&self.sink),
                suppressed: SuppressionSet::new(self.config.disabled_grpc.iter().cloned()),
                log_bodies,
            })
            .with_stream(StreamLogInterceptor {
                sink: self.sink,
                suppressed: SuppressionSet::new(self.config.disabled_grpc_stream.iter().cloned()),
            })
    }
}

/// Logs every HTTP request handled by the HTTP router, gateway included.
pub struct HttpLogInterceptor {
    sink: Arc<dyn RecordSink>,
    suppressed: SuppressionSet,
    log_bodies: bool,
    body_limit: usize,
}

#[async_trait]
impl HttpInterceptor for HttpLogInterceptor {
    async fn intercept(&self, request: Request, next: HttpNext<'_>) -> Response {
        if self.suppressed.contains(request.uri().path()) {
            return next.run(request).await;
        }

        let start = Instant::now();
        let path = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());
        let mut record = LogRecord::new(RecordKind::Http, path, request.method().as_str());
        record.protocol = format!("{:?}", request.version());
        record.remote = remote_addr(request.headers(), request.extensions());
        record.request_id = request_id(request.headers());
        record.user_agent = header_value(request.headers(), header::USER_AGENT);
        record.referer = header_value(request.headers(), header::REFERER);
        record.request_size = content_length(request.headers());

        let request = if self.log_bodies {
            if record.request_size.is_some_and(|size| size > self.body_limit as u64) {
                return self.reject_too_large(record, start);
            }
            let (parts, body) = request.into_parts();
            let bytes = match axum::body::to_bytes(body, self.body_limit).await {
                Ok(bytes) => bytes,
                Err(e) if is_body_too_large(&e) => return self.reject_too_large(record, start),
                Err(e) => {
                    tracing::debug!(error = %e, "Could not read request body for logging");
                    return (StatusCode::BAD_REQUEST, "could not read request body").into_response();
                }
            };
            record.request_size = Some(bytes.len() as u64);
            record.request = Some(Payload::Text(dump_request(&parts, &bytes)));
            Request::from_parts(parts, Body::from(bytes))
        } else {
            request
        };

        let response = next.run(request).await;

        let response_size = content_length(response.headers()).or_else(|| response.body().size_hint().exact());
        record.response_size = response_size;
        let response = match response_size {
            Some(size) if self.log_bodies && size <= self.body_limit as u64 => {
                let (parts, body) = response.into_parts();
                match axum::body::to_bytes(body, self.body_limit).await {
                    Ok(bytes) => {
                        record.response_size = Some(bytes.len() as u64);
                        record.response = Some(Payload::Text(String::from_utf8_lossy(&bytes).into_owned()));
                        Response::from_parts(parts, Body::from(bytes))
                    }
                    Err(e) => {
                        record.error = Some(e.to_string());
                        StatusCode::INTERNAL_SERVER_ERROR.into_response()
                    }
                }
            }
            _ => response,
        };

        record.status = Some(Outcome::Http(response.status()));
        record.duration = Some(start.elapsed());
        self.sink.emit(record);
        response
    }
}

impl HttpLogInterceptor {
    fn reject_too_large(&self, mut record: LogRecord, start: Instant) -> Response {
        let response = payload_too_large();
        record.status = Some(Outcome::Http(response.status()));
        record.duration = Some(start.elapsed());
        self.sink.emit(record);
        response
    }
}

/// Logs unary RPC calls that did not come through the gateway.
pub struct UnaryLogInterceptor {
    sink: Arc<dyn RecordSink>,
    suppressed: SuppressionSet,
    log_bodies: bool,
}

#[async_trait]
impl UnaryInterceptor for UnaryLogInterceptor {
    async fn intercept(&self, info: &MethodInfo, request: ErasedRequest, next: UnaryNext<'_>) -> UnaryResult {
        if self.suppressed.contains(info.full_method) || from_gateway(&request) {
            return next.run(info, request).await;
        }

        let start = Instant::now();
        let mut record = rpc_record(RecordKind::Unary, info, &request);
        if self.log_bodies {
            record.request = capture(&**request.get_ref());
        }

        let result = next.run(info, request).await;

        record.duration = Some(start.elapsed());
        match &result {
            Ok(response) => {
                record.status = Some(Outcome::Rpc(tonic::Code::Ok));
                if self.log_bodies {
                    record.response = capture(&**response.get_ref());
                }
            }
            Err(status) => {
                record.status = Some(Outcome::Rpc(status.code()));
                record.error = Some(status_error(status));
            }
        }
        self.sink.emit(record);
        result
    }
}

/// Logs the start and completion of streaming RPC calls that did not come
/// through the gateway.
pub struct StreamLogInterceptor {
    sink: Arc<dyn RecordSink>,
    suppressed: SuppressionSet,
}

#[async_trait]
impl StreamInterceptor for StreamLogInterceptor {
    async fn intercept(&self, info: &MethodInfo, request: ErasedRequest, next: StreamNext<'_>) -> StreamResult {
        if self.suppressed.contains(info.full_method) || from_gateway(&request) {
            return next.run(info, request).await;
        }

        let start = Instant::now();
        let record = rpc_record(RecordKind::StreamStart, info, &request);
        self.sink.emit(record.clone());

        let completion = Completion {
            sink: Arc::clone(&self.sink),
            record: LogRecord {
                kind: RecordKind::StreamComplete,
                ..record
            },
            start,
        };

        match next.run(info, request).await {
            Ok(response) => {
                let (metadata, stream, extensions) = response.into_parts();
                let stream: MessageStream = Box::pin(CompletionStream {
                    inner: stream,
                    completion: Some(completion),
                });
                Ok(tonic::Response::from_parts(metadata, stream, extensions))
            }
            Err(status) => {
                completion.finish(Some(&status));
                Err(status)
            }
        }
    }
}

/// Pending completion record of a stream.
struct Completion {
    sink: Arc<dyn RecordSink>,
    record: LogRecord,
    start: Instant,
}

impl Completion {
    /// Emit the completion record; `None` means the stream ended cleanly.
    fn finish(mut self, status: Option<&tonic::Status>) {
        self.record.duration = Some(self.start.elapsed());
        match status {
            None => self.record.status = Some(Outcome::Rpc(tonic::Code::Ok)),
            Some(status) => {
                self.record.status = Some(Outcome::Rpc(status.code()));
                self.record.error = Some(status_error(status));
            }
        }
        self.sink.emit(self.record);
    }
}

/// Response stream that reports its own completion.
struct CompletionStream {
    inner: MessageStream,
    completion: Option<Completion>,
}

impl Stream for CompletionStream {
    type Item = Result<Box<dyn RpcMessage>, tonic::Status>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.inner.poll_next_unpin(cx);
        match &polled {
            Poll::Ready(None) => {
                if let Some(completion) = self.completion.take() {
                    completion.finish(None);
                }
            }
            Poll::Ready(Some(Err(status))) => {
                if let Some(completion) = self.completion.take() {
                    completion.finish(Some(status));
                }
            }
            _ => {}
        }
        polled
    }
}

impl Drop for CompletionStream {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            completion.finish(Some(&tonic::Status::cancelled("stream dropped before completion")));
        }
    }
}

fn rpc_record(kind: RecordKind, info: &MethodInfo, request: &ErasedRequest) -> LogRecord {
    let method = match kind {
        RecordKind::Unary => "GRPC",
        _ => "GRPC Stream",
    };
    let metadata = request.metadata();
    let mut record = LogRecord::new(kind, info.full_method, method);
    record.protocol = "GRPC".to_string();
    record.remote = metadata_str(request, X_FORWARDED_FOR.as_str()).or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
    });
    record.request_id = metadata_str(request, X_REQUEST_ID.as_str());
    record.user_agent = metadata
        .get(header::USER_AGENT.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    record
}

fn from_gateway(request: &ErasedRequest) -> bool {
    request.metadata().contains_key(GATEWAY_MARKER)
}

fn metadata_str(request: &ErasedRequest, key: &str) -> Option<String> {
    request
        .metadata()
        .get(key)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn capture(message: &dyn RpcMessage) -> Option<Payload> {
    message.capture().map(Payload::Json)
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    crate::http::request::header_str(headers, &name)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

fn dump_request(parts: &http::request::Parts, body: &[u8]) -> String {
    let mut dump = format!("{} {} {:?}\r\n", parts.method, parts.uri, parts.version);
    for (name, value) in &parts.headers {
        dump.push_str(name.as_str());
        dump.push_str(": ");
        dump.push_str(&String::from_utf8_lossy(value.as_bytes()));
        dump.push_str("\r\n");
    }
    dump.push_str("\r\n");
    dump.push_str(&String::from_utf8_lossy(body));
    dump
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::record::MemorySink;
    use axum::routing::{get, post};
    use axum::Router;
    use std::time::Duration;
    use tower::ServiceExt;

    const GET: MethodInfo = MethodInfo::unary("/thingapi.ThingRpc/ThingGet");
    const VERSION: MethodInfo = MethodInfo::unary("/thingapi.VersionRpc/Version");
    const STREAM: MethodInfo = MethodInfo::server_streaming("/thingapi.ThingRpc/ThingFindStream");

    fn pipeline(config: RequestLogConfig) -> (Arc<MemorySink>, InterceptorChain) {
        let sink = Arc::new(MemorySink::new());
        let chain = LoggingPipeline::with_sink(&config, sink.clone()).install(InterceptorChain::new());
        (sink, chain)
    }

    fn app(chain: InterceptorChain) -> Router {
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/echo", post(|body: String| async move { body }))
            .layer(axum::middleware::from_fn_with_state(
                Arc::new(chain),
                crate::interceptor::http::run_http_chain,
            ))
    }

    fn peer_request(builder: http::request::Builder, body: Body) -> Request {
        let mut request = builder.body(body).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo("192.0.2.10:5555".parse::<SocketAddr>().unwrap()));
        request
    }

    #[tokio::test]
    async fn http_request_produces_one_record() {
        let (sink, chain) = pipeline(RequestLogConfig::default());
        let response = app(chain)
            .oneshot(peer_request(
                http::Request::get("/health?verbose=1").header(X_REQUEST_ID, "req-1"),
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.kind, RecordKind::Http);
        assert_eq!(record.path, "/health?verbose=1");
        assert_eq!(record.method, "GET");
        assert_eq!(record.status, Some(Outcome::Http(StatusCode::OK)));
        assert_eq!(record.remote.as_deref(), Some("192.0.2.10:5555"));
        assert_eq!(record.request_id.as_deref(), Some("req-1"));
        assert!(record.duration.is_some());
        assert!(record.request.is_none());
    }

    #[tokio::test]
    async fn suppressed_http_path_is_silent_regardless_of_query() {
        let (sink, chain) = pipeline(RequestLogConfig {
            disabled_http: vec!["/health".into()],
            ..RequestLogConfig::default()
        });
        let app = app(chain);
        for uri in ["/health", "/health?x=1"] {
            app.clone()
                .oneshot(peer_request(http::Request::get(uri), Body::empty()))
                .await
                .unwrap();
        }
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn http_bodies_are_captured_when_enabled() {
        let (sink, chain) = pipeline(RequestLogConfig {
            log_request_body: true,
            ..RequestLogConfig::default()
        });
        let response = app(chain)
            .oneshot(peer_request(
                http::Request::post("/echo").header(X_FORWARDED_FOR, "198.51.100.7"),
                Body::from("hello"),
            ))
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"hello");

        let record = sink.records().remove(0);
        assert_eq!(record.remote.as_deref(), Some("198.51.100.7"));
        assert_eq!(record.response, Some(Payload::Text("hello".into())));
        match record.request {
            Some(Payload::Text(dump)) => {
                assert!(dump.starts_with("POST /echo"));
                assert!(dump.ends_with("hello"));
            }
            other => panic!("unexpected request payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_request_is_refused_before_buffering() {
        let sink = Arc::new(MemorySink::new());
        let chain = LoggingPipeline::with_sink(
            &RequestLogConfig {
                log_request_body: true,
                ..RequestLogConfig::default()
            },
            sink.clone(),
        )
        .with_body_limit(16)
        .install(InterceptorChain::new());
        let app = app(chain);

        // Declared length over the limit: refused without reading.
        let response = app
            .clone()
            .oneshot(peer_request(
                http::Request::post("/echo").header(header::CONTENT_LENGTH, "1048576"),
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        // Undeclared length: reading stops at the limit.
        let response = app
            .oneshot(peer_request(http::Request::post("/echo"), Body::from(vec![b'x'; 1024])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let records = sink.records();
        assert_eq!(records.len(), 2);
        for record in records {
            assert_eq!(record.status, Some(Outcome::Http(StatusCode::PAYLOAD_TOO_LARGE)));
            assert!(record.request.is_none());
        }
    }

    #[tokio::test]
    async fn streamed_response_passes_through_uncaptured() {
        let (sink, chain) = pipeline(RequestLogConfig {
            log_request_body: true,
            ..RequestLogConfig::default()
        });
        let app = Router::new()
            .route(
                "/lines",
                get(|| async {
                    let lines = futures_util::stream::iter(["a\n", "b\n"]).map(Ok::<_, std::convert::Infallible>);
                    Body::from_stream(lines)
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                Arc::new(chain),
                crate::interceptor::http::run_http_chain,
            ));

        let response = app
            .oneshot(peer_request(http::Request::get("/lines"), Body::empty()))
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"a\nb\n");

        let record = sink.records().remove(0);
        assert_eq!(record.status, Some(Outcome::Http(StatusCode::OK)));
        assert!(record.response.is_none());
    }

    #[tokio::test]
    async fn unary_success_and_failure() {
        let (sink, chain) = pipeline(RequestLogConfig::default());

        let mut request = tonic::Request::new(crate::proto::ThingId { id: "1".into() });
        request.metadata_mut().insert("x-request-id", "abc".parse().unwrap());
        chain
            .unary(&GET, request, |_request| async move {
                Ok(tonic::Response::new(crate::proto::Thing::default()))
            })
            .await
            .unwrap();

        let status = chain
            .unary(&GET, tonic::Request::new(crate::proto::ThingId::default()), |_request| async move {
                Err::<tonic::Response<crate::proto::Thing>, _>(tonic::Status::not_found("Not Found"))
            })
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, RecordKind::Unary);
        assert_eq!(records[0].method, "GRPC");
        assert_eq!(records[0].path, "/thingapi.ThingRpc/ThingGet");
        assert_eq!(records[0].status, Some(Outcome::Rpc(tonic::Code::Ok)));
        assert_eq!(records[0].request_id.as_deref(), Some("abc"));
        assert_eq!(records[0].error, None);
        assert_eq!(records[1].status, Some(Outcome::Rpc(tonic::Code::NotFound)));
        assert_eq!(
            records[1].error.as_deref(),
            Some("rpc error: code = NotFound desc = Not Found")
        );
    }

    #[tokio::test]
    async fn unary_bodies_are_captured_as_json() {
        let (sink, chain) = pipeline(RequestLogConfig {
            log_request_body: true,
            ..RequestLogConfig::default()
        });
        chain
            .unary(&GET, tonic::Request::new(crate::proto::ThingId { id: "7".into() }), |_request| async move {
                Ok(tonic::Response::new(crate::proto::Thing {
                    id: "7".into(),
                    name: "seven".into(),
                }))
            })
            .await
            .unwrap();
        let record = sink.records().remove(0);
        assert_eq!(record.request, Some(Payload::Json(serde_json::json!({"id": "7"}))));
        assert_eq!(
            record.response,
            Some(Payload::Json(serde_json::json!({"id": "7", "name": "seven"})))
        );
    }

    #[tokio::test]
    async fn suppressed_and_gateway_calls_are_not_logged() {
        let (sink, chain) = pipeline(RequestLogConfig {
            disabled_grpc: vec![VERSION.full_method.to_string()],
            ..RequestLogConfig::default()
        });

        chain
            .unary(&VERSION, tonic::Request::new(()), |_request| async move {
                Ok(tonic::Response::new(crate::proto::VersionResponse::default()))
            })
            .await
            .unwrap();

        let mut bridged = tonic::Request::new(crate::proto::ThingId::default());
        bridged.metadata_mut().insert(GATEWAY_MARKER, "1".parse().unwrap());
        chain
            .unary(&GET, bridged, |_request| async move {
                Ok(tonic::Response::new(crate::proto::Thing::default()))
            })
            .await
            .unwrap();

        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn concurrent_unary_calls_keep_their_own_fields() {
        let (sink, chain) = pipeline(RequestLogConfig {
            log_request_body: true,
            ..RequestLogConfig::default()
        });
        let chain = Arc::new(chain);
        fn delay(i: u64) -> Duration {
            Duration::from_millis(10 + (i * 7) % 50)
        }

        let calls = (0..16u64).map(|i| {
            let chain = Arc::clone(&chain);
            async move {
                let mut request = tonic::Request::new(crate::proto::ThingId { id: i.to_string() });
                request
                    .metadata_mut()
                    .insert("x-request-id", format!("req-{i}").parse().unwrap());
                chain
                    .unary(&GET, request, move |request: tonic::Request<crate::proto::ThingId>| async move {
                        tokio::time::sleep(delay(i)).await;
                        let id = request.into_inner().id;
                        Ok(tonic::Response::new(crate::proto::Thing {
                            name: format!("thing {id}"),
                            id,
                        }))
                    })
                    .await
            }
        });
        let results = futures_util::future::join_all(calls).await;
        assert!(results.iter().all(|r| r.is_ok()));

        let records = sink.records();
        assert_eq!(records.len(), 16);
        let mut seen = HashSet::new();
        for record in &records {
            let request_id = record.request_id.as_deref().unwrap();
            let i: u64 = request_id.strip_prefix("req-").unwrap().parse().unwrap();
            assert!(seen.insert(i), "{request_id} logged twice");

            assert_eq!(record.request, Some(Payload::Json(serde_json::json!({"id": i.to_string()}))));
            assert_eq!(
                record.response,
                Some(Payload::Json(serde_json::json!({"id": i.to_string(), "name": format!("thing {i}")})))
            );
            let duration = record.duration.unwrap();
            assert!(duration >= delay(i), "{request_id} took {duration:?}");
            assert!(duration < delay(i) + Duration::from_secs(1), "{request_id} took {duration:?}");
        }
        assert_eq!(seen.len(), 16);
    }

    async fn run_stream(chain: &InterceptorChain, items: Vec<Result<u32, tonic::Status>>, take: usize) {
        let response = chain
            .server_streaming(&STREAM, tonic::Request::new(()), move |_request| async move {
                Ok(tonic::Response::new(futures_util::stream::iter(items)))
            })
            .await
            .unwrap();
        let _ = response.into_inner().take(take).collect::<Vec<_>>().await;
    }

    #[tokio::test]
    async fn stream_emits_start_then_completion() {
        let (sink, chain) = pipeline(RequestLogConfig::default());
        run_stream(&chain, vec![Ok(1), Ok(2)], usize::MAX).await;

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, RecordKind::StreamStart);
        assert_eq!(records[0].status, None);
        assert_eq!(records[0].method, "GRPC Stream");
        assert_eq!(records[1].kind, RecordKind::StreamComplete);
        assert_eq!(records[1].status, Some(Outcome::Rpc(tonic::Code::Ok)));
        assert!(records[1].duration.is_some());
    }

    #[tokio::test]
    async fn stream_error_is_reported_on_completion() {
        let (sink, chain) = pipeline(RequestLogConfig::default());
        run_stream(&chain, vec![Ok(1), Err(tonic::Status::internal("boom"))], usize::MAX).await;

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].status, Some(Outcome::Rpc(tonic::Code::Internal)));
        assert_eq!(records[1].error.as_deref(), Some("rpc error: code = Internal desc = boom"));
    }

    #[tokio::test]
    async fn dropped_stream_is_cancelled() {
        let (sink, chain) = pipeline(RequestLogConfig::default());
        run_stream(&chain, vec![Ok(1), Ok(2), Ok(3)], 1).await;

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].status, Some(Outcome::Rpc(tonic::Code::Cancelled)));
    }

    #[tokio::test]
    async fn disabled_pipeline_installs_nothing() {
        let (_sink, chain) = pipeline(RequestLogConfig {
            enabled: false,
            ..RequestLogConfig::default()
        });
        assert!(chain.is_empty());
    }
}
