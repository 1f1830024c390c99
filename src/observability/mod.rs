//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request / unary RPC / stream RPC
//!     → interceptors.rs (measure, filter, build LogRecord)
//!     → record.rs (RecordSink: tracing events or in-memory)
//!     → logging.rs (global subscriber: console or JSON lines)
//! ```
//!
//! # Design Decisions
//! - Request records are plain data; encoding happens only in the sink
//! - The request ID assigned at the multiplexer flows into every record

pub mod interceptors;
pub mod logging;
pub mod record;

pub use interceptors::{
    HttpLogInterceptor, LoggingPipeline, StreamLogInterceptor, SuppressionSet, UnaryLogInterceptor,
};
pub use record::{LogRecord, MemorySink, Outcome, Payload, RecordKind, RecordSink, TracingSink};
