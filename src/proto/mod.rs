//! Protobuf messages and gRPC service stubs for `thingapi`.
//!
//! The stubs are written out by hand in the shape tonic's code generator
//! produces, so the build does not need `protoc`. Messages also derive serde
//! so the gateway can render them as JSON and the request log can capture
//! them.

pub mod thing_rpc_client;
pub mod thing_rpc_server;
pub mod version_rpc_client;
pub mod version_rpc_server;

use serde::{Deserialize, Serialize};

/// Protobuf package of every service in this crate.
pub const PACKAGE: &str = "thingapi";

/// The resource served by the API.
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Thing {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ThingId {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ThingFindResponse {
    #[prost(message, repeated, tag = "1")]
    pub data: Vec<Thing>,
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionResponse {
    #[prost(string, tag = "1")]
    pub version: String,
}

/// `google.protobuf.Empty`.
pub type Empty = ();

/// Response for a method or service this server does not implement:
/// HTTP 200 with `grpc-status: 12` (UNIMPLEMENTED) and no body.
pub fn unimplemented_response() -> http::Response<tonic::body::BoxBody> {
    let mut response = http::Response::new(tonic::codegen::empty_body());
    let headers = response.headers_mut();
    headers.insert(
        http::HeaderName::from_static("grpc-status"),
        http::HeaderValue::from(tonic::Code::Unimplemented as i32),
    );
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/grpc"),
    );
    response
}

pub use thing_rpc_client::ThingRpcClient;
pub use thing_rpc_server::{ThingRpc, ThingRpcServer};
pub use version_rpc_client::VersionRpcClient;
pub use version_rpc_server::{VersionRpc, VersionRpcServer};

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn thing_wire_format() {
        let thing = Thing {
            id: "a".into(),
            name: "b".into(),
        };
        // field 1 (len-delimited) "a", field 2 "b"
        assert_eq!(thing.encode_to_vec(), vec![0x0a, 1, b'a', 0x12, 1, b'b']);
        assert_eq!(Thing::decode(&[0x12, 1, b'b'][..]).unwrap().name, "b");
    }

    #[test]
    fn json_fields_use_proto_names() {
        let response = ThingFindResponse {
            data: vec![Thing {
                id: "1".into(),
                name: "one".into(),
            }],
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({"data": [{"id": "1", "name": "one"}]})
        );
        let parsed: Thing = serde_json::from_str(r#"{"name": "only"}"#).unwrap();
        assert_eq!(parsed.id, "");
    }
}
