//! JSON rendering of RPC messages for the REST gateway.
//!
//! Messages serialize with their proto field names. The marshaler then
//! rewrites keys, enum values and default fields according to
//! [`RestConfig`]. Decoding accepts both key styles and both enum forms.

use axum::response::{IntoResponse, Response};
use http::{header, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::RestConfig;

/// An `int32` enum field and its symbolic values.
#[derive(Debug, Clone, Copy)]
pub struct EnumField {
    /// Proto (snake_case) field name.
    pub field: &'static str,
    pub values: &'static [(&'static str, i32)],
}

impl EnumField {
    fn name_of(&self, number: i64) -> Option<&'static str> {
        self.values
            .iter()
            .find(|(_, value)| i64::from(*value) == number)
            .map(|(name, _)| *name)
    }

    fn number_of(&self, name: &str) -> Option<i32> {
        self.values
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, value)| *value)
    }
}

/// A message the gateway can marshal.
pub trait GatewayMessage: Serialize + DeserializeOwned {
    /// Top-level enum fields of the message.
    fn enum_fields() -> &'static [EnumField] {
        &[]
    }
}

impl GatewayMessage for crate::proto::Thing {}
impl GatewayMessage for crate::proto::ThingId {}
impl GatewayMessage for crate::proto::ThingFindResponse {}
impl GatewayMessage for crate::proto::VersionResponse {}

#[derive(Debug, thiserror::Error)]
pub enum MarshalError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown value {value:?} for enum field {field}")]
    UnknownEnumValue { field: &'static str, value: String },
}

impl MarshalError {
    /// Equivalent RPC status, as returned to REST callers.
    pub fn into_status(self) -> tonic::Status {
        tonic::Status::invalid_argument(self.to_string())
    }
}

/// JSON encoder/decoder configured from [`RestConfig`].
#[derive(Debug, Clone, Copy)]
pub struct JsonMarshaler {
    enums_as_ints: bool,
    emit_defaults: bool,
    orig_names: bool,
}

impl From<RestConfig> for JsonMarshaler {
    fn from(config: RestConfig) -> Self {
        Self {
            enums_as_ints: config.enums_as_ints,
            emit_defaults: config.emit_defaults,
            orig_names: config.orig_names,
        }
    }
}

impl Default for JsonMarshaler {
    fn default() -> Self {
        RestConfig::default().into()
    }
}

impl JsonMarshaler {
    pub fn to_value<M: GatewayMessage>(&self, message: &M) -> Result<Value, MarshalError> {
        let mut value = serde_json::to_value(message)?;
        if let Value::Object(map) = &mut value {
            if !self.enums_as_ints {
                for field in M::enum_fields() {
                    if let Some(slot) = map.get_mut(field.field) {
                        if let Some(name) = slot.as_i64().and_then(|n| field.name_of(n)) {
                            *slot = Value::String(name.to_string());
                        }
                    }
                }
            }
        }
        if !self.emit_defaults {
            strip_defaults(&mut value);
        }
        if !self.orig_names {
            value = rename_keys(value, &snake_to_camel);
        }
        Ok(value)
    }

    pub fn encode<M: GatewayMessage>(&self, message: &M) -> Result<Vec<u8>, MarshalError> {
        Ok(serde_json::to_vec(&self.to_value(message)?)?)
    }

    /// Decode a request body. Empty input decodes to the default message.
    pub fn decode<M: GatewayMessage>(&self, bytes: &[u8]) -> Result<M, MarshalError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::from_value(Value::Object(Map::new()))?);
        }
        let mut value = rename_keys(serde_json::from_slice(bytes)?, &camel_to_snake);
        if let Value::Object(map) = &mut value {
            for field in M::enum_fields() {
                if let Some(slot) = map.get_mut(field.field) {
                    if let Value::String(name) = slot {
                        let number = field.number_of(name).ok_or_else(|| MarshalError::UnknownEnumValue {
                            field: field.field,
                            value: name.clone(),
                        })?;
                        *slot = Value::from(number);
                    }
                }
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    /// `200 OK` with the encoded message, or a 500 if it cannot be encoded.
    pub fn respond<M: GatewayMessage>(&self, message: &M) -> Response {
        match self.encode(message) {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to marshal gateway response");
                crate::http::response::StatusResponse(tonic::Status::internal("failed to marshal response"))
                    .into_response()
            }
        }
    }
}

fn strip_defaults(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, field| !is_default(field));
            map.values_mut().for_each(strip_defaults);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_defaults),
        _ => {}
    }
}

fn is_default(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(_) => false,
    }
}

fn rename_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, field)| (rename(&key), rename_keys(field, rename)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(|item| rename_keys(item, rename)).collect()),
        other => other,
    }
}

fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
