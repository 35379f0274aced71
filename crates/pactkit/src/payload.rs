//! Response payloads.
//!
//! A [`Payload`] is the body of a mocked response. It is either a structured
//! JSON value captured from any `Serialize` type, a raw string that is
//! forwarded verbatim, or an explicit null.

use crate::error::ContractError;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    /// Structured value, serialized in its normal JSON form.
    Value(serde_json::Value),
    /// Raw text, serialized as a JSON string.
    Text(String),
    /// Serialized as JSON `null`.
    #[default]
    Null,
}

impl Payload {
    /// Capture any serializable value.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, ContractError> {
        serde_json::to_value(value)
            .map(Payload::Value)
            .map_err(ContractError::Encoding)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Payload::Null)
    }

    /// Bytes an engine writes on the wire for this payload.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Payload::Value(value) => Bytes::from(value.to_string()),
            Payload::Text(text) => Bytes::from(text.clone()),
            Payload::Null => Bytes::new(),
        }
    }

    /// Content type matching [`Payload::to_bytes`], if there is a body at all.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Payload::Value(_) => Some("application/json"),
            Payload::Text(text) if serde_json::from_str::<serde_json::Value>(text).is_ok() => {
                Some("application/json")
            }
            Payload::Text(_) => Some("text/plain; charset=utf-8"),
            Payload::Null => None,
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Option<String>> for Payload {
    fn from(text: Option<String>) -> Self {
        text.map_or(Payload::Null, Payload::Text)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Payload::Null,
            serde_json::Value::String(text) => Payload::Text(text),
            other => Payload::Value(other),
        }
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Payload::Value(value) => value.serialize(serializer),
            Payload::Text(text) => serializer.serialize_str(text),
            Payload::Null => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Payload::from)
    }
}
