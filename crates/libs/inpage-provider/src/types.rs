use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as JsonValue};

pub const JSONRPC_VERSION: &str = "2.0";

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Caller-chosen request id. Opaque: preserved, never interpreted. Numeric ids keep
/// their JSON form, so floats and ids above `i64::MAX` pass through unchanged.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Number(Number),
    String(String),
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<InternalId> for RequestId {
    fn from(value: InternalId) -> Self {
        Self::Number(value.0.into())
    }
}

/// Engine-private, process-wide unique id of one in-flight call.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct InternalId(pub u64);

impl fmt::Display for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InternalId {
    type Err = std::num::ParseIntError;

    /// Hosts echo the id back in its string form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// Request as a dapp hands it in.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default = "empty_params")]
    pub params: JsonValue,
}

fn empty_params() -> JsonValue {
    JsonValue::Array(Vec::new())
}

impl Request {
    pub fn new(method: impl Into<String>, params: JsonValue) -> Self {
        Self { id: None, jsonrpc: None, method: method.into(), params }
    }

    pub fn with_id(mut self, id: impl Into<RequestId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Positional parameter `index`, if params is a sequence that long.
    pub fn param(&self, index: usize) -> Option<&JsonValue> {
        self.params.as_array().and_then(|params| params.get(index))
    }
}

/// Request after id normalization; the id is always the internal one.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: InternalId,
    pub method: String,
    pub params: JsonValue,
}

impl RpcRequest {
    pub fn param(&self, index: usize) -> Option<&JsonValue> {
        self.params.as_array().and_then(|params| params.get(index))
    }
}

// ── Replies ───────────────────────────────────────────────────────────────────

/// What the caller asked to receive once the call settles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultShape {
    /// Only the `result` value (EIP-1193 `request`).
    Bare,
    /// The whole `{jsonrpc, id, result}` envelope (legacy `sendAsync`).
    Envelope,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RpcEnvelope {
    pub jsonrpc: String,
    pub id: RequestId,
    pub result: JsonValue,
}

impl RpcEnvelope {
    pub fn new(id: RequestId, result: JsonValue) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_owned(), id, result }
    }

    pub fn into_value(self) -> JsonValue {
        serde_json::json!({
            "jsonrpc": self.jsonrpc,
            "id": self.id,
            "result": self.result,
        })
    }
}

/// Treats any object carrying both a version marker and a `result` field as an
/// already-wrapped reply and returns its inner result; anything else is the value itself.
pub fn unwrap_envelope(raw: JsonValue) -> JsonValue {
    match raw {
        JsonValue::Object(mut map) if map.contains_key("jsonrpc") && map.contains_key("result") => {
            map.remove("result").unwrap_or(JsonValue::Null)
        }
        other => other,
    }
}
