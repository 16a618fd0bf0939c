use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Numeric error codes surfaced to dapp callers.
pub mod code {
    /// The user rejected the request in the host application.
    pub const USER_REJECTED: i64 = 4001;
    /// A privileged action was attempted before an account was selected.
    pub const NOT_READY: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    /// The host bridge refused or lost the message.
    pub const DISCONNECTED: i64 = 4900;
    pub const TIMEOUT: i64 = -32000;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL: i64 = -32603;
}

/// Wire shape of an error handed back to a dapp: `{code, message, data?}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.data = Some(data);
        self
    }

    /// The host's conventional "user denied" reply.
    pub fn user_rejected() -> Self {
        Self::new(code::USER_REJECTED, "user rejected the request")
    }
}

/// Errors settled into a caller's pending call.
///
/// Host and upstream failures are carried verbatim; everything else is raised by the
/// dispatcher itself before or instead of contacting a backend.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("provider is not ready")]
    NotReady,

    #[error("method not supported: {method}")]
    UnsupportedMethod { method: String },

    #[error("invalid params for {method}: {message}")]
    InvalidParams { method: String, message: String },

    #[error("host error: {0}")]
    Bridge(RpcError),

    #[error("upstream error: {0}")]
    Upstream(RpcError),

    #[error("host bridge unavailable: {reason}")]
    BridgeUnavailable { reason: String },

    #[error("request {id} timed out after {timeout_ms} ms")]
    Timeout { id: u64, timeout_ms: u64 },

    #[error("invalid config: {message}")]
    Config { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ProviderError {
    pub fn unsupported(method: impl Into<String>) -> Self {
        Self::UnsupportedMethod { method: method.into() }
    }

    pub fn invalid_params(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParams { method: method.into(), message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::NotReady => code::NOT_READY,
            Self::UnsupportedMethod { .. } => code::UNSUPPORTED_METHOD,
            Self::InvalidParams { .. } => code::INVALID_PARAMS,
            Self::Bridge(err) | Self::Upstream(err) => err.code,
            Self::BridgeUnavailable { .. } => code::DISCONNECTED,
            Self::Timeout { .. } => code::TIMEOUT,
            Self::Config { .. } | Self::Internal { .. } => code::INTERNAL,
        }
    }

    /// Returns `true` for transient errors that may succeed if the dapp tries again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BridgeUnavailable { .. } | Self::Timeout { .. })
    }

    /// The `{code, message}` object a dapp sees as the rejection value.
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            Self::Bridge(err) | Self::Upstream(err) => err.clone(),
            Self::UnsupportedMethod { method } => RpcError::new(self.code(), "method not supported")
                .with_data(JsonValue::String(method.clone())),
            other => RpcError::new(other.code(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_codes_for_engine_errors() {
        assert_eq!(ProviderError::NotReady.code(), 4100);
        assert_eq!(ProviderError::unsupported("eth_subscribe").code(), 4200);
        assert_eq!(ProviderError::invalid_params("eth_sign", "missing data").code(), -32602);
        assert_eq!(
            ProviderError::BridgeUnavailable { reason: "closed".into() }.code(),
            code::DISCONNECTED
        );
    }

    #[test]
    fn backend_errors_pass_through_verbatim() {
        let host = RpcError::user_rejected();
        let err = ProviderError::Bridge(host.clone());
        assert_eq!(err.code(), 4001);
        assert_eq!(err.to_rpc_error(), host);

        let upstream = RpcError::new(-32005, "limit exceeded").with_data(serde_json::json!(7));
        assert_eq!(ProviderError::Upstream(upstream.clone()).to_rpc_error(), upstream);
    }

    #[test]
    fn retryable_variants() {
        assert!(ProviderError::Timeout { id: 1, timeout_ms: 10 }.is_retryable());
        assert!(ProviderError::BridgeUnavailable { reason: "x".into() }.is_retryable());
        assert!(!ProviderError::NotReady.is_retryable());
        assert!(!ProviderError::unsupported("x").is_retryable());
    }

    #[test]
    fn unsupported_method_rpc_error_has_fixed_message() {
        let rpc = ProviderError::unsupported("eth_newFilter").to_rpc_error();
        assert_eq!(rpc.code, 4200);
        assert_eq!(rpc.message, "method not supported");
        assert_eq!(rpc.data, Some(JsonValue::String("eth_newFilter".into())));
    }
}
