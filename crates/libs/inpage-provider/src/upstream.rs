use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::ProviderError;
use crate::types::RpcRequest;

/// Network JSON-RPC client for methods the provider cannot answer itself.
///
/// Implementations own transport concerns (HTTP, retries). The returned value may be a
/// bare result or a full `{jsonrpc, id, result}` envelope; failures should be reported as
/// [`ProviderError::Upstream`] so callers see the node's `{code, message}` verbatim.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn call(&self, request: RpcRequest) -> Result<JsonValue, ProviderError>;
}
