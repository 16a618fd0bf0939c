use std::sync::Arc;

use async_trait::async_trait;
use inpage_provider::{
    BridgeMessage, ChannelBridge, InternalId, Provider, ProviderConfig, ProviderError, Request,
    RequestId, RpcEnvelope, RpcRequest, UpstreamClient,
};
use serde_json::{json, Value as JsonValue};
use tokio::sync::mpsc::UnboundedReceiver;

const ADDRESS: &str = "0xabc0000000000000000000000000000000000001";

struct EchoNode;

#[async_trait]
impl UpstreamClient for EchoNode {
    async fn call(&self, request: RpcRequest) -> Result<JsonValue, ProviderError> {
        Ok(json!({"jsonrpc": "2.0", "id": request.id, "result": "0x2a"}))
    }
}

/// Answers with the id the request reached it under.
struct IdNode;

#[async_trait]
impl UpstreamClient for IdNode {
    async fn call(&self, request: RpcRequest) -> Result<JsonValue, ProviderError> {
        Ok(json!(request.id))
    }
}

fn provider(config: ProviderConfig) -> (Arc<Provider>, UnboundedReceiver<BridgeMessage>) {
    provider_with(config, Arc::new(EchoNode))
}

fn provider_with(
    config: ProviderConfig,
    upstream: Arc<dyn UpstreamClient>,
) -> (Arc<Provider>, UnboundedReceiver<BridgeMessage>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (bridge, host) = ChannelBridge::new();
    let provider = Provider::new(config, Arc::new(bridge), upstream).expect("valid config");
    (Arc::new(provider), host)
}

/// Answers every host message with its own `payload.data`.
fn spawn_echo_host(provider: Arc<Provider>, mut host: UnboundedReceiver<BridgeMessage>) {
    tokio::spawn(async move {
        while let Some(message) = host.recv().await {
            let id: InternalId = message.id.parse().expect("numeric internal id");
            provider.deliver_result(id, message.payload["data"].clone());
        }
    });
}

#[tokio::test]
async fn chain_id_is_answered_locally() {
    let (provider, mut host) = provider(ProviderConfig::new(1));
    let chain = provider.request(Request::new("eth_chainId", json!([]))).await.expect("chain id");
    assert_eq!(chain, json!("0x1"));
    assert!(host.try_recv().is_err());
}

#[tokio::test]
async fn personal_sign_round_trips_through_the_host() {
    let (provider, mut host) = provider(ProviderConfig::new(1).with_address(ADDRESS));
    let caller = {
        let provider = provider.clone();
        tokio::spawn(async move {
            provider
                .send_async(Request::new("personal_sign", json!(["0xdeadbeef", ADDRESS])).with_id(77))
                .await
        })
    };

    let message = host.recv().await.expect("host message");
    assert_eq!(message.name, "signPersonalMessage");
    assert_eq!(message.payload, json!({"data": "0xdeadbeef"}));
    let internal: InternalId = message.id.parse().expect("numeric internal id");
    assert_ne!(RequestId::from(internal), RequestId::from(77));

    provider.deliver_result(internal, json!("0xsig"));
    let reply = caller.await.expect("caller task").expect("signature");
    assert_eq!(reply, RpcEnvelope::new(RequestId::from(77), json!("0xsig")));
    assert_eq!(provider.pending_calls(), 0);
}

#[tokio::test]
async fn transactions_are_refused_before_an_account_is_selected() {
    let (provider, mut host) = provider(ProviderConfig::new(1));
    let err = provider
        .request(Request::new("eth_sendTransaction", json!([{"to": ADDRESS, "value": "0x1"}])))
        .await
        .expect_err("not ready");
    assert_eq!(err.code(), 4100);
    assert!(host.try_recv().is_err());
}

#[tokio::test]
async fn unknown_methods_are_delegated_upstream() {
    let (provider, mut host) = provider(ProviderConfig::new(1).with_address(ADDRESS));

    let bare = provider.request(Request::new("foo_bar", json!([]))).await.expect("bare");
    assert_eq!(bare, json!("0x2a"));

    let envelope = provider
        .send_async(Request::new("foo_bar", json!([])).with_id("x"))
        .await
        .expect("envelope");
    assert_eq!(envelope, RpcEnvelope::new(RequestId::String("x".into()), json!("0x2a")));
    assert!(host.try_recv().is_err());
    assert_eq!(provider.correlated_ids(), 0);
}

#[tokio::test]
async fn concurrent_calls_sharing_an_id_are_routed_to_their_callers() {
    let (provider, host) = provider(ProviderConfig::new(1).with_address(ADDRESS));
    spawn_echo_host(provider.clone(), host);

    let first = provider
        .send_async(Request::new("personal_sign", json!(["0xaa", ADDRESS])).with_id(1));
    let second = provider
        .send_async(Request::new("personal_sign", json!(["0xbb", ADDRESS])).with_id(1));
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.expect("first"), RpcEnvelope::new(RequestId::from(1), json!("0xaa")));
    assert_eq!(second.expect("second"), RpcEnvelope::new(RequestId::from(1), json!("0xbb")));
    assert_eq!(provider.pending_calls(), 0);
    assert_eq!(provider.correlated_ids(), 0);
}

#[tokio::test]
async fn string_and_numeric_ids_stay_distinct() {
    let (provider, host) = provider(ProviderConfig::new(1).with_address(ADDRESS));
    spawn_echo_host(provider.clone(), host);

    let numeric = provider
        .send_async(Request::new("personal_sign", json!(["0x01", ADDRESS])).with_id(1))
        .await
        .expect("numeric");
    let string = provider
        .send_async(Request::new("personal_sign", json!(["0x02", ADDRESS])).with_id("1"))
        .await
        .expect("string");
    assert_eq!(numeric.id, RequestId::from(1));
    assert_eq!(string.id, RequestId::String("1".into()));
}

#[tokio::test]
async fn calls_without_an_id_reply_with_the_engine_id() {
    let (provider, mut host) =
        provider_with(ProviderConfig::new(1).with_address(ADDRESS), Arc::new(IdNode));

    let upstream_reply = provider
        .send_async(Request::new("eth_blockNumber", json!([])))
        .await
        .expect("upstream reply");
    let internal: InternalId =
        serde_json::from_value(upstream_reply.result.clone()).expect("node saw an internal id");
    assert_eq!(upstream_reply.id, RequestId::from(internal));

    let caller = {
        let provider = provider.clone();
        tokio::spawn(async move {
            provider
                .send_async(Request::new("personal_sign", json!(["0xdeadbeef", ADDRESS])))
                .await
        })
    };
    let message = host.recv().await.expect("host message");
    let internal: InternalId = message.id.parse().expect("numeric internal id");
    provider.deliver_result(internal, json!("0xsig"));
    let bridge_reply = caller.await.expect("caller task").expect("signature");
    assert_eq!(bridge_reply, RpcEnvelope::new(RequestId::from(internal), json!("0xsig")));
    assert_eq!(provider.correlated_ids(), 0);
}
