use serde::{Deserialize, Serialize};

/// EIP-1193 provider events, fanned out over a `tokio::sync::broadcast` channel.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ProviderEvent {
    #[serde(rename_all = "camelCase")]
    ChainChanged { chain_id: String },
    AccountsChanged { accounts: Vec<String> },
}

pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;
