//! Request correlation and dispatch engine for an in-page dapp provider.
//!
//! A dapp talks JSON-RPC to the [`Provider`]. Each call gets a fresh internal id and is
//! then handled in one of three ways:
//!
//! - **answered locally** from the [`SessionState`] (accounts, chain id, network id)
//! - **posted to the host** application over a [`HostBridge`] as a named action, with the
//!   answer arriving later through [`Provider::deliver_result`] / [`Provider::deliver_error`]
//! - **delegated** to an [`UpstreamClient`] for everything the provider does not own
//!
//! Replies always carry the caller's original id. Account-bound actions are refused
//! (code 4100) until an address is configured; bootstrap actions such as
//! `eth_requestAccounts` are exempt.

pub mod bridge;
pub mod config;
pub mod correlator;
pub mod error;
pub mod events;
pub mod method;
pub mod payload;
pub mod registry;
pub mod session;
pub mod types;
pub mod upstream;

mod provider;

pub use bridge::{BridgeAction, BridgeMessage, ChannelBridge, HostBridge};
pub use config::{DappContext, ProviderConfig, DEFAULT_REQUEST_TIMEOUT_MS};
pub use error::{code as error_code, ProviderError, RpcError};
pub use events::ProviderEvent;
pub use method::{Method, Policy};
pub use provider::Provider;
pub use session::SessionState;
pub use types::{InternalId, Request, RequestId, RpcEnvelope, RpcRequest};
pub use upstream::UpstreamClient;
