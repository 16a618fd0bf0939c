use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

use crate::error::ProviderError;

/// Named actions the host application understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BridgeAction {
    SignMessage,
    SignPersonalMessage,
    EcRecover,
    SignTypedMessage,
    SignTransaction,
    RequestAccounts,
    WatchAsset,
    AddEthereumChain,
    SwitchEthereumChain,
    GetPermissions,
    RequestPermissions,
}

impl BridgeAction {
    pub fn name(self) -> &'static str {
        match self {
            Self::SignMessage => "signMessage",
            Self::SignPersonalMessage => "signPersonalMessage",
            Self::EcRecover => "ecRecover",
            Self::SignTypedMessage => "signTypedMessage",
            Self::SignTransaction => "signTransaction",
            Self::RequestAccounts => "requestAccounts",
            Self::WatchAsset => "watchAsset",
            Self::AddEthereumChain => "addEthereumChain",
            Self::SwitchEthereumChain => "switchEthereumChain",
            Self::GetPermissions => "getPermissions",
            Self::RequestPermissions => "requestPermissions",
        }
    }

    /// Bootstrap actions: they exist to establish readiness, so they may run before it.
    pub fn allowed_before_ready(self) -> bool {
        matches!(
            self,
            Self::RequestAccounts
                | Self::AddEthereumChain
                | Self::SwitchEthereumChain
                | Self::GetPermissions
                | Self::RequestPermissions
        )
    }
}

/// One message on the one-way channel to the host.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BridgeMessage {
    pub name: String,
    pub payload: JsonValue,
    /// String form of the internal id; the host echoes it back when answering.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl BridgeMessage {
    pub fn to_json(&self) -> Result<String, ProviderError> {
        serde_json::to_string(self).map_err(|err| ProviderError::internal(err.to_string()))
    }
}

/// Delivery side of the host channel. Fire-and-forget: the answer comes back through
/// `Provider::deliver_result` / `Provider::deliver_error`.
pub trait HostBridge: Send + Sync {
    fn post(&self, message: BridgeMessage) -> Result<(), ProviderError>;
}

/// Host bridge over an unbounded tokio channel; the host side drains the receiver.
#[derive(Clone, Debug)]
pub struct ChannelBridge {
    sender: mpsc::UnboundedSender<BridgeMessage>,
}

impl ChannelBridge {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BridgeMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl HostBridge for ChannelBridge {
    fn post(&self, message: BridgeMessage) -> Result<(), ProviderError> {
        self.sender.send(message).map_err(|err| ProviderError::BridgeUnavailable {
            reason: format!("host channel closed, dropped '{}'", err.0.name),
        })
    }
}
