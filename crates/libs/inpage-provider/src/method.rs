//! Closed method table: every supported method name maps to exactly one dispatch policy.

use crate::bridge::BridgeAction;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalValue {
    Accounts,
    Coinbase,
    NetworkId,
    ChainId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypedDataVersion {
    V3,
    V4,
}

impl TypedDataVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V3 => "v3",
            Self::V4 => "v4",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Method {
    EthAccounts,
    EthCoinbase,
    NetVersion,
    EthChainId,
    EthSign,
    PersonalSign,
    PersonalEcRecover,
    EthSignTypedData(TypedDataVersion),
    EthSendTransaction,
    EthRequestAccounts,
    WalletWatchAsset,
    WalletAddEthereumChain,
    WalletSwitchEthereumChain,
    WalletGetPermissions,
    WalletRequestPermissions,
    EthNewFilter,
    EthNewBlockFilter,
    EthNewPendingTransactionFilter,
    EthUninstallFilter,
    EthGetFilterChanges,
    EthGetFilterLogs,
    EthSubscribe,
    EthUnsubscribe,
    /// Any method without a local policy.
    Other(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Policy {
    Local(LocalValue),
    Bridge(BridgeAction),
    Unsupported,
    Fallback,
}

impl Method {
    pub fn from_name(name: &str) -> Self {
        match name {
            "eth_accounts" => Self::EthAccounts,
            "eth_coinbase" => Self::EthCoinbase,
            "net_version" => Self::NetVersion,
            "eth_chainId" => Self::EthChainId,
            "eth_sign" => Self::EthSign,
            "personal_sign" => Self::PersonalSign,
            "personal_ecRecover" => Self::PersonalEcRecover,
            "eth_signTypedData" | "eth_signTypedData_v4" => {
                Self::EthSignTypedData(TypedDataVersion::V4)
            }
            "eth_signTypedData_v3" => Self::EthSignTypedData(TypedDataVersion::V3),
            "eth_sendTransaction" => Self::EthSendTransaction,
            "eth_requestAccounts" => Self::EthRequestAccounts,
            "wallet_watchAsset" => Self::WalletWatchAsset,
            "wallet_addEthereumChain" => Self::WalletAddEthereumChain,
            "wallet_switchEthereumChain" => Self::WalletSwitchEthereumChain,
            "wallet_getPermissions" => Self::WalletGetPermissions,
            "wallet_requestPermissions" => Self::WalletRequestPermissions,
            "eth_newFilter" => Self::EthNewFilter,
            "eth_newBlockFilter" => Self::EthNewBlockFilter,
            "eth_newPendingTransactionFilter" => Self::EthNewPendingTransactionFilter,
            "eth_uninstallFilter" => Self::EthUninstallFilter,
            "eth_getFilterChanges" => Self::EthGetFilterChanges,
            "eth_getFilterLogs" => Self::EthGetFilterLogs,
            "eth_subscribe" => Self::EthSubscribe,
            "eth_unsubscribe" => Self::EthUnsubscribe,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn policy(&self) -> Policy {
        match self {
            Self::EthAccounts => Policy::Local(LocalValue::Accounts),
            Self::EthCoinbase => Policy::Local(LocalValue::Coinbase),
            Self::NetVersion => Policy::Local(LocalValue::NetworkId),
            Self::EthChainId => Policy::Local(LocalValue::ChainId),
            // Picked between signMessage and signPersonalMessage once the payload is decoded.
            Self::EthSign => Policy::Bridge(BridgeAction::SignMessage),
            Self::PersonalSign => Policy::Bridge(BridgeAction::SignPersonalMessage),
            Self::PersonalEcRecover => Policy::Bridge(BridgeAction::EcRecover),
            Self::EthSignTypedData(_) => Policy::Bridge(BridgeAction::SignTypedMessage),
            Self::EthSendTransaction => Policy::Bridge(BridgeAction::SignTransaction),
            Self::EthRequestAccounts => Policy::Bridge(BridgeAction::RequestAccounts),
            Self::WalletWatchAsset => Policy::Bridge(BridgeAction::WatchAsset),
            Self::WalletAddEthereumChain => Policy::Bridge(BridgeAction::AddEthereumChain),
            Self::WalletSwitchEthereumChain => Policy::Bridge(BridgeAction::SwitchEthereumChain),
            Self::WalletGetPermissions => Policy::Bridge(BridgeAction::GetPermissions),
            Self::WalletRequestPermissions => Policy::Bridge(BridgeAction::RequestPermissions),
            Self::EthNewFilter
            | Self::EthNewBlockFilter
            | Self::EthNewPendingTransactionFilter
            | Self::EthUninstallFilter
            | Self::EthGetFilterChanges
            | Self::EthGetFilterLogs
            | Self::EthSubscribe
            | Self::EthUnsubscribe => Policy::Unsupported,
            Self::Other(_) => Policy::Fallback,
        }
    }
}
