//! Host action payloads built from normalized requests.

use serde_json::{json, Value as JsonValue};

use crate::bridge::BridgeAction;
use crate::error::ProviderError;
use crate::method::{Method, TypedDataVersion};
use crate::types::RpcRequest;

#[derive(Clone, Debug, PartialEq)]
pub struct ActionPayload {
    pub action: BridgeAction,
    pub payload: JsonValue,
}

impl ActionPayload {
    fn new(action: BridgeAction, payload: JsonValue) -> Self {
        Self { action, payload }
    }
}

/// Builds the host payload for a bridge-routed method. `action` is the table's default,
/// which `eth_sign` may override after inspecting its message.
pub fn build(
    method: &Method,
    action: BridgeAction,
    request: &RpcRequest,
) -> Result<ActionPayload, ProviderError> {
    match method {
        Method::EthSign => eth_sign(request),
        Method::PersonalSign => personal_sign(request),
        Method::PersonalEcRecover => ec_recover(request),
        Method::EthSignTypedData(version) => sign_typed_data(request, *version),
        Method::EthSendTransaction => {
            let tx = required_object(request, 0, "transaction")?;
            Ok(ActionPayload::new(action, tx.clone()))
        }
        Method::WalletWatchAsset => watch_asset(request),
        Method::WalletAddEthereumChain => {
            let chain = required_object(request, 0, "chain parameters")?;
            required_str(chain, "chainId", &request.method)?;
            Ok(ActionPayload::new(action, chain.clone()))
        }
        Method::WalletSwitchEthereumChain => {
            let chain = required_object(request, 0, "chain parameters")?;
            let chain_id = required_str(chain, "chainId", &request.method)?;
            Ok(ActionPayload::new(action, json!({ "chainId": chain_id })))
        }
        Method::EthRequestAccounts => Ok(ActionPayload::new(action, json!({}))),
        Method::WalletGetPermissions | Method::WalletRequestPermissions => {
            let permissions = request.param(0).cloned().unwrap_or_else(|| json!({}));
            Ok(ActionPayload::new(action, permissions))
        }
        _ => Err(ProviderError::internal(format!(
            "method '{}' has no host payload",
            request.method
        ))),
    }
}

/// Whole-request payload used when proxy mode forwards an unknown method to the host.
pub fn forward(request: &RpcRequest) -> JsonValue {
    json!({
        "jsonrpc": request.jsonrpc,
        "id": request.id,
        "method": request.method,
        "params": request.params,
    })
}

/// Decodes a message the way dapps encode them: hex strings (with or without `0x`) are
/// decoded up to the first non-hex pair; anything that is not hex decodes to nothing.
/// Byte arrays are taken as-is.
pub fn message_to_bytes(message: &JsonValue) -> Vec<u8> {
    match message {
        JsonValue::String(text) => {
            let digits = text.strip_prefix("0x").unwrap_or(text);
            let valid = digits.bytes().take_while(u8::is_ascii_hexdigit).count() & !1;
            hex::decode(&digits[..valid]).unwrap_or_default()
        }
        JsonValue::Array(items) => items
            .iter()
            .map_while(|item| item.as_u64().and_then(|byte| u8::try_from(byte).ok()))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn to_prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn eth_sign(request: &RpcRequest) -> Result<ActionPayload, ProviderError> {
    let message = request
        .param(1)
        .ok_or_else(|| ProviderError::invalid_params(&request.method, "missing message"))?;
    let bytes = message_to_bytes(message);
    let action = if std::str::from_utf8(&bytes).is_ok() {
        BridgeAction::SignPersonalMessage
    } else {
        BridgeAction::SignMessage
    };
    Ok(ActionPayload::new(action, json!({ "data": to_prefixed_hex(&bytes) })))
}

fn personal_sign(request: &RpcRequest) -> Result<ActionPayload, ProviderError> {
    let message = request
        .param(0)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| ProviderError::invalid_params(&request.method, "missing message"))?;
    let data = if message_to_bytes(&JsonValue::String(message.to_owned())).is_empty() {
        // Plain text: the host signs hex.
        to_prefixed_hex(message.as_bytes())
    } else {
        message.to_owned()
    };
    Ok(ActionPayload::new(BridgeAction::SignPersonalMessage, json!({ "data": data })))
}

fn ec_recover(request: &RpcRequest) -> Result<ActionPayload, ProviderError> {
    let message = request
        .param(0)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| ProviderError::invalid_params(&request.method, "missing message"))?;
    let signature = request
        .param(1)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| ProviderError::invalid_params(&request.method, "missing signature"))?;
    Ok(ActionPayload::new(
        BridgeAction::EcRecover,
        json!({ "message": message, "signature": signature }),
    ))
}

fn sign_typed_data(
    request: &RpcRequest,
    version: TypedDataVersion,
) -> Result<ActionPayload, ProviderError> {
    let raw = match request.param(1) {
        Some(JsonValue::String(raw)) => raw.clone(),
        Some(value @ JsonValue::Object(_)) => value.to_string(),
        _ => return Err(ProviderError::invalid_params(&request.method, "missing typed data")),
    };
    let mut payload = json!({ "raw": raw, "version": version.as_str() });
    if let Some(address) = request.param(0).and_then(JsonValue::as_str) {
        payload["address"] = JsonValue::String(address.to_ascii_lowercase());
    }
    Ok(ActionPayload::new(BridgeAction::SignTypedMessage, payload))
}

fn watch_asset(request: &RpcRequest) -> Result<ActionPayload, ProviderError> {
    // EIP-747 sends an object; some dapps wrap it in a one-element array.
    let params = match &request.params {
        JsonValue::Object(_) => &request.params,
        _ => required_object(request, 0, "asset")?,
    };
    let options = params
        .get("options")
        .filter(|options| options.is_object())
        .ok_or_else(|| ProviderError::invalid_params(&request.method, "missing asset options"))?;
    let contract = required_str(options, "address", &request.method)?;
    Ok(ActionPayload::new(
        BridgeAction::WatchAsset,
        json!({
            "type": params.get("type").cloned().unwrap_or(JsonValue::Null),
            "contract": contract,
            "symbol": options.get("symbol").cloned().unwrap_or(JsonValue::Null),
            "decimals": options.get("decimals").cloned().unwrap_or(JsonValue::Null),
            "image": options.get("image").cloned().unwrap_or(JsonValue::Null),
        }),
    ))
}

fn required_object<'a>(
    request: &'a RpcRequest,
    index: usize,
    what: &str,
) -> Result<&'a JsonValue, ProviderError> {
    request
        .param(index)
        .filter(|value| value.is_object())
        .ok_or_else(|| ProviderError::invalid_params(&request.method, format!("missing {what}")))
}

fn required_str<'a>(
    object: &'a JsonValue,
    field: &str,
    method: &str,
) -> Result<&'a str, ProviderError> {
    object
        .get(field)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| ProviderError::invalid_params(method, format!("missing '{field}'")))
}
