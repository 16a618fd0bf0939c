use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 300_000;

/// Provider configuration, as injected by the host page script (JSON) or read from a
/// TOML file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(alias = "chain_id")]
    pub chain_id: u64,
    #[serde(default)]
    pub address: Option<String>,
    /// Forward methods without a local policy to the host instead of the upstream node.
    #[serde(default)]
    pub proxy: bool,
    #[serde(default, alias = "is_debug")]
    pub is_debug: bool,
    /// Per-call bound for host and upstream answers; `0` waits forever.
    #[serde(default = "default_request_timeout_ms", alias = "request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl ProviderConfig {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            address: None,
            proxy: false,
            is_debug: false,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_proxy(mut self, proxy: bool) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    pub fn from_json_str(input: &str) -> Result<Self, ProviderError> {
        let config: Self =
            serde_json::from_str(input).map_err(|err| ProviderError::config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(input: &str) -> Result<Self, ProviderError> {
        let config: Self =
            toml::from_str(input).map_err(|err| ProviderError::config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ProviderError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|err| {
            ProviderError::config(format!("{}: {err}", path.as_ref().display()))
        })?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.chain_id == 0 {
            return Err(ProviderError::config("chainId must be non-zero"));
        }
        if let Some(address) = self.address.as_deref() {
            if !address.is_empty() && !address.starts_with("0x") && !address.starts_with("0X") {
                return Err(ProviderError::config(format!(
                    "address '{address}' must be 0x-prefixed"
                )));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

/// Page context attached to bootstrap actions so the host can show who is asking.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DappContext {
    pub origin: String,
    #[serde(default)]
    pub icon: Option<String>,
}

impl DappContext {
    pub fn new(origin: impl Into<String>) -> Self {
        Self { origin: origin.into(), icon: None }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_injected_json_with_defaults() {
        let config = ProviderConfig::from_json_str(r#"{"chainId": 1}"#).expect("parse config");
        assert_eq!(config, ProviderConfig::new(1));
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(300_000)));
    }

    #[test]
    fn parses_toml_with_snake_case_keys() {
        let config = ProviderConfig::from_toml(
            r#"
chain_id = 56
address = "0xAbC"
proxy = true
request_timeout_ms = 0
"#,
        )
        .expect("parse config");
        assert_eq!(config.chain_id, 56);
        assert_eq!(config.address.as_deref(), Some("0xAbC"));
        assert!(config.proxy);
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn rejects_zero_chain_and_bare_address() {
        let err = ProviderConfig::from_json_str(r#"{"chainId": 0}"#).expect_err("zero chain");
        assert!(matches!(err, ProviderError::Config { .. }));

        let err = ProviderConfig::new(1).with_address("abc").validate().expect_err("bad address");
        assert!(matches!(err, ProviderError::Config { .. }));
        assert!(ProviderConfig::new(1).with_address("").validate().is_ok());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = ProviderConfig::from_path("/nonexistent/provider.toml").expect_err("missing");
        assert!(matches!(err, ProviderError::Config { .. }));
    }
}
