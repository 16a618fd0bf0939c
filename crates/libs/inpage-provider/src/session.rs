use serde::{Deserialize, Serialize};

/// Wallet session as the dapp sees it. Mutated only through explicit configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
    address: String,
    ready: bool,
    chain_id: String,
    network_id: String,
}

impl SessionState {
    pub fn new(chain_id: u64, address: Option<&str>) -> Self {
        let mut session = Self::default();
        session.set_chain_id(chain_id);
        session.set_address(address.unwrap_or_default());
        session
    }

    /// Stores the address lowercased; an empty address clears readiness.
    /// Returns `true` when the stored address changed.
    pub fn set_address(&mut self, address: &str) -> bool {
        let address = address.trim().to_ascii_lowercase();
        let changed = address != self.address;
        self.ready = !address.is_empty();
        self.address = address;
        changed
    }

    /// Returns `true` when the chain changed.
    pub fn set_chain_id(&mut self, chain_id: u64) -> bool {
        let hex = format!("0x{chain_id:x}");
        let changed = hex != self.chain_id;
        self.chain_id = hex;
        self.network_id = chain_id.to_string();
        changed
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    /// `eth_accounts` view: the selected address, or nothing before readiness.
    pub fn accounts(&self) -> Vec<String> {
        if self.ready {
            vec![self.address.clone()]
        } else {
            Vec::new()
        }
    }
}
