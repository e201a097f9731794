//! Chain registry: which contract on which RPC endpoint, per chain id.
//!
//! Built explicitly and injected. The defaults in [`ChainRegistry::with_defaults`]
//! mirror the deployments we know about; operators can replace them with a
//! JSON file and tests build their own.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::LedgerError;
use crate::config::{
    ARBITRUM_SEPOLIA_CHAIN_ID, ARBITRUM_SEPOLIA_CONTRACT, ARBITRUM_SEPOLIA_RPC,
    BASE_SEPOLIA_CHAIN_ID, BASE_SEPOLIA_RPC, SEPOLIA_CHAIN_ID, SEPOLIA_RPC, UNDEPLOYED_CONTRACT,
};

/// Where the ledger lives on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub contract_address: String,
    pub rpc_endpoint: String,
}

impl ChainConfig {
    pub fn new(
        chain_id: u64,
        name: impl Into<String>,
        contract_address: impl Into<String>,
        rpc_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            chain_id,
            name: name.into(),
            contract_address: contract_address.into(),
            rpc_endpoint: rpc_endpoint.into(),
        }
    }

    /// `true` when the entry still points at the all-zero placeholder.
    pub fn is_deployed(&self) -> bool {
        !self.contract_address.eq_ignore_ascii_case(UNDEPLOYED_CONTRACT)
    }
}

/// Static chain id → [`ChainConfig`] map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainRegistry {
    chains: BTreeMap<u64, ChainConfig>,
}

impl ChainRegistry {
    /// An empty registry. Every lookup fails closed.
    pub fn new() -> Self {
        Self::default()
    }

    /// The known deployments: Arbitrum Sepolia (live), Base Sepolia and
    /// Sepolia (registered, not yet deployed).
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert(ChainConfig::new(
            ARBITRUM_SEPOLIA_CHAIN_ID,
            "arbitrum-sepolia",
            ARBITRUM_SEPOLIA_CONTRACT,
            ARBITRUM_SEPOLIA_RPC,
        ));
        registry.insert(ChainConfig::new(
            BASE_SEPOLIA_CHAIN_ID,
            "base-sepolia",
            UNDEPLOYED_CONTRACT,
            BASE_SEPOLIA_RPC,
        ));
        registry.insert(ChainConfig::new(
            SEPOLIA_CHAIN_ID,
            "sepolia",
            UNDEPLOYED_CONTRACT,
            SEPOLIA_RPC,
        ));
        registry
    }

    /// Parse a JSON array of [`ChainConfig`] entries.
    pub fn from_json_str(json: &str) -> Result<Self, LedgerError> {
        let entries: Vec<ChainConfig> =
            serde_json::from_str(json).map_err(|e| LedgerError::Registry(e.to_string()))?;
        let mut registry = Self::new();
        for entry in entries {
            if registry.chains.contains_key(&entry.chain_id) {
                return Err(LedgerError::Registry(format!(
                    "duplicate chain id {}",
                    entry.chain_id
                )));
            }
            registry.insert(entry);
        }
        Ok(registry)
    }

    /// Load a registry file (see [`from_json_str`](Self::from_json_str)).
    pub fn from_json_file(path: &Path) -> Result<Self, LedgerError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Registry(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, chain: ChainConfig) {
        self.chains.insert(chain.chain_id, chain);
    }

    /// Look up a chain. Unknown ids and undeployed placeholders both fail.
    /// This is a pure map lookup; nothing touches the network.
    pub fn resolve(&self, chain_id: u64) -> Result<ChainConfig, LedgerError> {
        let chain = self
            .chains
            .get(&chain_id)
            .ok_or_else(|| LedgerError::UnsupportedChain {
                chain_id,
                supported: self.supported_list(),
            })?;
        if !chain.is_deployed() {
            return Err(LedgerError::ContractNotDeployed(chain_id));
        }
        Ok(chain.clone())
    }

    pub fn supported_chain_ids(&self) -> Vec<u64> {
        self.chains.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.values()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    fn supported_list(&self) -> String {
        let ids: Vec<String> = self.supported_chain_ids().iter().map(u64::to_string).collect();
        if ids.is_empty() {
            "none".to_string()
        } else {
            ids.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults_resolve_arbitrum_sepolia() {
        let registry = ChainRegistry::with_defaults();
        let chain = registry.resolve(421_614).unwrap();
        assert_eq!(chain.contract_address, ARBITRUM_SEPOLIA_CONTRACT);
        assert_eq!(chain.rpc_endpoint, ARBITRUM_SEPOLIA_RPC);
        assert_eq!(registry.supported_chain_ids(), vec![84_532, 421_614, 11_155_111]);
    }

    #[test]
    fn test_unknown_chain_fails_closed() {
        let registry = ChainRegistry::with_defaults();
        match registry.resolve(999_999) {
            Err(LedgerError::UnsupportedChain { chain_id, supported }) => {
                assert_eq!(chain_id, 999_999);
                assert!(supported.contains("421614"));
            }
            other => panic!("expected UnsupportedChain, got {other:?}"),
        }
    }

    #[test]
    fn test_placeholder_contract_fails_closed() {
        let registry = ChainRegistry::with_defaults();
        assert_eq!(
            registry.resolve(84_532),
            Err(LedgerError::ContractNotDeployed(84_532))
        );
    }

    #[test]
    fn test_empty_registry_rejects_everything() {
        let registry = ChainRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.resolve(421_614),
            Err(LedgerError::UnsupportedChain { .. })
        ));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"chain_id": 31337, "name": "anvil",
                 "contract_address": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                 "rpc_endpoint": "http://127.0.0.1:8545"}}]"#
        )
        .unwrap();
        let registry = ChainRegistry::from_json_file(file.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve(31_337).unwrap().name, "anvil");
    }

    #[test]
    fn test_duplicate_chain_ids_rejected() {
        let json = r#"[
            {"chain_id": 1, "name": "a", "contract_address": "0x01", "rpc_endpoint": "x"},
            {"chain_id": 1, "name": "b", "contract_address": "0x02", "rpc_endpoint": "y"}
        ]"#;
        assert!(matches!(
            ChainRegistry::from_json_str(json),
            Err(LedgerError::Registry(_))
        ));
    }
}
