//! Client configuration loaded from environment variables.
//!
//! Defaults target the local development chain, so the client runs with zero
//! configuration against the in-process devnet.

use std::collections::HashMap;
use std::path::PathBuf;

use scholar_shared::constants::{
    DEFAULT_RECENT_QUESTIONS, DEFAULT_RELAYER_URL, DEFAULT_RPC_URL, LOCAL_CHAIN_ID,
    LOCAL_CONTRACT_ADDRESS,
};
use scholar_shared::{Address, ChainId};

use crate::error::{Result, ScholarError};

/// Where the Q&A contract is deployed, per chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployments {
    addresses: HashMap<ChainId, Address>,
}

impl Deployments {
    pub fn empty() -> Self {
        Self {
            addresses: HashMap::new(),
        }
    }

    pub fn insert(&mut self, chain_id: ChainId, contract: Address) {
        self.addresses.insert(chain_id, contract);
    }

    pub fn get(&self, chain_id: ChainId) -> Option<Address> {
        self.addresses.get(&chain_id).copied()
    }

    /// The contract address for `chain_id`, or `ContractUnavailable`.
    pub fn resolve(&self, chain_id: ChainId) -> Result<Address> {
        self.get(chain_id)
            .ok_or(ScholarError::ContractUnavailable(chain_id))
    }
}

impl Default for Deployments {
    fn default() -> Self {
        let mut deployments = Self::empty();
        match LOCAL_CONTRACT_ADDRESS.parse() {
            Ok(address) => deployments.insert(ChainId(LOCAL_CHAIN_ID), address),
            Err(e) => tracing::warn!(error = %e, "Invalid built-in local deployment address"),
        }
        deployments
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Active chain.
    /// Env: `SCHOLAR_CHAIN_ID`
    /// Default: `31337`
    pub chain_id: ChainId,

    /// JSON-RPC endpoint of the local node.
    /// Env: `SCHOLAR_RPC_URL`
    /// Default: `http://127.0.0.1:8545`
    pub rpc_url: String,

    /// Relayer base URL for non-local chains.
    /// Env: `SCHOLAR_RELAYER_URL`
    pub relayer_url: String,

    /// SQLite file for key material and grants. `None` uses the platform
    /// data directory.
    /// Env: `SCHOLAR_STORE_PATH`
    pub store_path: Option<PathBuf>,

    /// How many recent questions a refresh loads.
    /// Env: `SCHOLAR_RECENT_LIMIT`
    /// Default: `10`
    pub recent_limit: u64,

    /// Known contract deployments. `SCHOLAR_CONTRACT_ADDRESS` overrides the
    /// entry for the active chain.
    pub deployments: Deployments,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chain_id: ChainId(LOCAL_CHAIN_ID),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            relayer_url: DEFAULT_RELAYER_URL.to_string(),
            store_path: None,
            recent_limit: DEFAULT_RECENT_QUESTIONS,
            deployments: Deployments::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = var("SCHOLAR_CHAIN_ID") {
            match val.trim().parse::<u64>() {
                Ok(id) => config.chain_id = ChainId(id),
                Err(_) => tracing::warn!(value = %val, "Invalid SCHOLAR_CHAIN_ID, using default"),
            }
        }

        if let Some(url) = var("SCHOLAR_RPC_URL") {
            config.rpc_url = url;
        }

        if let Some(url) = var("SCHOLAR_RELAYER_URL") {
            config.relayer_url = url;
        }

        if let Some(path) = var("SCHOLAR_STORE_PATH") {
            if !path.is_empty() {
                config.store_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = var("SCHOLAR_RECENT_LIMIT") {
            match val.trim().parse::<u64>() {
                Ok(n) if n > 0 => config.recent_limit = n,
                _ => tracing::warn!(value = %val, "Invalid SCHOLAR_RECENT_LIMIT, using default"),
            }
        }

        if let Some(val) = var("SCHOLAR_CONTRACT_ADDRESS") {
            match val.parse::<Address>() {
                Ok(address) => config.deployments.insert(config.chain_id, address),
                Err(e) => tracing::warn!(
                    value = %val,
                    error = %e,
                    "Invalid SCHOLAR_CONTRACT_ADDRESS, ignoring"
                ),
            }
        }

        config
    }

    pub fn contract_address(&self) -> Result<Address> {
        self.deployments.resolve(self.chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.chain_id, ChainId(31337));
        assert_eq!(config.recent_limit, 10);
        assert_eq!(
            config.contract_address().unwrap().to_hex(),
            "0x5fbdb2315678afecb367f032d93f642f64180aa3"
        );
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("SCHOLAR_CHAIN_ID", "11155111"),
            ("SCHOLAR_RECENT_LIMIT", "25"),
            ("SCHOLAR_CONTRACT_ADDRESS", "0x1111111111111111111111111111111111111111"),
            ("SCHOLAR_STORE_PATH", "/tmp/scholar.db"),
        ]));
        assert_eq!(config.chain_id, ChainId(11155111));
        assert_eq!(config.recent_limit, 25);
        assert_eq!(config.contract_address().unwrap(), Address([0x11; 20]));
        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/scholar.db")));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("SCHOLAR_CHAIN_ID", "mainnet"),
            ("SCHOLAR_RECENT_LIMIT", "0"),
            ("SCHOLAR_CONTRACT_ADDRESS", "0x1234"),
        ]));
        assert_eq!(config.chain_id, ChainId(31337));
        assert_eq!(config.recent_limit, 10);
        assert_eq!(config.deployments, Deployments::default());
    }

    #[test]
    fn test_missing_deployment() {
        let config = ClientConfig::from_lookup(lookup(&[("SCHOLAR_CHAIN_ID", "11155111")]));
        assert_eq!(
            config.contract_address().unwrap_err(),
            ScholarError::ContractUnavailable(ChainId(11155111))
        );
    }
}
