use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use scholar_shared::{ChainId, EnginePublicKey};

use crate::engine::FheEngine;
use crate::error::{FheError, Result};
use crate::remote::RelayerEngine;
use crate::simulation::{LocalDevnet, SimulationEngine};

/// Builds an engine for one chain. The provider picks a loader per chain and
/// never cares which concrete engine comes back.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self, chain_id: ChainId, cached_key: Option<EnginePublicKey>) -> Result<Arc<dyn FheEngine>>;
}

/// Loads the simulation engine bound to an in-process devnet.
pub struct SimulationLoader {
    devnet: Arc<LocalDevnet>,
}

impl SimulationLoader {
    pub fn new(devnet: Arc<LocalDevnet>) -> Self {
        Self { devnet }
    }
}

#[async_trait]
impl EngineLoader for SimulationLoader {
    async fn load(&self, chain_id: ChainId, _cached_key: Option<EnginePublicKey>) -> Result<Arc<dyn FheEngine>> {
        if chain_id != self.devnet.chain_id() {
            return Err(FheError::EngineUnavailable(format!(
                "local devnet runs chain {}, not {}",
                self.devnet.chain_id(),
                chain_id
            )));
        }
        debug!(rpc = %self.devnet.metadata().rpc_url, "Loading simulation engine");
        Ok(Arc::new(SimulationEngine::new(self.devnet.clone())))
    }
}

/// Loads a relayer-backed engine, reusing a cached public key when present.
pub struct RelayerLoader {
    http: reqwest::Client,
    base_url: String,
}

impl RelayerLoader {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl EngineLoader for RelayerLoader {
    async fn load(&self, chain_id: ChainId, cached_key: Option<EnginePublicKey>) -> Result<Arc<dyn FheEngine>> {
        let public_key = match cached_key {
            Some(key) => {
                debug!(chain = %chain_id, "Using cached network public key");
                key
            }
            None => RelayerEngine::fetch_public_key(&self.http, &self.base_url, chain_id).await?,
        };
        Ok(Arc::new(RelayerEngine::new(
            self.http.clone(),
            self.base_url.clone(),
            chain_id,
            public_key,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineKind;

    #[tokio::test]
    async fn test_simulation_loader_checks_chain() {
        let loader = SimulationLoader::new(Arc::new(LocalDevnet::hardhat().unwrap()));
        let engine = loader.load(ChainId(31337), None).await.unwrap();
        assert_eq!(engine.kind(), EngineKind::Simulation);

        assert!(matches!(
            loader.load(ChainId(1), None).await,
            Err(FheError::EngineUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_relayer_loader_uses_cached_key_without_network() {
        // unroutable base url: any request would fail
        let loader = RelayerLoader::new(reqwest::Client::new(), "http://127.0.0.1:1");
        let cached = EnginePublicKey(vec![0xCD; 16]);
        let engine = loader.load(ChainId(11155111), Some(cached.clone())).await.unwrap();
        assert_eq!(engine.public_key(), &cached);
        assert_eq!(engine.kind(), EngineKind::Relayer);
    }
}
