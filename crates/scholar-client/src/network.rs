//! Wiring for the in-process development network.

use std::sync::Arc;

use tracing::info;

use scholar_fhe::{CryptoEngineProvider, LocalDevnet, RelayerLoader, SimulationLoader, SimulationMetadata};
use scholar_shared::ChainId;
use scholar_store::{Database, KeyValueStore, PublicKeyStorage};

use crate::config::ClientConfig;
use crate::error::{Result, ScholarError};
use crate::ledger::LocalLedger;

/// A local devnet with the Q&A contract deployed on it.
pub struct LocalNetwork {
    pub devnet: Arc<LocalDevnet>,
    pub ledger: Arc<LocalLedger>,
}

impl LocalNetwork {
    /// Start a devnet shaped like the local Hardhat node and deploy the
    /// contract at the configured address for the local chain.
    pub fn hardhat(config: &ClientConfig) -> Result<Self> {
        let metadata = SimulationMetadata::hardhat()
            .map_err(|e| ScholarError::EngineUnavailable(e.to_string()))?
            .with_rpc_url(config.rpc_url.clone());
        let contract = config.deployments.resolve(metadata.chain_id)?;

        let devnet = Arc::new(LocalDevnet::new(metadata));
        let ledger = Arc::new(LocalLedger::new(devnet.clone(), contract));
        info!(chain = %devnet.chain_id(), contract = %contract, "Local network up");
        Ok(Self { devnet, ledger })
    }

    pub fn chain_id(&self) -> ChainId {
        self.devnet.chain_id()
    }
}

/// Provider with the simulation path bound to `devnet` and the remote path
/// pointed at the configured relayer.
pub fn build_provider(
    config: &ClientConfig,
    store: Arc<dyn KeyValueStore>,
    devnet: Arc<LocalDevnet>,
) -> CryptoEngineProvider {
    CryptoEngineProvider::new(
        PublicKeyStorage::new(store),
        Arc::new(SimulationLoader::new(devnet)),
        Arc::new(RelayerLoader::new(reqwest::Client::new(), config.relayer_url.clone())),
    )
}

/// Open the durable store at the configured path, or the platform default
/// location when none is set.
pub fn open_store(config: &ClientConfig) -> Result<Arc<Database>> {
    let db = match &config.store_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    Ok(Arc::new(db))
}
