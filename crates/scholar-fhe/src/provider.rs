//! Engine lifecycle for the active chain.
//!
//! `initialize` may be called again whenever the active chain changes. Each
//! call takes a generation number; only the newest generation is allowed to
//! publish its outcome, so a slow load for an old chain can never overwrite
//! the engine for the current one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use scholar_shared::constants::SUPPORTED_CHAIN_IDS;
use scholar_shared::{ChainId, EnginePublicKey};
use scholar_store::PublicKeyStorage;

use crate::engine::FheEngine;
use crate::error::{FheError, Result};
use crate::loader::EngineLoader;

/// A ready engine together with the chain and key it was built for.
#[derive(Clone)]
pub struct EngineConfig {
    pub chain_id: ChainId,
    pub public_key: EnginePublicKey,
    pub engine: Arc<dyn FheEngine>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("chain_id", &self.chain_id)
            .field("kind", &self.engine.kind())
            .field("public_key", &self.public_key)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum EngineStatus {
    Idle,
    Loading { chain_id: ChainId },
    Ready(Arc<EngineConfig>),
    Error { chain_id: ChainId, error: FheError },
}

impl EngineStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }
}

pub struct CryptoEngineProvider {
    key_store: PublicKeyStorage,
    simulation: Arc<dyn EngineLoader>,
    remote: Arc<dyn EngineLoader>,
    supported: Vec<ChainId>,
    generation: AtomicU64,
    status: watch::Sender<EngineStatus>,
}

impl CryptoEngineProvider {
    pub fn new(
        key_store: PublicKeyStorage,
        simulation: Arc<dyn EngineLoader>,
        remote: Arc<dyn EngineLoader>,
    ) -> Self {
        let (status, _) = watch::channel(EngineStatus::Idle);
        Self {
            key_store,
            simulation,
            remote,
            supported: SUPPORTED_CHAIN_IDS.iter().copied().map(ChainId).collect(),
            generation: AtomicU64::new(0),
            status,
        }
    }

    pub fn supports(&self, chain_id: ChainId) -> bool {
        self.supported.contains(&chain_id)
    }

    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status.subscribe()
    }

    /// The ready engine, or `NotReady` while loading or after a failure.
    pub fn ready(&self) -> Result<Arc<EngineConfig>> {
        match &*self.status.borrow() {
            EngineStatus::Ready(config) => Ok(config.clone()),
            _ => Err(FheError::NotReady),
        }
    }

    /// Build the engine for `chain_id` and publish it as the current engine.
    ///
    /// Returns `Superseded` when a later call started before this one
    /// finished; the later call owns the published status.
    pub async fn initialize(&self, chain_id: ChainId) -> Result<Arc<EngineConfig>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.publish(generation, EngineStatus::Loading { chain_id });
        info!(chain = %chain_id, generation, "Initializing FHE engine");

        match self.load(chain_id).await {
            Ok(config) => {
                self.key_store
                    .store_public_key(chain_id, &config.public_key)
                    .await;
                if self.publish(generation, EngineStatus::Ready(config.clone())) {
                    info!(chain = %chain_id, kind = %config.engine.kind(), "FHE engine ready");
                    Ok(config)
                } else {
                    Err(FheError::Superseded(chain_id))
                }
            }
            Err(error) => {
                warn!(chain = %chain_id, error = %error, "FHE engine initialization failed");
                let published = self.publish(
                    generation,
                    EngineStatus::Error {
                        chain_id,
                        error: error.clone(),
                    },
                );
                if published {
                    Err(error)
                } else {
                    Err(FheError::Superseded(chain_id))
                }
            }
        }
    }

    async fn load(&self, chain_id: ChainId) -> Result<Arc<EngineConfig>> {
        if !self.supports(chain_id) {
            return Err(FheError::UnsupportedNetwork(chain_id));
        }

        let engine = if chain_id.is_local() {
            self.simulation.load(chain_id, None).await?
        } else {
            let cached = self
                .key_store
                .get_public_key(chain_id)
                .await
                .map(|record| record.public_key);
            self.remote.load(chain_id, cached).await?
        };

        Ok(Arc::new(EngineConfig {
            chain_id,
            public_key: engine.public_key().clone(),
            engine,
        }))
    }

    // The generation check runs under the channel lock, so it is atomic with
    // respect to every other publish.
    fn publish(&self, generation: u64, status: EngineStatus) -> bool {
        let published = self.status.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = status;
            true
        });
        if !published {
            debug!(generation, "Discarding stale engine status");
        }
        published
    }
}
