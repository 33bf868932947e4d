//! Read-through cache of engine public keys, keyed by network.
//!
//! Every failure here is non-fatal: a broken or missing entry only means the
//! key gets fetched again, so errors are logged and swallowed.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use scholar_shared::{ChainId, EnginePublicKey};

use crate::models::KeyMaterialRecord;
use crate::traits::{namespaced_key, KeyValueStore};

#[derive(Clone)]
pub struct PublicKeyStorage {
    store: Arc<dyn KeyValueStore>,
}

impl PublicKeyStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(chain_id: ChainId) -> String {
        namespaced_key(&["publicKey", &chain_id.to_string()])
    }

    pub async fn store_public_key(&self, chain_id: ChainId, public_key: &EnginePublicKey) {
        let record = KeyMaterialRecord {
            chain_id,
            public_key: public_key.clone(),
            stored_at: Utc::now(),
        };
        let json = match serde_json::to_string(&record) {
            Ok(json) => json,
            Err(e) => {
                warn!(chain_id = %chain_id, error = %e, "failed to encode public key record");
                return;
            }
        };
        match self.store.set(&Self::key(chain_id), &json).await {
            Ok(()) => debug!(chain_id = %chain_id, "stored public key"),
            Err(e) => warn!(chain_id = %chain_id, error = %e, "failed to store public key (non-critical)"),
        }
    }

    pub async fn get_public_key(&self, chain_id: ChainId) -> Option<KeyMaterialRecord> {
        let raw = match self.store.get(&Self::key(chain_id)).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(chain_id = %chain_id, error = %e, "failed to read public key");
                return None;
            }
        };
        match serde_json::from_str::<KeyMaterialRecord>(&raw) {
            Ok(record) if record.chain_id == chain_id => Some(record),
            Ok(record) => {
                warn!(chain_id = %chain_id, stored = %record.chain_id, "public key record under wrong chain, ignoring");
                None
            }
            Err(e) => {
                warn!(chain_id = %chain_id, error = %e, "corrupt public key record, ignoring");
                None
            }
        }
    }

    pub async fn clear_public_key(&self, chain_id: ChainId) {
        if let Err(e) = self.store.remove(&Self::key(chain_id)).await {
            warn!(chain_id = %chain_id, error = %e, "failed to clear public key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn storage() -> (Arc<MemoryStore>, PublicKeyStorage) {
        let store = Arc::new(MemoryStore::new());
        let storage = PublicKeyStorage::new(store.clone());
        (store, storage)
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let (_, storage) = storage();
        let key = EnginePublicKey(vec![1, 2, 3]);
        storage.store_public_key(ChainId(31337), &key).await;

        let record = storage.get_public_key(ChainId(31337)).await.unwrap();
        assert_eq!(record.public_key, key);
        assert_eq!(record.chain_id, ChainId(31337));
        assert!(storage.get_public_key(ChainId(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let (_, storage) = storage();
        storage
            .store_public_key(ChainId(11155111), &EnginePublicKey(vec![9]))
            .await;
        storage.clear_public_key(ChainId(11155111)).await;
        assert!(storage.get_public_key(ChainId(11155111)).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_absent() {
        let (store, storage) = storage();
        store.set("fhevm:publicKey:31337", "not json").await.unwrap();
        assert!(storage.get_public_key(ChainId(31337)).await.is_none());
    }

    #[tokio::test]
    async fn test_key_format() {
        let (store, storage) = storage();
        storage
            .store_public_key(ChainId(31337), &EnginePublicKey(vec![0xAB]))
            .await;
        let raw = store.get("fhevm:publicKey:31337").await.unwrap().unwrap();
        assert!(raw.contains("\"publicKey\":\"0xab\""));
    }
}
