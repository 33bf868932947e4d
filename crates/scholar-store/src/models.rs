//! Records persisted through a [`KeyValueStore`](crate::KeyValueStore).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scholar_shared::{ChainId, EnginePublicKey};

/// Cached public key material for one network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyMaterialRecord {
    pub chain_id: ChainId,
    pub public_key: EnginePublicKey,
    /// When the key was written to the cache.
    pub stored_at: DateTime<Utc>,
}
