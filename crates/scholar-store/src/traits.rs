//! Storage trait definitions

use async_trait::async_trait;

use scholar_shared::constants::STORAGE_NAMESPACE;

use crate::error::Result;

/// Build a namespaced key: `fhevm:<part>:<part>...`
pub fn namespaced_key(parts: &[&str]) -> String {
    let mut key = String::from(STORAGE_NAMESPACE);
    for part in parts {
        key.push(':');
        key.push_str(part);
    }
    key
}

/// String key-value storage.
///
/// Absence is `Ok(None)`, never an error. Values are opaque strings; callers
/// own the encoding (JSON for every current caller).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Returns `Ok(())` even if the key didn't exist.
    async fn remove(&self, key: &str) -> Result<()>;
}
