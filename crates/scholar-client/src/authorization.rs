//! Decryption grants: obtain, cache, persist.
//!
//! A grant binds one engine public key and one ciphertext, so it is cached
//! under that pair (and the signer). Lookup goes session cache, then the
//! key-value store, then a fresh wallet signature. Only successful
//! signatures are ever cached.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use scholar_shared::{Address, DecryptionGrant, EnginePublicKey, Handle, ReencryptMessage, TypedDataDomain};
use scholar_store::{namespaced_key, KeyValueStore};

use crate::error::Result;
use crate::wallet::WalletSigner;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GrantKey {
    signer: Address,
    public_key: EnginePublicKey,
    ciphertext: Handle,
}

impl GrantKey {
    // Engine keys can be large; the storage key carries a hash of it
    fn storage_key(&self) -> String {
        let key_hash = blake3::hash(self.public_key.as_bytes()).to_hex();
        namespaced_key(&[
            "decryptionSignature",
            self.signer.to_hex().as_str(),
            &key_hash.as_str()[..32],
            self.ciphertext.to_hex().as_str(),
        ])
    }
}

pub struct DecryptionAuthorization {
    store: Arc<dyn KeyValueStore>,
    domain: TypedDataDomain,
    // held across the wallet prompt: concurrent requests share one signature
    session: Mutex<HashMap<GrantKey, Arc<DecryptionGrant>>>,
}

impl DecryptionAuthorization {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            domain: TypedDataDomain::fhevm(),
            session: Mutex::new(HashMap::new()),
        }
    }

    pub fn domain(&self) -> &TypedDataDomain {
        &self.domain
    }

    /// Return a valid grant for `(public_key, ciphertext)` signed by `signer`.
    pub async fn get_or_create_grant(
        &self,
        signer: &dyn WalletSigner,
        public_key: &EnginePublicKey,
        ciphertext: &Handle,
    ) -> Result<Arc<DecryptionGrant>> {
        let key = GrantKey {
            signer: signer.address(),
            public_key: public_key.clone(),
            ciphertext: *ciphertext,
        };
        let mut session = self.session.lock().await;

        if let Some(grant) = session.get(&key) {
            if grant.is_valid() {
                return Ok(grant.clone());
            }
            debug!(ciphertext = %ciphertext.short(), "Cached grant expired");
            session.remove(&key);
        }

        if let Some(grant) = self.load_persisted(&key).await {
            let grant = Arc::new(grant);
            session.insert(key, grant.clone());
            return Ok(grant);
        }

        let grant = Arc::new(self.sign(signer, &key).await?);
        self.persist(&key, &grant).await;
        session.insert(key, grant.clone());
        Ok(grant)
    }

    async fn sign(&self, signer: &dyn WalletSigner, key: &GrantKey) -> Result<DecryptionGrant> {
        let message = ReencryptMessage {
            public_key: key.public_key.as_bytes().to_vec(),
            ciphertext: key.ciphertext.0.to_vec(),
        };
        info!(signer = %key.signer.short(), ciphertext = %key.ciphertext.short(), "Requesting decryption signature");

        // user-interactive; a rejection propagates and nothing is cached
        let signed = signer.sign_typed_data(&self.domain, &message).await?;

        Ok(DecryptionGrant {
            signature: signed.signature,
            signer: key.signer,
            signer_key: signed.signer_key,
            public_key: key.public_key.clone(),
            ciphertext: key.ciphertext,
            issued_at: Utc::now(),
        })
    }

    async fn load_persisted(&self, key: &GrantKey) -> Option<DecryptionGrant> {
        let storage_key = key.storage_key();
        let raw = match self.store.get(&storage_key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted grant");
                return None;
            }
        };

        let grant: DecryptionGrant = match serde_json::from_str(&raw) {
            Ok(grant) => grant,
            Err(e) => {
                warn!(key = %storage_key, error = %e, "Dropping corrupt persisted grant");
                self.evict(&storage_key).await;
                return None;
            }
        };

        let usable = grant.is_valid()
            && grant.signer == key.signer
            && grant.covers(&key.public_key, &key.ciphertext)
            && grant.verify(&self.domain).is_ok();
        if !usable {
            debug!(key = %storage_key, "Dropping expired or invalid persisted grant");
            self.evict(&storage_key).await;
            return None;
        }
        Some(grant)
    }

    async fn evict(&self, storage_key: &str) {
        if let Err(e) = self.store.remove(storage_key).await {
            warn!(key = %storage_key, error = %e, "Failed to remove persisted grant");
        }
    }

    async fn persist(&self, key: &GrantKey, grant: &DecryptionGrant) {
        let value = match serde_json::to_string(grant) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to encode grant");
                return;
            }
        };
        if let Err(e) = self.store.set(&key.storage_key(), &value).await {
            warn!(error = %e, "Failed to persist grant; continuing with session copy");
        }
    }
}
