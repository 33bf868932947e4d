//! Simulation engine for the local development chain.
//!
//! Performs the same encrypt/reveal protocol as the relayer engine but against
//! an in-process [`LocalDevnet`], so the whole stack can be exercised without
//! network access.

mod devnet;

pub use devnet::LocalDevnet;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use scholar_shared::constants::{
    DEFAULT_RPC_URL, LOCAL_ACL_ADDRESS, LOCAL_CHAIN_ID, LOCAL_DECRYPTION_VERIFYING_CONTRACT,
    LOCAL_GATEWAY_CHAIN_ID, LOCAL_INPUT_VERIFIER_ADDRESS, LOCAL_INPUT_VERIFYING_CONTRACT,
    LOCAL_KMS_VERIFIER_ADDRESS,
};
use scholar_shared::{
    Address, ChainId, ClearValue, EncodingError, EnginePublicKey, TypedDataDomain,
};

use crate::engine::{EncryptedInput, EngineKind, FheEngine, InputBuilder, RawHandle, RevealRequest};
use crate::error::{FheError, Result};

/// Deployment metadata the simulation needs to stand in for the real
/// coprocessor: where the node lives and which system contracts it uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationMetadata {
    pub chain_id: ChainId,
    pub rpc_url: String,
    pub acl: Address,
    pub input_verifier: Address,
    pub kms_verifier: Address,
    pub gateway_chain_id: ChainId,
    pub decryption_verifying_contract: Address,
    pub input_verifying_contract: Address,
}

impl SimulationMetadata {
    pub fn hardhat() -> std::result::Result<Self, EncodingError> {
        Ok(Self {
            chain_id: ChainId(LOCAL_CHAIN_ID),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            acl: LOCAL_ACL_ADDRESS.parse()?,
            input_verifier: LOCAL_INPUT_VERIFIER_ADDRESS.parse()?,
            kms_verifier: LOCAL_KMS_VERIFIER_ADDRESS.parse()?,
            gateway_chain_id: ChainId(LOCAL_GATEWAY_CHAIN_ID),
            decryption_verifying_contract: LOCAL_DECRYPTION_VERIFYING_CONTRACT.parse()?,
            input_verifying_contract: LOCAL_INPUT_VERIFYING_CONTRACT.parse()?,
        })
    }

    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }
}

pub struct SimulationEngine {
    devnet: Arc<LocalDevnet>,
    domain: TypedDataDomain,
}

impl SimulationEngine {
    pub fn new(devnet: Arc<LocalDevnet>) -> Self {
        Self {
            devnet,
            domain: TypedDataDomain::fhevm(),
        }
    }

    pub fn devnet(&self) -> &Arc<LocalDevnet> {
        &self.devnet
    }
}

#[async_trait]
impl FheEngine for SimulationEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Simulation
    }

    fn chain_id(&self) -> ChainId {
        self.devnet.chain_id()
    }

    fn public_key(&self) -> &EnginePublicKey {
        self.devnet.public_key()
    }

    async fn encrypt(&self, input: &InputBuilder) -> Result<EncryptedInput> {
        let (handles, input_proof) = self.devnet.encrypt_input(input)?;
        Ok(EncryptedInput {
            handles: handles.into_iter().map(|h| RawHandle::Bytes(h.0.to_vec())).collect(),
            input_proof,
        })
    }

    async fn reveal(&self, request: RevealRequest<'_>) -> Result<ClearValue> {
        let grant = request.grant;

        if !grant.is_valid() {
            return Err(FheError::DecryptionFailed("grant expired".into()));
        }
        if !grant.covers(self.public_key(), request.handle) {
            return Err(FheError::DecryptionFailed(
                "grant was issued for a different key or ciphertext".into(),
            ));
        }
        if grant.signer != request.user {
            return Err(FheError::DecryptionFailed(format!(
                "grant signed by {}, not {}",
                grant.signer.short(),
                request.user.short()
            )));
        }
        grant
            .verify(&self.domain)
            .map_err(|e| FheError::DecryptionFailed(format!("grant rejected: {e}")))?;

        let value = self
            .devnet
            .decrypt_for(request.handle, request.contract, request.user)?;
        debug!(handle = %request.handle.short(), ty = %value.encrypted_type(), "Revealed ciphertext");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use scholar_shared::{DecryptionGrant, Handle, ReencryptMessage, WalletKey};

    fn grant_for(key: &WalletKey, public_key: &EnginePublicKey, handle: Handle) -> DecryptionGrant {
        let message = ReencryptMessage {
            public_key: public_key.as_bytes().to_vec(),
            ciphertext: handle.0.to_vec(),
        };
        let digest = message.signing_digest(&TypedDataDomain::fhevm());
        DecryptionGrant {
            signature: key.sign(&digest).to_bytes().to_vec(),
            signer: key.address(),
            signer_key: key.public_key_bytes(),
            public_key: public_key.clone(),
            ciphertext: handle,
            issued_at: Utc::now(),
        }
    }

    async fn encrypt_allowed(engine: &SimulationEngine, contract: Address, user: Address, value: u128) -> Handle {
        let mut input = engine.create_encrypted_input(contract, user);
        input.add128(value);
        let encrypted = engine.encrypt(&input).await.unwrap();
        let handle = encrypted.handles[0].normalize().unwrap();
        engine.devnet().allow(&handle, contract);
        engine.devnet().allow(&handle, user);
        handle
    }

    #[test]
    fn test_hardhat_metadata_parses() {
        let metadata = SimulationMetadata::hardhat().unwrap();
        assert_eq!(metadata.chain_id, ChainId(31337));
        assert_eq!(metadata.gateway_chain_id, ChainId(55815));
        assert_eq!(
            metadata.acl.to_hex(),
            "0x50157cffd6bbfa2dece204a89ec419c23ef5755d"
        );
    }

    #[tokio::test]
    async fn test_encrypt_reveal_roundtrip() {
        let engine = SimulationEngine::new(Arc::new(LocalDevnet::hardhat().unwrap()));
        let wallet = WalletKey::generate();
        let contract = Address([7; 20]);
        let handle = encrypt_allowed(&engine, contract, wallet.address(), 123_456).await;

        let grant = grant_for(&wallet, engine.public_key(), handle);
        let value = engine
            .reveal(RevealRequest {
                handle: &handle,
                contract,
                user: wallet.address(),
                grant: &grant,
            })
            .await
            .unwrap();
        assert_eq!(value, ClearValue::Uint128(123_456));
    }

    #[tokio::test]
    async fn test_reveal_rejects_expired_grant() {
        let engine = SimulationEngine::new(Arc::new(LocalDevnet::hardhat().unwrap()));
        let wallet = WalletKey::generate();
        let contract = Address([7; 20]);
        let handle = encrypt_allowed(&engine, contract, wallet.address(), 1).await;

        let mut grant = grant_for(&wallet, engine.public_key(), handle);
        grant.issued_at = Utc::now() - Duration::hours(25);
        let result = engine
            .reveal(RevealRequest {
                handle: &handle,
                contract,
                user: wallet.address(),
                grant: &grant,
            })
            .await;
        assert!(matches!(result, Err(FheError::DecryptionFailed(_))));
    }

    #[tokio::test]
    async fn test_reveal_rejects_grant_for_other_ciphertext() {
        let engine = SimulationEngine::new(Arc::new(LocalDevnet::hardhat().unwrap()));
        let wallet = WalletKey::generate();
        let contract = Address([7; 20]);
        let first = encrypt_allowed(&engine, contract, wallet.address(), 1).await;
        let second = encrypt_allowed(&engine, contract, wallet.address(), 2).await;

        let grant = grant_for(&wallet, engine.public_key(), first);
        let result = engine
            .reveal(RevealRequest {
                handle: &second,
                contract,
                user: wallet.address(),
                grant: &grant,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_reveal_rejects_grant_from_other_wallet() {
        let engine = SimulationEngine::new(Arc::new(LocalDevnet::hardhat().unwrap()));
        let owner = WalletKey::generate();
        let stranger = WalletKey::generate();
        let contract = Address([7; 20]);
        let handle = encrypt_allowed(&engine, contract, owner.address(), 1).await;

        let grant = grant_for(&stranger, engine.public_key(), handle);
        let result = engine
            .reveal(RevealRequest {
                handle: &handle,
                contract,
                user: owner.address(),
                grant: &grant,
            })
            .await;
        assert!(result.is_err());
    }
}
