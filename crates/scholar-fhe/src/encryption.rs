//! Turning plaintext into a submittable ciphertext payload.

use std::sync::Arc;

use tracing::debug;

use scholar_shared::digest::content_digest;
use scholar_shared::{Address, ClearValue, EncryptedType, Handle};

use crate::error::{FheError, Result};
use crate::provider::CryptoEngineProvider;

/// A plaintext before it is fitted to an encrypted slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlainValue {
    /// Free-form text; encrypted as its content digest.
    Text(String),
    Unsigned(u128),
    Bool(bool),
    Address(Address),
}

impl PlainValue {
    /// Fit the value to `ty`. Text becomes `keccak256(text) mod 2^W`;
    /// integers must already fit in `W` bits.
    pub fn coerce(&self, ty: EncryptedType) -> Result<ClearValue> {
        let mismatch = || {
            FheError::EncryptionFailed(format!("cannot encrypt {} as {}", self.kind(), ty.name()))
        };

        match (self, ty) {
            (Self::Text(text), EncryptedType::Uint32) => {
                // digest < 2^32 by construction
                Ok(ClearValue::Uint32(content_digest(text, 32) as u32))
            }
            (Self::Text(text), EncryptedType::Uint128) => Ok(ClearValue::Uint128(content_digest(text, 128))),
            (Self::Unsigned(v), EncryptedType::Uint32) => u32::try_from(*v)
                .map(ClearValue::Uint32)
                .map_err(|_| FheError::EncryptionFailed(format!("{v} exceeds euint32 range"))),
            (Self::Unsigned(v), EncryptedType::Uint128) => Ok(ClearValue::Uint128(*v)),
            (Self::Unsigned(v), EncryptedType::Bool) => match v {
                0 => Ok(ClearValue::Bool(false)),
                1 => Ok(ClearValue::Bool(true)),
                _ => Err(FheError::EncryptionFailed(format!("{v} exceeds ebool range"))),
            },
            (Self::Bool(b), EncryptedType::Bool) => Ok(ClearValue::Bool(*b)),
            (Self::Address(a), EncryptedType::Address) => Ok(ClearValue::Address(*a)),
            _ => Err(mismatch()),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Unsigned(_) => "integer",
            Self::Bool(_) => "bool",
            Self::Address(_) => "address",
        }
    }
}

/// A ciphertext handle plus the proof that makes it acceptable to one
/// contract from one sender.
///
/// Deliberately not `Clone`: a payload is produced for a single submission.
#[derive(Debug)]
pub struct CiphertextPayload {
    handle: Handle,
    proof: Vec<u8>,
    value_type: EncryptedType,
    contract: Address,
    submitter: Address,
}

impl CiphertextPayload {
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn proof(&self) -> &[u8] {
        &self.proof
    }

    pub fn proof_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.proof))
    }

    pub fn value_type(&self) -> EncryptedType {
        self.value_type
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn submitter(&self) -> Address {
        self.submitter
    }

    pub fn into_parts(self) -> (Handle, Vec<u8>) {
        (self.handle, self.proof)
    }
}

pub struct EncryptionContext {
    provider: Arc<CryptoEngineProvider>,
}

impl EncryptionContext {
    pub fn new(provider: Arc<CryptoEngineProvider>) -> Self {
        Self { provider }
    }

    /// Encrypt one value for submission to `contract` by `submitter`.
    pub async fn encrypt(
        &self,
        contract: Address,
        submitter: Address,
        value: PlainValue,
        ty: EncryptedType,
    ) -> Result<CiphertextPayload> {
        let config = self.provider.ready()?;
        let clear = value.coerce(ty)?;

        let mut input = config.engine.create_encrypted_input(contract, submitter);
        input.push(clear);

        // proof generation is heavy; let pending UI/status work run first
        tokio::task::yield_now().await;

        let encrypted = config.engine.encrypt(&input).await.map_err(|e| match e {
            FheError::EncryptionFailed(_) => e,
            other => FheError::EncryptionFailed(other.to_string()),
        })?;

        if encrypted.handles.len() != 1 {
            return Err(FheError::EncryptionFailed(format!(
                "engine returned {} handles for one value",
                encrypted.handles.len()
            )));
        }
        let handle = encrypted.handles[0]
            .normalize()
            .map_err(|e| FheError::EncryptionFailed(format!("bad handle: {e}")))?;
        if handle.encrypted_type().ok() != Some(ty) {
            return Err(FheError::EncryptionFailed(format!(
                "engine returned a handle of the wrong type for {}",
                ty.name()
            )));
        }

        debug!(handle = %handle.short(), ty = %ty, contract = %contract.short(), "Encrypted value");
        Ok(CiphertextPayload {
            handle,
            proof: encrypted.input_proof,
            value_type: ty,
            contract,
            submitter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RevealRequest;
    use crate::loader::{EngineLoader, SimulationLoader};
    use crate::simulation::LocalDevnet;
    use async_trait::async_trait;
    use chrono::Utc;
    use scholar_shared::{ChainId, DecryptionGrant, EnginePublicKey, ReencryptMessage, TypedDataDomain, WalletKey};
    use scholar_store::{MemoryStore, PublicKeyStorage};

    struct NoRemote;

    #[async_trait]
    impl EngineLoader for NoRemote {
        async fn load(
            &self,
            _chain_id: ChainId,
            _cached_key: Option<EnginePublicKey>,
        ) -> Result<Arc<dyn crate::engine::FheEngine>> {
            Err(FheError::EngineUnavailable("no relayer in tests".into()))
        }
    }

    async fn ready_context() -> (EncryptionContext, Arc<CryptoEngineProvider>, Arc<LocalDevnet>) {
        let devnet = Arc::new(LocalDevnet::hardhat().unwrap());
        let provider = Arc::new(CryptoEngineProvider::new(
            PublicKeyStorage::new(Arc::new(MemoryStore::new())),
            Arc::new(SimulationLoader::new(devnet.clone())),
            Arc::new(NoRemote),
        ));
        provider.initialize(ChainId(31337)).await.unwrap();
        (EncryptionContext::new(provider.clone()), provider, devnet)
    }

    #[test]
    fn test_text_coerces_to_digest() {
        let value = PlainValue::Text("hello".into()).coerce(EncryptedType::Uint128).unwrap();
        assert_eq!(value, ClearValue::Uint128(content_digest("hello", 128)));

        let narrow = PlainValue::Text("hello".into()).coerce(EncryptedType::Uint32).unwrap();
        assert_eq!(narrow.as_u128(), Some(content_digest("hello", 32)));
    }

    #[test]
    fn test_integer_range_checked() {
        assert_eq!(
            PlainValue::Unsigned(1).coerce(EncryptedType::Uint32).unwrap(),
            ClearValue::Uint32(1)
        );
        assert!(PlainValue::Unsigned(u128::from(u32::MAX) + 1)
            .coerce(EncryptedType::Uint32)
            .is_err());
        assert!(PlainValue::Unsigned(2).coerce(EncryptedType::Bool).is_err());
        assert!(PlainValue::Bool(true).coerce(EncryptedType::Uint128).is_err());
    }

    #[tokio::test]
    async fn test_encrypt_requires_ready_engine() {
        let provider = Arc::new(CryptoEngineProvider::new(
            PublicKeyStorage::new(Arc::new(MemoryStore::new())),
            Arc::new(NoRemote),
            Arc::new(NoRemote),
        ));
        let context = EncryptionContext::new(provider);
        let err = context
            .encrypt(Address([1; 20]), Address([2; 20]), PlainValue::Unsigned(1), EncryptedType::Uint32)
            .await
            .unwrap_err();
        assert_eq!(err, FheError::NotReady);
    }

    #[tokio::test]
    async fn test_payload_bound_to_contract_and_submitter() {
        let (context, _, devnet) = ready_context().await;
        let contract = Address([1; 20]);
        let user = Address([2; 20]);

        let payload = context
            .encrypt(contract, user, PlainValue::Text("hello".into()), EncryptedType::Uint128)
            .await
            .unwrap();
        assert_eq!(payload.value_type(), EncryptedType::Uint128);
        assert_eq!(payload.handle().chain_id(), ChainId(31337));
        assert!(payload.proof_hex().starts_with("0x"));

        assert!(devnet.verify_input(payload.handle(), payload.proof(), contract, user).is_ok());
        assert!(devnet
            .verify_input(payload.handle(), payload.proof(), Address([3; 20]), user)
            .is_err());
        assert!(devnet
            .verify_input(payload.handle(), payload.proof(), contract, Address([3; 20]))
            .is_err());
    }

    #[tokio::test]
    async fn test_encrypt_then_reveal_recovers_digest() {
        let (context, provider, devnet) = ready_context().await;
        let wallet = WalletKey::generate();
        let contract = Address([1; 20]);

        let payload = context
            .encrypt(contract, wallet.address(), PlainValue::Text("hello".into()), EncryptedType::Uint128)
            .await
            .unwrap();
        devnet.allow(payload.handle(), contract);
        devnet.allow(payload.handle(), wallet.address());

        let config = provider.ready().unwrap();
        let message = ReencryptMessage {
            public_key: config.public_key.as_bytes().to_vec(),
            ciphertext: payload.handle().0.to_vec(),
        };
        let grant = DecryptionGrant {
            signature: wallet
                .sign(&message.signing_digest(&TypedDataDomain::fhevm()))
                .to_bytes()
                .to_vec(),
            signer: wallet.address(),
            signer_key: wallet.public_key_bytes(),
            public_key: config.public_key.clone(),
            ciphertext: *payload.handle(),
            issued_at: Utc::now(),
        };

        let value = config
            .engine
            .reveal(RevealRequest {
                handle: payload.handle(),
                contract,
                user: wallet.address(),
                grant: &grant,
            })
            .await
            .unwrap();
        assert_eq!(value.as_u128(), Some(content_digest("hello", 128)));
    }
}
