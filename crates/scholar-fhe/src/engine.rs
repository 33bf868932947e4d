//! The engine capability contract.
//!
//! Both the simulation engine and the relayer-backed engine implement
//! [`FheEngine`]; callers receive an `Arc<dyn FheEngine>` from a loader and
//! never probe for alternative method names.

use async_trait::async_trait;
use serde::Serialize;

use scholar_shared::{Address, ChainId, ClearValue, DecryptionGrant, EncodingError, EnginePublicKey, Handle};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Simulation,
    Relayer,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulation => f.write_str("simulation"),
            Self::Relayer => f.write_str("relayer"),
        }
    }
}

/// Typed values queued for encryption under one (contract, user) context.
#[derive(Debug, Clone)]
pub struct InputBuilder {
    contract: Address,
    user: Address,
    values: Vec<ClearValue>,
}

impl InputBuilder {
    pub fn new(contract: Address, user: Address) -> Self {
        Self {
            contract,
            user,
            values: Vec::new(),
        }
    }

    pub fn add_bool(&mut self, value: bool) -> &mut Self {
        self.push(ClearValue::Bool(value))
    }

    pub fn add32(&mut self, value: u32) -> &mut Self {
        self.push(ClearValue::Uint32(value))
    }

    pub fn add128(&mut self, value: u128) -> &mut Self {
        self.push(ClearValue::Uint128(value))
    }

    pub fn add_address(&mut self, value: Address) -> &mut Self {
        self.push(ClearValue::Address(value))
    }

    pub fn push(&mut self, value: ClearValue) -> &mut Self {
        self.values.push(value);
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn user(&self) -> Address {
        self.user
    }

    pub fn values(&self) -> &[ClearValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A handle as returned by an engine: hex text from a remote service, raw
/// bytes from the local one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawHandle {
    Text(String),
    Bytes(Vec<u8>),
}

impl RawHandle {
    pub fn normalize(&self) -> std::result::Result<Handle, EncodingError> {
        match self {
            Self::Text(s) => Handle::from_hex(s),
            Self::Bytes(b) => Handle::from_slice(b),
        }
    }
}

/// Output of the proof-generating encrypt step: one handle per queued value
/// and a single proof covering all of them.
#[derive(Debug, Clone)]
pub struct EncryptedInput {
    pub handles: Vec<RawHandle>,
    pub input_proof: Vec<u8>,
}

/// Everything an engine needs to reveal one ciphertext to one user.
#[derive(Debug, Clone, Copy)]
pub struct RevealRequest<'a> {
    pub handle: &'a Handle,
    pub contract: Address,
    pub user: Address,
    pub grant: &'a DecryptionGrant,
}

#[async_trait]
pub trait FheEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    fn chain_id(&self) -> ChainId;

    fn public_key(&self) -> &EnginePublicKey;

    /// Open an input builder scoped to `(contract, user)`.
    fn create_encrypted_input(&self, contract: Address, user: Address) -> InputBuilder {
        InputBuilder::new(contract, user)
    }

    /// Encrypt every queued value and produce the validity proof. CPU-heavy.
    async fn encrypt(&self, input: &InputBuilder) -> Result<EncryptedInput>;

    /// Recover the clear value behind `request.handle` if the grant allows it.
    async fn reveal(&self, request: RevealRequest<'_>) -> Result<ClearValue>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accumulates_typed_values() {
        let mut builder = InputBuilder::new(Address([1; 20]), Address([2; 20]));
        builder.add128(7).add32(1).add_bool(true).add_address(Address([3; 20]));

        assert_eq!(builder.len(), 4);
        assert_eq!(builder.values()[0], ClearValue::Uint128(7));
        assert_eq!(builder.values()[3], ClearValue::Address(Address([3; 20])));
        assert_eq!(builder.contract(), Address([1; 20]));
        assert_eq!(builder.user(), Address([2; 20]));
    }

    #[test]
    fn test_raw_handle_normalizes_to_same_handle() {
        let bytes = [0x5Au8; 32];
        let from_bytes = RawHandle::Bytes(bytes.to_vec()).normalize().unwrap();
        let from_text = RawHandle::Text(format!("0x{}", "5A".repeat(32))).normalize().unwrap();
        assert_eq!(from_bytes, from_text);
        assert_eq!(from_text.to_hex(), format!("0x{}", "5a".repeat(32)));
    }

    #[test]
    fn test_raw_handle_rejects_wrong_width() {
        assert!(RawHandle::Bytes(vec![0; 31]).normalize().is_err());
        assert!(RawHandle::Text("0x1234".into()).normalize().is_err());
    }
}
