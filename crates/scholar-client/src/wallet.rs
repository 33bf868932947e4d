//! Wallet signing seam.
//!
//! Signing is user-interactive in a real wallet: the call may wait
//! indefinitely and may be declined.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use scholar_shared::{Address, ReencryptMessage, TypedDataDomain, WalletKey};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Signature request rejected by the user")]
    Rejected,

    #[error("Wallet unavailable: {0}")]
    Unavailable(String),
}

/// A typed-data signature and the key that produced it.
#[derive(Debug, Clone)]
pub struct TypedSignature {
    pub signature: Vec<u8>,
    pub signer_key: [u8; 32],
}

#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_typed_data(
        &self,
        domain: &TypedDataDomain,
        message: &ReencryptMessage,
    ) -> Result<TypedSignature, WalletError>;
}

/// Signs with a key held in process. Never prompts.
#[derive(Debug, Clone)]
pub struct LocalWallet {
    key: WalletKey,
}

impl LocalWallet {
    pub fn new(key: WalletKey) -> Self {
        Self { key }
    }

    pub fn generate() -> Self {
        Self::new(WalletKey::generate())
    }

    pub fn key(&self) -> &WalletKey {
        &self.key
    }
}

#[async_trait]
impl WalletSigner for LocalWallet {
    fn address(&self) -> Address {
        self.key.address()
    }

    async fn sign_typed_data(
        &self,
        domain: &TypedDataDomain,
        message: &ReencryptMessage,
    ) -> Result<TypedSignature, WalletError> {
        let digest = message.signing_digest(domain);
        debug!(signer = %self.key.address().short(), "Signing typed data");
        Ok(TypedSignature {
            signature: self.key.sign(&digest).to_bytes().to_vec(),
            signer_key: self.key.public_key_bytes(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_shared::identity::verify_signature;

    #[tokio::test]
    async fn test_local_wallet_signature_verifies() {
        let wallet = LocalWallet::generate();
        let domain = TypedDataDomain::fhevm();
        let message = ReencryptMessage {
            public_key: vec![1; 32],
            ciphertext: vec![2; 32],
        };

        let signed = wallet.sign_typed_data(&domain, &message).await.unwrap();
        assert_eq!(signed.signer_key, wallet.key().public_key_bytes());
        assert!(verify_signature(&signed.signer_key, &message.signing_digest(&domain), &signed.signature).is_ok());
    }
}
