//! Structured typed-data hashing for decryption grants.
//!
//! Follows the EIP-712 encoding: `keccak256(0x1901 || domainSeparator ||
//! hashStruct(message))`. The grant message has one shape,
//! `Reencrypt(bytes publicKey,bytes ciphertext)`, so a signature is bound to
//! both the engine key and the exact ciphertext it was requested for.

use serde::{Deserialize, Serialize};

use crate::constants::{TYPED_DATA_DOMAIN_NAME, TYPED_DATA_DOMAIN_VERSION};
use crate::digest::keccak256;

pub const DOMAIN_TYPE: &str = "EIP712Domain(string name,string version)";
pub const REENCRYPT_TYPE: &str = "Reencrypt(bytes publicKey,bytes ciphertext)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDataDomain {
    pub name: String,
    pub version: String,
}

impl TypedDataDomain {
    pub fn fhevm() -> Self {
        Self {
            name: TYPED_DATA_DOMAIN_NAME.to_string(),
            version: TYPED_DATA_DOMAIN_VERSION.to_string(),
        }
    }

    pub fn separator(&self) -> [u8; 32] {
        let mut encoded = Vec::with_capacity(96);
        encoded.extend_from_slice(&keccak256(DOMAIN_TYPE.as_bytes()));
        encoded.extend_from_slice(&keccak256(self.name.as_bytes()));
        encoded.extend_from_slice(&keccak256(self.version.as_bytes()));
        keccak256(&encoded)
    }
}

impl Default for TypedDataDomain {
    fn default() -> Self {
        Self::fhevm()
    }
}

/// The message a wallet signs to authorize plaintext recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReencryptMessage {
    pub public_key: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl ReencryptMessage {
    pub fn struct_hash(&self) -> [u8; 32] {
        let mut encoded = Vec::with_capacity(96);
        encoded.extend_from_slice(&keccak256(REENCRYPT_TYPE.as_bytes()));
        // dynamic `bytes` members are encoded as their hash
        encoded.extend_from_slice(&keccak256(&self.public_key));
        encoded.extend_from_slice(&keccak256(&self.ciphertext));
        keccak256(&encoded)
    }

    pub fn signing_digest(&self, domain: &TypedDataDomain) -> [u8; 32] {
        let mut encoded = Vec::with_capacity(66);
        encoded.extend_from_slice(&[0x19, 0x01]);
        encoded.extend_from_slice(&domain.separator());
        encoded.extend_from_slice(&self.struct_hash());
        keccak256(&encoded)
    }
}
