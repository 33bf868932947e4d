use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::GRANT_VALIDITY_HOURS;
use crate::error::SignatureError;
use crate::identity::{address_of, verify_signature};
use crate::typed_data::{ReencryptMessage, TypedDataDomain};
use crate::types::{Address, EnginePublicKey, Handle};

// Signed by the user's wallet, presented to the engine to reveal one ciphertext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptionGrant {
    pub signature: Vec<u8>,
    pub signer: Address,
    pub signer_key: [u8; 32],
    pub public_key: EnginePublicKey,
    pub ciphertext: Handle,
    pub issued_at: DateTime<Utc>,
}

impl DecryptionGrant {
    pub fn validity_window() -> Duration {
        Duration::hours(GRANT_VALIDITY_HOURS)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + Self::validity_window()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.issued_at) < Self::validity_window()
    }

    /// Whether this grant was issued for exactly this key and ciphertext.
    pub fn covers(&self, public_key: &EnginePublicKey, ciphertext: &Handle) -> bool {
        &self.public_key == public_key && &self.ciphertext == ciphertext
    }

    pub fn message(&self) -> ReencryptMessage {
        ReencryptMessage {
            public_key: self.public_key.as_bytes().to_vec(),
            ciphertext: self.ciphertext.0.to_vec(),
        }
    }

    /// Check the signature over the typed-data digest and that the signing key
    /// belongs to `signer`.
    pub fn verify(&self, domain: &TypedDataDomain) -> Result<(), SignatureError> {
        if address_of(&self.signer_key) != self.signer {
            return Err(SignatureError::SignerMismatch(self.signer.to_hex()));
        }
        let digest = self.message().signing_digest(domain);
        verify_signature(&self.signer_key, &digest, &self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::WalletKey;

    fn issue(key: &WalletKey, ciphertext: Handle, issued_at: DateTime<Utc>) -> DecryptionGrant {
        let public_key = EnginePublicKey(vec![0xAB; 32]);
        let message = ReencryptMessage {
            public_key: public_key.0.clone(),
            ciphertext: ciphertext.0.to_vec(),
        };
        let digest = message.signing_digest(&TypedDataDomain::fhevm());
        DecryptionGrant {
            signature: key.sign(&digest).to_bytes().to_vec(),
            signer: key.address(),
            signer_key: key.public_key_bytes(),
            public_key,
            ciphertext,
            issued_at,
        }
    }

    #[test]
    fn test_validity_boundary() {
        let issued = Utc::now();
        let grant = issue(&WalletKey::generate(), Handle([1; 32]), issued);

        assert!(grant.is_valid_at(issued + Duration::hours(23) + Duration::minutes(59)));
        assert!(!grant.is_valid_at(issued + Duration::hours(24)));
        assert!(!grant.is_valid_at(issued + Duration::hours(24) + Duration::minutes(1)));
    }

    #[test]
    fn test_fresh_grant_valid() {
        let grant = issue(&WalletKey::generate(), Handle([1; 32]), Utc::now());
        assert!(grant.is_valid());
        assert!(grant.verify(&TypedDataDomain::fhevm()).is_ok());
    }

    #[test]
    fn test_grant_not_transferable_to_other_ciphertext() {
        let mut grant = issue(&WalletKey::generate(), Handle([1; 32]), Utc::now());
        grant.ciphertext = Handle([2; 32]);
        assert_eq!(
            grant.verify(&TypedDataDomain::fhevm()),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_grant_signer_must_own_key() {
        let mut grant = issue(&WalletKey::generate(), Handle([1; 32]), Utc::now());
        grant.signer = WalletKey::generate().address();
        assert!(matches!(
            grant.verify(&TypedDataDomain::fhevm()),
            Err(SignatureError::SignerMismatch(_))
        ));
    }

    #[test]
    fn test_covers() {
        let grant = issue(&WalletKey::generate(), Handle([1; 32]), Utc::now());
        assert!(grant.covers(&EnginePublicKey(vec![0xAB; 32]), &Handle([1; 32])));
        assert!(!grant.covers(&EnginePublicKey(vec![0xAB; 32]), &Handle([3; 32])));
        assert!(!grant.covers(&EnginePublicKey(vec![0xCD; 32]), &Handle([1; 32])));
    }

    #[test]
    fn test_serde_roundtrip_keeps_timestamp() {
        let grant = issue(&WalletKey::generate(), Handle([9; 32]), Utc::now());
        let json = serde_json::to_string(&grant).unwrap();
        let back: DecryptionGrant = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grant);
    }
}
