//! In-process development chain.
//!
//! Plays the roles the coprocessor, ACL contract, input verifier and KMS play
//! on a real FHE-enabled network: it stores sealed ciphertexts under handles,
//! signs input proofs, verifies them for a given contract and sender, and
//! tracks which accounts may see each handle.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use scholar_shared::constants::{
    KDF_CONTEXT_HANDLE_KEY, KDF_CONTEXT_INPUT_VERIFIER, KDF_CONTEXT_PUBLIC_KEY,
    KDF_CONTEXT_SEAL_KEY,
};
use scholar_shared::crypto::{self, SymmetricKey};
use scholar_shared::{Address, ChainId, ClearValue, EncryptedType, EnginePublicKey, Handle};

use super::SimulationMetadata;
use crate::engine::InputBuilder;
use crate::error::{FheError, Result};

struct StoredCiphertext {
    ty: EncryptedType,
    sealed: Vec<u8>,
}

#[derive(Default)]
struct AclEntry {
    public: bool,
    allowed: HashSet<Address>,
}

/// Wire form of an input proof.
#[derive(Debug, Serialize, Deserialize)]
struct InputProof {
    chain_id: ChainId,
    contract: Address,
    user: Address,
    handles: Vec<Handle>,
    signature: Vec<u8>,
}

fn proof_digest(chain_id: ChainId, contract: &Address, user: &Address, handles: &[Handle]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"input-proof");
    hasher.update(&chain_id.0.to_be_bytes());
    hasher.update(&contract.0);
    hasher.update(&user.0);
    for handle in handles {
        hasher.update(&handle.0);
    }
    *hasher.finalize().as_bytes()
}

pub struct LocalDevnet {
    metadata: SimulationMetadata,
    seal_key: SymmetricKey,
    handle_key: SymmetricKey,
    verifier: SigningKey,
    public_key: EnginePublicKey,
    input_counter: AtomicU64,
    ciphertexts: RwLock<HashMap<Handle, StoredCiphertext>>,
    acl: RwLock<HashMap<Handle, AclEntry>>,
}

impl LocalDevnet {
    /// Keys are derived from the deployment metadata, so two devnets built from
    /// the same metadata agree on the public key and proof signer.
    pub fn new(metadata: SimulationMetadata) -> Self {
        let chain = metadata.chain_id.0.to_be_bytes();
        let seal_key = crypto::derive_key(KDF_CONTEXT_SEAL_KEY, &[&chain, &metadata.kms_verifier.0]);
        let handle_key = crypto::derive_key(KDF_CONTEXT_HANDLE_KEY, &[&chain, &metadata.acl.0]);
        let verifier_seed =
            crypto::derive_key(KDF_CONTEXT_INPUT_VERIFIER, &[&chain, &metadata.input_verifier.0]);
        let public_key = crypto::derive_key(
            KDF_CONTEXT_PUBLIC_KEY,
            &[&chain, &metadata.kms_verifier.0, &metadata.decryption_verifying_contract.0],
        );

        Self {
            metadata,
            seal_key,
            handle_key,
            verifier: SigningKey::from_bytes(&verifier_seed),
            public_key: EnginePublicKey(public_key.to_vec()),
            input_counter: AtomicU64::new(0),
            ciphertexts: RwLock::new(HashMap::new()),
            acl: RwLock::new(HashMap::new()),
        }
    }

    /// A devnet configured like the local Hardhat node.
    pub fn hardhat() -> Result<Self> {
        let metadata = SimulationMetadata::hardhat()
            .map_err(|e| FheError::EngineUnavailable(format!("bad devnet metadata: {e}")))?;
        Ok(Self::new(metadata))
    }

    pub fn metadata(&self) -> &SimulationMetadata {
        &self.metadata
    }

    pub fn chain_id(&self) -> ChainId {
        self.metadata.chain_id
    }

    pub fn public_key(&self) -> &EnginePublicKey {
        &self.public_key
    }

    pub fn verifier_key(&self) -> VerifyingKey {
        self.verifier.verifying_key()
    }

    pub fn ciphertext_count(&self) -> usize {
        self.ciphertexts.read().map(|c| c.len()).unwrap_or(0)
    }

    // ── Input encryption ─────────────────────────────────────

    pub(crate) fn encrypt_input(&self, input: &InputBuilder) -> Result<(Vec<Handle>, Vec<u8>)> {
        if input.is_empty() {
            return Err(FheError::EncryptionFailed("input has no values".into()));
        }
        if input.len() > usize::from(u8::MAX) {
            return Err(FheError::EncryptionFailed(format!(
                "input has {} values, at most {} allowed",
                input.len(),
                u8::MAX
            )));
        }

        let chain_id = self.chain_id();
        let sequence = self.input_counter.fetch_add(1, Ordering::Relaxed);
        let mut sealed_values = Vec::with_capacity(input.len());
        let mut handles = Vec::with_capacity(input.len());

        for (index, value) in input.values().iter().enumerate() {
            let ty = value.encrypted_type();
            let sealed = crypto::seal(&self.seal_key, &value.to_bytes(), &[ty.code()])
                .map_err(|e| FheError::EncryptionFailed(e.to_string()))?;

            let mut hasher = blake3::Hasher::new_keyed(&self.handle_key);
            hasher.update(&sealed);
            hasher.update(&input.contract().0);
            hasher.update(&input.user().0);
            hasher.update(&sequence.to_be_bytes());
            let hash = hasher.finalize();

            // index fits: checked against u8::MAX above
            let handle = Handle::compose(hash.as_bytes(), index as u8, chain_id, ty);
            handles.push(handle);
            sealed_values.push(StoredCiphertext { ty, sealed });
        }

        let digest = proof_digest(chain_id, &input.contract(), &input.user(), &handles);
        let proof = InputProof {
            chain_id,
            contract: input.contract(),
            user: input.user(),
            handles: handles.clone(),
            signature: self.verifier.sign(&digest).to_bytes().to_vec(),
        };
        let proof_bytes =
            bincode::serialize(&proof).map_err(|e| FheError::EncryptionFailed(e.to_string()))?;

        let mut store = self
            .ciphertexts
            .write()
            .map_err(|_| FheError::EncryptionFailed("ciphertext store poisoned".into()))?;
        for (handle, stored) in handles.iter().zip(sealed_values) {
            store.insert(*handle, stored);
        }

        debug!(count = handles.len(), contract = %input.contract().short(), "Encrypted input");
        Ok((handles, proof_bytes))
    }

    // ── Input verification ───────────────────────────────────

    /// Accept `handle` only if `proof` was issued by this devnet for exactly
    /// `(contract, sender)` and lists the handle.
    pub fn verify_input(
        &self,
        handle: &Handle,
        proof: &[u8],
        contract: Address,
        sender: Address,
    ) -> Result<EncryptedType> {
        let proof: InputProof = bincode::deserialize(proof)
            .map_err(|e| FheError::InputRejected(format!("malformed proof: {e}")))?;

        if proof.chain_id != self.chain_id() {
            return Err(FheError::InputRejected(format!(
                "proof issued for chain {}",
                proof.chain_id
            )));
        }
        if proof.contract != contract {
            return Err(FheError::InputRejected(format!(
                "proof bound to contract {}",
                proof.contract
            )));
        }
        if proof.user != sender {
            return Err(FheError::InputRejected(format!(
                "proof bound to user {}",
                proof.user
            )));
        }
        if !proof.handles.contains(handle) {
            return Err(FheError::InputRejected(format!("handle {} not in proof", handle.short())));
        }

        let signature = Signature::from_slice(&proof.signature)
            .map_err(|_| FheError::InputRejected("malformed proof signature".into()))?;
        let digest = proof_digest(proof.chain_id, &proof.contract, &proof.user, &proof.handles);
        self.verifier
            .verifying_key()
            .verify(&digest, &signature)
            .map_err(|_| FheError::InputRejected("proof signature mismatch".into()))?;

        let known = self
            .ciphertexts
            .read()
            .map(|c| c.contains_key(handle))
            .unwrap_or(false);
        if !known {
            return Err(FheError::InputRejected(format!("unknown handle {}", handle.short())));
        }

        handle
            .encrypted_type()
            .map_err(|e| FheError::InputRejected(e.to_string()))
    }

    // ── ACL ──────────────────────────────────────────────────

    pub fn allow(&self, handle: &Handle, account: Address) {
        match self.acl.write() {
            Ok(mut acl) => {
                acl.entry(*handle).or_default().allowed.insert(account);
            }
            Err(_) => warn!(handle = %handle.short(), "ACL poisoned; permission not recorded"),
        }
    }

    pub fn allow_public(&self, handle: &Handle) {
        match self.acl.write() {
            Ok(mut acl) => acl.entry(*handle).or_default().public = true,
            Err(_) => warn!(handle = %handle.short(), "ACL poisoned; permission not recorded"),
        }
    }

    pub fn is_allowed(&self, handle: &Handle, account: Address) -> bool {
        self.acl
            .read()
            .map(|acl| {
                acl.get(handle)
                    .map(|entry| entry.public || entry.allowed.contains(&account))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    // ── Decryption ───────────────────────────────────────────

    /// Open the ciphertext for `user` once the ACL allows both the contract
    /// and the user to see it. Grant checks happen in the engine.
    pub(crate) fn decrypt_for(&self, handle: &Handle, contract: Address, user: Address) -> Result<ClearValue> {
        if !self.is_allowed(handle, contract) {
            return Err(FheError::DecryptionFailed(format!(
                "contract {} is not allowed on {}",
                contract.short(),
                handle.short()
            )));
        }
        if !self.is_allowed(handle, user) {
            return Err(FheError::DecryptionFailed(format!(
                "user {} is not allowed on {}",
                user.short(),
                handle.short()
            )));
        }

        let store = self
            .ciphertexts
            .read()
            .map_err(|_| FheError::DecryptionFailed("ciphertext store poisoned".into()))?;
        let stored = store
            .get(handle)
            .ok_or_else(|| FheError::DecryptionFailed(format!("unknown handle {}", handle.short())))?;

        let plaintext = crypto::open(&self.seal_key, &stored.sealed, &[stored.ty.code()])
            .map_err(|e| FheError::DecryptionFailed(e.to_string()))?;
        ClearValue::from_bytes(stored.ty, &plaintext)
            .map_err(|e| FheError::DecryptionFailed(e.to_string()))
    }
}

impl std::fmt::Debug for LocalDevnet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDevnet")
            .field("chain_id", &self.metadata.chain_id)
            .field("rpc_url", &self.metadata.rpc_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devnet() -> LocalDevnet {
        LocalDevnet::hardhat().unwrap()
    }

    fn input(contract: Address, user: Address, value: u128) -> InputBuilder {
        let mut builder = InputBuilder::new(contract, user);
        builder.add128(value);
        builder
    }

    #[test]
    fn test_handles_carry_chain_and_type() {
        let net = devnet();
        let mut builder = InputBuilder::new(Address([1; 20]), Address([2; 20]));
        builder.add128(5).add32(1);
        let (handles, _) = net.encrypt_input(&builder).unwrap();

        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].chain_id(), ChainId(31337));
        assert_eq!(handles[0].encrypted_type().unwrap(), EncryptedType::Uint128);
        assert_eq!(handles[1].index(), 1);
        assert_eq!(handles[1].encrypted_type().unwrap(), EncryptedType::Uint32);
    }

    #[test]
    fn test_same_value_yields_distinct_handles() {
        let net = devnet();
        let (a, _) = net.encrypt_input(&input(Address([1; 20]), Address([2; 20]), 9)).unwrap();
        let (b, _) = net.encrypt_input(&input(Address([1; 20]), Address([2; 20]), 9)).unwrap();
        assert_ne!(a[0], b[0]);
    }

    #[test]
    fn test_proof_bound_to_contract_and_sender() {
        let net = devnet();
        let contract = Address([1; 20]);
        let user = Address([2; 20]);
        let (handles, proof) = net.encrypt_input(&input(contract, user, 42)).unwrap();

        assert_eq!(
            net.verify_input(&handles[0], &proof, contract, user).unwrap(),
            EncryptedType::Uint128
        );
        assert!(matches!(
            net.verify_input(&handles[0], &proof, Address([9; 20]), user),
            Err(FheError::InputRejected(_))
        ));
        assert!(matches!(
            net.verify_input(&handles[0], &proof, contract, Address([9; 20])),
            Err(FheError::InputRejected(_))
        ));
    }

    #[test]
    fn test_proof_does_not_cover_foreign_handle() {
        let net = devnet();
        let contract = Address([1; 20]);
        let user = Address([2; 20]);
        let (_, proof) = net.encrypt_input(&input(contract, user, 1)).unwrap();
        let (other, _) = net.encrypt_input(&input(contract, user, 2)).unwrap();

        assert!(net.verify_input(&other[0], &proof, contract, user).is_err());
    }

    #[test]
    fn test_tampered_proof_rejected() {
        let net = devnet();
        let contract = Address([1; 20]);
        let user = Address([2; 20]);
        let (handles, proof) = net.encrypt_input(&input(contract, user, 1)).unwrap();

        let mut decoded: InputProof = bincode::deserialize(&proof).unwrap();
        decoded.signature[0] ^= 0xFF;
        let tampered = bincode::serialize(&decoded).unwrap();
        assert!(net.verify_input(&handles[0], &tampered, contract, user).is_err());
    }

    #[test]
    fn test_decrypt_requires_acl() {
        let net = devnet();
        let contract = Address([1; 20]);
        let user = Address([2; 20]);
        let (handles, _) = net.encrypt_input(&input(contract, user, 77)).unwrap();
        let handle = handles[0];

        assert!(net.decrypt_for(&handle, contract, user).is_err());

        net.allow(&handle, contract);
        net.allow(&handle, user);
        assert_eq!(net.decrypt_for(&handle, contract, user).unwrap(), ClearValue::Uint128(77));
        assert!(net.decrypt_for(&handle, contract, Address([3; 20])).is_err());

        net.allow_public(&handle);
        assert_eq!(
            net.decrypt_for(&handle, contract, Address([3; 20])).unwrap(),
            ClearValue::Uint128(77)
        );
    }

    #[test]
    fn test_key_material_is_deterministic() {
        let a = devnet();
        let b = devnet();
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.verifier_key(), b.verifier_key());
    }
}
