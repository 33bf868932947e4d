//! Relayer-backed engine for public networks.
//!
//! The relayer holds the network's FHE key material. Input encryption and
//! user decryption are delegated to it over JSON/HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use scholar_shared::{Address, ChainId, ClearValue, EnginePublicKey};

use crate::engine::{EncryptedInput, EngineKind, FheEngine, InputBuilder, RawHandle, RevealRequest};
use crate::error::{FheError, Result};

// ── Wire types ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyResponse {
    public_key: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct WireValue {
    #[serde(rename = "type")]
    ty: String,
    value: String,
}

impl WireValue {
    pub(crate) fn from_clear(value: &ClearValue) -> Self {
        let value_text = match value {
            ClearValue::Bool(b) => b.to_string(),
            ClearValue::Uint32(v) => v.to_string(),
            ClearValue::Uint128(v) => v.to_string(),
            ClearValue::Address(a) => a.to_hex(),
        };
        Self {
            ty: value.encrypted_type().name().to_string(),
            value: value_text,
        }
    }

    pub(crate) fn into_clear(self) -> Result<ClearValue> {
        let bad = |what: &str| FheError::DecryptionFailed(format!("relayer returned bad {what}"));
        match self.ty.as_str() {
            "ebool" => self.value.parse().map(ClearValue::Bool).map_err(|_| bad("ebool")),
            "euint32" => self.value.parse().map(ClearValue::Uint32).map_err(|_| bad("euint32")),
            "euint128" => self.value.parse().map(ClearValue::Uint128).map_err(|_| bad("euint128")),
            "eaddress" => self.value.parse().map(ClearValue::Address).map_err(|_| bad("eaddress")),
            other => Err(FheError::DecryptionFailed(format!("relayer returned unknown type {other}"))),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InputProofRequest {
    chain_id: ChainId,
    contract_address: Address,
    user_address: Address,
    values: Vec<WireValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputProofResponse {
    handles: Vec<String>,
    input_proof: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDecryptRequest<'a> {
    chain_id: ChainId,
    handle: String,
    contract_address: Address,
    user_address: Address,
    public_key: &'a EnginePublicKey,
    signature: String,
    signer_key: String,
    issued_at: i64,
}

// ── Engine ───────────────────────────────────────────────────

pub struct RelayerEngine {
    http: reqwest::Client,
    base_url: String,
    chain_id: ChainId,
    public_key: EnginePublicKey,
}

impl RelayerEngine {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, chain_id: ChainId, public_key: EnginePublicKey) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chain_id,
            public_key,
        }
    }

    /// Fetch the network public key for `chain_id` from the relayer.
    pub async fn fetch_public_key(http: &reqwest::Client, base_url: &str, chain_id: ChainId) -> Result<EnginePublicKey> {
        let url = format!("{}/v1/keyurl", base_url.trim_end_matches('/'));
        let unavailable = |e: reqwest::Error| FheError::EngineUnavailable(format!("relayer key fetch failed: {e}"));

        let response: KeyResponse = http
            .get(&url)
            .query(&[("chainId", chain_id.0)])
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)?;

        let key = EnginePublicKey::from_hex(&response.public_key)
            .map_err(|e| FheError::EngineUnavailable(format!("relayer returned bad key: {e}")))?;
        info!(chain = %chain_id, bytes = key.as_bytes().len(), "Fetched network public key");
        Ok(key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl FheEngine for RelayerEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Relayer
    }

    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn public_key(&self) -> &EnginePublicKey {
        &self.public_key
    }

    async fn encrypt(&self, input: &InputBuilder) -> Result<EncryptedInput> {
        if input.is_empty() {
            return Err(FheError::EncryptionFailed("input has no values".into()));
        }

        let body = InputProofRequest {
            chain_id: self.chain_id,
            contract_address: input.contract(),
            user_address: input.user(),
            values: input.values().iter().map(WireValue::from_clear).collect(),
        };
        let failed = |e: reqwest::Error| FheError::EncryptionFailed(format!("relayer input proof: {e}"));

        let response: InputProofResponse = self
            .http
            .post(format!("{}/v1/input-proof", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(failed)?
            .error_for_status()
            .map_err(failed)?
            .json()
            .await
            .map_err(failed)?;

        let input_proof = hex::decode(response.input_proof.trim_start_matches("0x"))
            .map_err(|e| FheError::EncryptionFailed(format!("relayer returned bad proof: {e}")))?;
        debug!(count = response.handles.len(), "Relayer produced input proof");

        Ok(EncryptedInput {
            handles: response.handles.into_iter().map(RawHandle::Text).collect(),
            input_proof,
        })
    }

    async fn reveal(&self, request: RevealRequest<'_>) -> Result<ClearValue> {
        let grant = request.grant;
        if !grant.is_valid() {
            return Err(FheError::DecryptionFailed("grant expired".into()));
        }
        if !grant.covers(&self.public_key, request.handle) {
            return Err(FheError::DecryptionFailed(
                "grant was issued for a different key or ciphertext".into(),
            ));
        }

        let body = UserDecryptRequest {
            chain_id: self.chain_id,
            handle: request.handle.to_hex(),
            contract_address: request.contract,
            user_address: request.user,
            public_key: &self.public_key,
            signature: format!("0x{}", hex::encode(&grant.signature)),
            signer_key: format!("0x{}", hex::encode(grant.signer_key)),
            issued_at: grant.issued_at.timestamp(),
        };
        let failed = |e: reqwest::Error| FheError::DecryptionFailed(format!("relayer user decrypt: {e}"));

        let value: WireValue = self
            .http
            .post(format!("{}/v1/user-decrypt", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(failed)?
            .error_for_status()
            .map_err(failed)?
            .json()
            .await
            .map_err(failed)?;

        let clear = value.into_clear()?;
        if let Ok(expected) = request.handle.encrypted_type() {
            if expected != clear.encrypted_type() {
                return Err(FheError::DecryptionFailed(format!(
                    "relayer returned {} for a {} handle",
                    clear.encrypted_type(),
                    expected
                )));
            }
        }
        Ok(clear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_value_shapes() {
        let wire = WireValue::from_clear(&ClearValue::Uint128(340));
        assert_eq!(serde_json::to_string(&wire).unwrap(), r#"{"type":"euint128","value":"340"}"#);

        let wire = WireValue::from_clear(&ClearValue::Bool(true));
        assert_eq!(wire.into_clear().unwrap(), ClearValue::Bool(true));
    }

    #[test]
    fn test_wire_value_address_roundtrip() {
        let addr = Address([0xAB; 20]);
        let wire = WireValue::from_clear(&ClearValue::Address(addr));
        assert_eq!(wire.into_clear().unwrap(), ClearValue::Address(addr));
    }

    #[test]
    fn test_wire_value_rejects_garbage() {
        let wire = WireValue {
            ty: "euint32".into(),
            value: "not-a-number".into(),
        };
        assert!(matches!(wire.into_clear(), Err(FheError::DecryptionFailed(_))));

        let wire = WireValue {
            ty: "efloat".into(),
            value: "1".into(),
        };
        assert!(wire.into_clear().is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let engine = RelayerEngine::new(
            reqwest::Client::new(),
            "https://relayer.example/",
            ChainId(11155111),
            EnginePublicKey(vec![1, 2, 3]),
        );
        assert_eq!(engine.base_url(), "https://relayer.example");
        assert_eq!(engine.kind(), EngineKind::Relayer);
    }
}
