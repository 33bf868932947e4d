use thiserror::Error;

use scholar_fhe::FheError;
use scholar_shared::ChainId;
use scholar_store::StoreError;

use crate::ledger::LedgerError;
use crate::wallet::WalletError;

/// Errors surfaced at the session boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScholarError {
    #[error("Encryption engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Encryption engine is not ready")]
    EngineNotReady,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Signature request rejected")]
    SignatureRejected,

    #[error("No contract deployed on chain {0}")]
    ContractUnavailable(ChainId),

    #[error("Unsupported network: chain {0}")]
    UnsupportedNetwork(ChainId),

    #[error("Storage error: {0}")]
    Store(String),
}

impl From<FheError> for ScholarError {
    fn from(e: FheError) -> Self {
        match e {
            FheError::NotReady => Self::EngineNotReady,
            FheError::UnsupportedNetwork(chain) => Self::UnsupportedNetwork(chain),
            FheError::EngineUnavailable(msg) => Self::EngineUnavailable(msg),
            FheError::Superseded(_) => Self::EngineUnavailable(e.to_string()),
            FheError::EncryptionFailed(msg) | FheError::InputRejected(msg) => Self::EncryptionFailed(msg),
            FheError::DecryptionFailed(msg) => Self::DecryptionFailed(msg),
        }
    }
}

impl From<LedgerError> for ScholarError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NoContract { chain_id, .. } => Self::ContractUnavailable(chain_id),
            other => Self::TransactionFailed(other.to_string()),
        }
    }
}

impl From<WalletError> for ScholarError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::Rejected => Self::SignatureRejected,
            WalletError::Unavailable(msg) => Self::DecryptionFailed(format!("wallet unavailable: {msg}")),
        }
    }
}

impl From<StoreError> for ScholarError {
    fn from(e: StoreError) -> Self {
        Self::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScholarError>;
