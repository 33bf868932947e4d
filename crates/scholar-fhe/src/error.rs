use thiserror::Error;

use scholar_shared::ChainId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FheError {
    /// Engine could not be constructed or reached.
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    /// An operation ran before the engine reached the ready state.
    #[error("Engine not ready")]
    NotReady,

    /// Network outside the allow-list.
    #[error("Unsupported network: chain {0}")]
    UnsupportedNetwork(ChainId),

    /// A newer initialize call replaced this one before it finished.
    #[error("Initialization for chain {0} superseded by a newer request")]
    Superseded(ChainId),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// A (handle, proof) pair failed verification for the submitted context.
    #[error("Input rejected: {0}")]
    InputRejected(String),
}

pub type Result<T> = std::result::Result<T, FheError>;
