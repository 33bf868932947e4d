use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,

    #[error("Invalid key length")]
    InvalidKeyLength,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Invalid key bytes")]
    InvalidKeyBytes,

    #[error("Malformed signature")]
    Malformed,

    #[error("Signature does not match message")]
    Mismatch,

    #[error("Signer key does not belong to {0}")]
    SignerMismatch(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Invalid {what} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown encrypted type code: {0}")]
    UnknownType(u8),

    #[error("Value {value} does not fit in {ty}")]
    OutOfRange { value: String, ty: &'static str },
}
