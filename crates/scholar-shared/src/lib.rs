//! # scholar-shared
//!
//! Types and primitives shared by every AnonScholar crate: addresses,
//! ciphertext handles, typed clear values, content digests, typed-data
//! hashing and decryption grants.

pub mod constants;
pub mod crypto;
pub mod digest;
pub mod error;
pub mod grant;
pub mod identity;
pub mod typed_data;
pub mod types;

pub use error::{CryptoError, EncodingError, SharedError, SignatureError};
pub use grant::DecryptionGrant;
pub use identity::WalletKey;
pub use typed_data::{ReencryptMessage, TypedDataDomain};
pub use types::{Address, ChainId, ClearValue, EncryptedType, EnginePublicKey, Handle};
