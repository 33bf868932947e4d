//! # scholar-store
//!
//! Client-side persistence for cryptographic material.
//!
//! Everything goes through the small [`KeyValueStore`] interface, with an
//! in-memory variant for tests and throwaway sessions and a durable SQLite
//! variant for real clients. [`PublicKeyStorage`] sits on top and caches
//! engine public keys per network.

pub mod database;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod public_keys;
pub mod traits;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use models::*;
pub use public_keys::PublicKeyStorage;
pub use traits::{namespaced_key, KeyValueStore};
