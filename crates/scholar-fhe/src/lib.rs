//! FHE engine layer: engine capability trait, simulation and relayer engines,
//! engine lifecycle per chain, and value encryption.

pub mod encryption;
pub mod engine;
pub mod error;
pub mod loader;
pub mod provider;
pub mod remote;
pub mod simulation;

pub use encryption::{CiphertextPayload, EncryptionContext, PlainValue};
pub use engine::{EncryptedInput, EngineKind, FheEngine, InputBuilder, RawHandle, RevealRequest};
pub use error::{FheError, Result};
pub use loader::{EngineLoader, RelayerLoader, SimulationLoader};
pub use provider::{CryptoEngineProvider, EngineConfig, EngineStatus};
pub use remote::RelayerEngine;
pub use simulation::{LocalDevnet, SimulationEngine, SimulationMetadata};
