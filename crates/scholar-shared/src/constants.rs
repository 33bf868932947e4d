/// Chain id of the local Hardhat devnet. Selects the simulation engine.
pub const LOCAL_CHAIN_ID: u64 = 31337;

/// Sepolia testnet, served by the relayer-backed engine.
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

/// Networks the client knows how to talk to.
pub const SUPPORTED_CHAIN_IDS: &[u64] = &[LOCAL_CHAIN_ID, SEPOLIA_CHAIN_ID];

/// JSON-RPC endpoint of the local devnet
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Relayer used for every non-local network
pub const DEFAULT_RELAYER_URL: &str = "https://relayer.testnet.zama.cloud";

/// Where the Q&A contract lands on a fresh local devnet
pub const LOCAL_CONTRACT_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

/// Statically known support contracts on the local devnet
pub const LOCAL_ACL_ADDRESS: &str = "0x50157CFfD6bBFA2DECe204a89ec419c23ef5755D";
pub const LOCAL_INPUT_VERIFIER_ADDRESS: &str = "0x901F8942346f7AB3a01F6D7613119Bca447Bb030";
pub const LOCAL_KMS_VERIFIER_ADDRESS: &str = "0x1364cBBf2cDF5032C47d8226a6f6FBD2AFCDacAC";
pub const LOCAL_DECRYPTION_VERIFYING_CONTRACT: &str = "0x5ffdaAB0373E62E2ea2944776209aEf29E631A64";
pub const LOCAL_INPUT_VERIFYING_CONTRACT: &str = "0x812b06e1CDCE800494b79fFE4f925A504a9A9810";
pub const LOCAL_GATEWAY_CHAIN_ID: u64 = 55815;

/// Typed-data domain for decryption grants
pub const TYPED_DATA_DOMAIN_NAME: &str = "FHEVM";
pub const TYPED_DATA_DOMAIN_VERSION: &str = "1";

/// Decryption grants expire this many hours after issuance
pub const GRANT_VALIDITY_HOURS: i64 = 24;

/// Namespace prefix for every persisted client entry
pub const STORAGE_NAMESPACE: &str = "fhevm";

/// Number of questions pulled by a default refresh
pub const DEFAULT_RECENT_QUESTIONS: u64 = 10;

/// Ciphertext handle size in bytes
pub const HANDLE_SIZE: usize = 32;

/// Handle layout version written into the last byte
pub const HANDLE_VERSION: u8 = 0;

/// Account address size in bytes
pub const ADDRESS_SIZE: usize = 20;

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_SEAL_KEY: &str = "anon-scholar-coprocessor-seal-v1";
pub const KDF_CONTEXT_HANDLE_KEY: &str = "anon-scholar-coprocessor-handle-v1";
pub const KDF_CONTEXT_INPUT_VERIFIER: &str = "anon-scholar-input-verifier-v1";
pub const KDF_CONTEXT_PUBLIC_KEY: &str = "anon-scholar-sim-public-key-v1";
