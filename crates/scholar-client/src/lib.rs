pub mod authorization;
pub mod config;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod network;
pub mod records;
pub mod session;
pub mod sync;
pub mod wallet;

use tracing_subscriber::{fmt, EnvFilter};

pub use authorization::DecryptionAuthorization;
pub use config::{ClientConfig, Deployments};
pub use error::{Result, ScholarError};
pub use gate::OperationGate;
pub use ledger::{Ledger, LedgerCall, LedgerError, LocalLedger};
pub use network::{build_provider, open_store, LocalNetwork};
pub use records::{ContentKind, ContentRecord, ContentState, DecryptedContent};
pub use session::{MutationOutcome, ScholarSession, SessionParts};
pub use sync::{RecordIndex, RecordSynchronizer};
pub use wallet::{LocalWallet, WalletError, WalletSigner};

pub const DEFAULT_LOG_FILTER: &str =
    "anon_scholar=info,scholar_client=debug,scholar_fhe=debug,scholar_store=info,warn";

/// Install the global tracing subscriber. `RUST_LOG` wins over the default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
