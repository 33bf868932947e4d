//! # anon-scholar
//!
//! Command-line client for the anonymous Q&A contract.
//!
//! - `demo` runs a full post / refresh / decrypt cycle against the in-process
//!   devnet
//! - `key show|clear` inspects or evicts cached network key material

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use scholar_client::{
    build_provider, open_store, ClientConfig, LocalNetwork, LocalWallet, ScholarSession, SessionParts,
};
use scholar_fhe::EngineStatus;
use scholar_shared::ChainId;
use scholar_store::{KeyValueStore, PublicKeyStorage};

#[derive(Parser, Debug)]
#[clap(
    name = "anon-scholar",
    version,
    about = "Anonymous Q&A over encrypted on-chain content."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Post, list and decrypt against the local devnet.
    Demo {
        /// Question text to post.
        #[clap(long, default_value = "How does FHE keep votes private?")]
        question: String,

        /// Answer text to post under the question.
        #[clap(long, default_value = "Votes are tallied over ciphertexts.")]
        answer: String,
    },

    /// Cached network public keys.
    Key {
        #[clap(subcommand)]
        command: KeyCommands,
    },
}

#[derive(Subcommand, Debug)]
enum KeyCommands {
    /// Print the cached key for a chain.
    Show {
        #[clap(long, env = "SCHOLAR_CHAIN_ID")]
        chain: u64,
    },
    /// Remove the cached key for a chain.
    Clear {
        #[clap(long, env = "SCHOLAR_CHAIN_ID")]
        chain: u64,
    },
}

async fn run_demo(config: ClientConfig, question: &str, answer: &str) -> Result<()> {
    let network = LocalNetwork::hardhat(&config)?;
    if config.chain_id != network.chain_id() {
        bail!(
            "demo runs on the local chain {}, configured chain is {}",
            network.chain_id(),
            config.chain_id
        );
    }

    let store: Arc<dyn KeyValueStore> = open_store(&config).context("opening local store")?;
    let provider = Arc::new(build_provider(&config, store.clone(), network.devnet.clone()));
    let wallet = Arc::new(LocalWallet::generate());
    info!(address = %wallet.key().address(), "Using ephemeral wallet");

    let session = ScholarSession::new(
        &config,
        SessionParts {
            wallet,
            ledger: network.ledger.clone(),
            provider,
            store,
        },
    )?;

    match session.start().await {
        EngineStatus::Ready(engine) => {
            println!("engine ready: {} on chain {}", engine.engine.kind(), engine.chain_id)
        }
        other => bail!("engine did not start: {other:?}"),
    }

    session.post_question(question).await?;
    let questions = session.refresh_questions().await?;
    println!("\nquestions:");
    for q in &questions {
        println!("  #{} [{}] {}", q.id, q.display_author(), q.display_content());
    }

    let Some(latest) = questions.first() else {
        bail!("posted question did not appear");
    };
    session.post_answer(latest.id, answer).await?;
    session.cast_vote(latest.id, true, true).await?;

    if let Some(record) = session.decrypt_question(latest.id).await? {
        println!("\ndecrypted #{}: {}", record.id, record.display_content());
    }
    for a in session.answers(latest.id) {
        let shown = match session.decrypt_answer(a.id).await? {
            Some(record) => record.display_content(),
            None => a.display_content(),
        };
        println!("  answer #{}: {}", a.id, shown);
    }

    println!("\nmy questions: {:?}", session.my_questions().await?);
    Ok(())
}

async fn run_key(config: ClientConfig, command: KeyCommands) -> Result<()> {
    let store: Arc<dyn KeyValueStore> = open_store(&config).context("opening local store")?;
    let keys = PublicKeyStorage::new(store);

    match command {
        KeyCommands::Show { chain } => match keys.get_public_key(ChainId(chain)).await {
            Some(record) => println!(
                "chain {}: {} (stored {})",
                record.chain_id, record.public_key, record.stored_at
            ),
            None => println!("chain {chain}: no cached key"),
        },
        KeyCommands::Clear { chain } => {
            keys.clear_public_key(ChainId(chain)).await;
            println!("chain {chain}: cleared");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    scholar_client::init_tracing();

    let cli = Cli::parse();
    let config = ClientConfig::from_env();
    info!(chain = %config.chain_id, "Starting anon-scholar v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Demo { question, answer } => run_demo(config, &question, &answer).await,
        Commands::Key { command } => run_key(config, command).await,
    }
}
