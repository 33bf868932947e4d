//! The Q&A contract as seen from the client.
//!
//! Reads return plain fields and opaque ciphertext handles; the contract's
//! encrypted arithmetic stays on the ledger side.

mod local;

pub use local::LocalLedger;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scholar_fhe::CiphertextPayload;
use scholar_shared::{Address, ChainId, Handle};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("No contract at {contract} on chain {chain_id}")]
    NoContract { chain_id: ChainId, contract: Address },

    #[error("{call} reverted: {reason}")]
    Reverted { call: &'static str, reason: String },

    #[error("{kind} #{id} does not exist")]
    NotFound { kind: &'static str, id: u64 },

    #[error("Unknown transaction {0}")]
    UnknownTransaction(TxHash),

    #[error("RPC error: {0}")]
    Rpc(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub [u8; 32]);

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TxHash({self})")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
}

/// An encrypted call argument: `externalE*` handle plus its input proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedArg {
    pub handle: Handle,
    pub proof: Vec<u8>,
}

impl From<CiphertextPayload> for EncryptedArg {
    fn from(payload: CiphertextPayload) -> Self {
        let (handle, proof) = payload.into_parts();
        Self { handle, proof }
    }
}

#[derive(Debug, Clone)]
pub enum LedgerCall {
    PostQuestion {
        content: EncryptedArg,
        author: EncryptedArg,
    },
    PostAnswer {
        question_id: u64,
        content: EncryptedArg,
        author: EncryptedArg,
    },
    CastVote {
        target_id: u64,
        is_question: bool,
        vote_type: EncryptedArg,
        weight: EncryptedArg,
    },
}

impl LedgerCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PostQuestion { .. } => "postQuestion",
            Self::PostAnswer { .. } => "postAnswer",
            Self::CastVote { .. } => "castVote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: u64,
    pub content: Handle,
    pub asker: Handle,
    /// Unix seconds of the block that included the post.
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: u64,
    pub question_id: u64,
    pub content: Handle,
    pub answerer: Handle,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counters {
    pub questions: u64,
    pub answers: u64,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    fn chain_id(&self) -> ChainId;

    /// Send a mutating call from `from`. Returns once the transaction is
    /// accepted; confirmation is a separate wait.
    async fn submit(&self, contract: Address, from: Address, call: LedgerCall) -> Result<TxHash>;

    async fn wait_for_receipt(&self, tx: &TxHash) -> Result<Receipt>;

    async fn question_counter(&self, contract: Address) -> Result<u64>;

    async fn answer_counter(&self, contract: Address) -> Result<u64>;

    async fn counters(&self, contract: Address) -> Result<Counters> {
        Ok(Counters {
            questions: self.question_counter(contract).await?,
            answers: self.answer_counter(contract).await?,
        })
    }

    /// Up to `count` question ids, newest first.
    async fn recent_questions(&self, contract: Address, count: u64) -> Result<Vec<u64>>;

    async fn question(&self, contract: Address, id: u64) -> Result<QuestionRecord>;

    async fn question_answers(&self, contract: Address, question_id: u64) -> Result<Vec<u64>>;

    async fn answer(&self, contract: Address, id: u64) -> Result<AnswerRecord>;

    async fn user_questions(&self, contract: Address, user: Address) -> Result<Vec<u64>>;

    async fn user_answers(&self, contract: Address, user: Address) -> Result<Vec<u64>>;
}
