//! In-process ledger hosting the Q&A contract on the local devnet.
//!
//! Every encrypted argument is checked against the devnet's input verifier
//! for the exact contract and sender before any state changes, and ACL rights
//! are granted the way the deployed contract grants them: content is
//! decryptable by anyone holding a grant, author handles only by the author.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use scholar_fhe::LocalDevnet;
use scholar_shared::{Address, ChainId, EncryptedType, Handle};

use super::{
    AnswerRecord, EncryptedArg, Ledger, LedgerCall, LedgerError, QuestionRecord, Receipt, Result,
    TxHash,
};

#[derive(Debug, Clone)]
struct StoredVote {
    voter: Address,
    vote_type: Handle,
    weight: Handle,
}

#[derive(Default)]
struct ContractState {
    questions: Vec<QuestionRecord>,
    answers: Vec<AnswerRecord>,
    question_answers: HashMap<u64, Vec<u64>>,
    user_questions: HashMap<Address, Vec<u64>>,
    user_answers: HashMap<Address, Vec<u64>>,
    question_votes: HashMap<u64, Vec<StoredVote>>,
    answer_votes: HashMap<u64, Vec<StoredVote>>,
    receipts: HashMap<TxHash, Receipt>,
}

pub struct LocalLedger {
    devnet: Arc<LocalDevnet>,
    contract: Address,
    state: Mutex<ContractState>,
    block_number: AtomicU64,
    nonce: AtomicU64,
}

impl LocalLedger {
    pub fn new(devnet: Arc<LocalDevnet>, contract: Address) -> Self {
        Self {
            devnet,
            contract,
            state: Mutex::new(ContractState::default()),
            block_number: AtomicU64::new(0),
            nonce: AtomicU64::new(0),
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn devnet(&self) -> &Arc<LocalDevnet> {
        &self.devnet
    }

    /// Number of transactions that changed contract state.
    pub fn transaction_count(&self) -> usize {
        self.state.lock().map(|s| s.receipts.len()).unwrap_or(0)
    }

    /// Voters and their encrypted (vote type, weight) handles for a target.
    pub fn votes_on(&self, target_id: u64, is_question: bool) -> Vec<(Address, Handle, Handle)> {
        self.state
            .lock()
            .map(|s| {
                let votes = if is_question { &s.question_votes } else { &s.answer_votes };
                votes
                    .get(&target_id)
                    .map(|v| v.iter().map(|vote| (vote.voter, vote.vote_type, vote.weight)).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn check_contract(&self, contract: Address) -> Result<()> {
        if contract == self.contract {
            Ok(())
        } else {
            Err(LedgerError::NoContract {
                chain_id: self.devnet.chain_id(),
                contract,
            })
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ContractState>> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Rpc("ledger state poisoned".into()))
    }

    /// Verify an `externalE*` argument the way the contract's `fromExternal`
    /// does: proof bound to (contract, sender) and matching type.
    fn accept(&self, call: &'static str, arg: &EncryptedArg, from: Address, expected: EncryptedType) -> Result<Handle> {
        let ty = self
            .devnet
            .verify_input(&arg.handle, &arg.proof, self.contract, from)
            .map_err(|e| LedgerError::Reverted {
                call,
                reason: e.to_string(),
            })?;
        if ty != expected {
            return Err(LedgerError::Reverted {
                call,
                reason: format!("expected {}, got {}", expected.name(), ty.name()),
            });
        }
        Ok(arg.handle)
    }

    fn next_tx_hash(&self, from: Address, call: &LedgerCall) -> TxHash {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.devnet.chain_id().0.to_be_bytes());
        hasher.update(&from.0);
        hasher.update(&nonce.to_be_bytes());
        hasher.update(call.name().as_bytes());
        TxHash(*hasher.finalize().as_bytes())
    }
}

#[async_trait]
impl Ledger for LocalLedger {
    fn chain_id(&self) -> ChainId {
        self.devnet.chain_id()
    }

    async fn submit(&self, contract: Address, from: Address, call: LedgerCall) -> Result<TxHash> {
        self.check_contract(contract)?;
        let name = call.name();
        let timestamp = u64::try_from(Utc::now().timestamp()).unwrap_or(0);

        // validate everything before touching state
        match &call {
            LedgerCall::PostQuestion { content, author } => {
                let content = self.accept(name, content, from, EncryptedType::Uint128)?;
                let asker = self.accept(name, author, from, EncryptedType::Address)?;

                let mut state = self.lock()?;
                let id = state.questions.len() as u64 + 1;
                state.questions.push(QuestionRecord {
                    id,
                    content,
                    asker,
                    timestamp,
                });
                state.user_questions.entry(from).or_default().push(id);
                drop(state);

                self.grant_content(&content, &asker, from);
                info!(question_id = id, "QuestionPosted");
            }
            LedgerCall::PostAnswer {
                question_id,
                content,
                author,
            } => {
                let content = self.accept(name, content, from, EncryptedType::Uint128)?;
                let answerer = self.accept(name, author, from, EncryptedType::Address)?;

                let mut state = self.lock()?;
                if *question_id == 0 || *question_id > state.questions.len() as u64 {
                    return Err(LedgerError::Reverted {
                        call: name,
                        reason: format!("question {question_id} does not exist"),
                    });
                }
                let id = state.answers.len() as u64 + 1;
                state.answers.push(AnswerRecord {
                    id,
                    question_id: *question_id,
                    content,
                    answerer,
                    timestamp,
                });
                state.question_answers.entry(*question_id).or_default().push(id);
                state.user_answers.entry(from).or_default().push(id);
                drop(state);

                self.grant_content(&content, &answerer, from);
                info!(question_id, answer_id = id, "AnswerPosted");
            }
            LedgerCall::CastVote {
                target_id,
                is_question,
                vote_type,
                weight,
            } => {
                let vote_type = self.accept(name, vote_type, from, EncryptedType::Uint32)?;
                let weight = self.accept(name, weight, from, EncryptedType::Uint32)?;

                let mut state = self.lock()?;
                let exists = if *is_question {
                    *target_id >= 1 && *target_id <= state.questions.len() as u64
                } else {
                    *target_id >= 1 && *target_id <= state.answers.len() as u64
                };
                if !exists {
                    return Err(LedgerError::Reverted {
                        call: name,
                        reason: format!("target {target_id} does not exist"),
                    });
                }
                let votes = if *is_question {
                    &mut state.question_votes
                } else {
                    &mut state.answer_votes
                };
                votes.entry(*target_id).or_default().push(StoredVote {
                    voter: from,
                    vote_type,
                    weight,
                });
                drop(state);

                self.devnet.allow(&vote_type, self.contract);
                self.devnet.allow(&weight, self.contract);
                info!(target_id, is_question, "VoteCast");
            }
        }

        let tx_hash = self.next_tx_hash(from, &call);
        let block_number = self.block_number.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock()?.receipts.insert(
            tx_hash,
            Receipt {
                tx_hash,
                block_number,
                success: true,
            },
        );
        debug!(%tx_hash, block_number, call = name, from = %from.short(), "Transaction mined");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx: &TxHash) -> Result<Receipt> {
        self.lock()?
            .receipts
            .get(tx)
            .cloned()
            .ok_or(LedgerError::UnknownTransaction(*tx))
    }

    async fn question_counter(&self, contract: Address) -> Result<u64> {
        self.check_contract(contract)?;
        Ok(self.lock()?.questions.len() as u64)
    }

    async fn answer_counter(&self, contract: Address) -> Result<u64> {
        self.check_contract(contract)?;
        Ok(self.lock()?.answers.len() as u64)
    }

    async fn recent_questions(&self, contract: Address, count: u64) -> Result<Vec<u64>> {
        self.check_contract(contract)?;
        let total = self.lock()?.questions.len() as u64;
        let oldest = total.saturating_sub(count) + 1;
        Ok((oldest..=total).rev().collect())
    }

    async fn question(&self, contract: Address, id: u64) -> Result<QuestionRecord> {
        self.check_contract(contract)?;
        let state = self.lock()?;
        id.checked_sub(1)
            .and_then(|index| state.questions.get(index as usize))
            .cloned()
            .ok_or(LedgerError::NotFound { kind: "question", id })
    }

    async fn question_answers(&self, contract: Address, question_id: u64) -> Result<Vec<u64>> {
        self.check_contract(contract)?;
        let state = self.lock()?;
        if question_id == 0 || question_id > state.questions.len() as u64 {
            return Err(LedgerError::NotFound {
                kind: "question",
                id: question_id,
            });
        }
        Ok(state.question_answers.get(&question_id).cloned().unwrap_or_default())
    }

    async fn answer(&self, contract: Address, id: u64) -> Result<AnswerRecord> {
        self.check_contract(contract)?;
        let state = self.lock()?;
        id.checked_sub(1)
            .and_then(|index| state.answers.get(index as usize))
            .cloned()
            .ok_or(LedgerError::NotFound { kind: "answer", id })
    }

    async fn user_questions(&self, contract: Address, user: Address) -> Result<Vec<u64>> {
        self.check_contract(contract)?;
        Ok(self.lock()?.user_questions.get(&user).cloned().unwrap_or_default())
    }

    async fn user_answers(&self, contract: Address, user: Address) -> Result<Vec<u64>> {
        self.check_contract(contract)?;
        Ok(self.lock()?.user_answers.get(&user).cloned().unwrap_or_default())
    }
}

impl LocalLedger {
    fn grant_content(&self, content: &Handle, author: &Handle, from: Address) {
        self.devnet.allow(content, self.contract);
        self.devnet.allow_public(content);
        self.devnet.allow(author, self.contract);
        self.devnet.allow(author, from);
    }
}
