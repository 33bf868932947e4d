//! One user's session against the Q&A contract.
//!
//! Mutations go through the operation gate, encrypt their arguments, wait for
//! confirmation and refresh the affected list before returning. Failures are
//! returned to the caller and also kept in a last-error slot.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use scholar_fhe::{CryptoEngineProvider, EncryptionContext, EngineStatus, PlainValue};
use scholar_shared::{Address, ChainId, EncryptedType};
use scholar_store::KeyValueStore;

use crate::authorization::DecryptionAuthorization;
use crate::config::ClientConfig;
use crate::error::{Result, ScholarError};
use crate::gate::OperationGate;
use crate::ledger::{EncryptedArg, Ledger, LedgerCall, Receipt};
use crate::records::ContentRecord;
use crate::sync::RecordSynchronizer;
use crate::wallet::WalletSigner;

const VOTE_UP: u128 = 1;
const VOTE_DOWN: u128 = 0;
const VOTE_WEIGHT: u128 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum MutationOutcome {
    Confirmed(Receipt),
    /// Another mutation was in flight; nothing was submitted.
    Skipped,
}

impl MutationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }
}

/// Counts one operation as in flight until dropped, including when the
/// caller abandons the future.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// External collaborators a session is built from.
pub struct SessionParts {
    pub wallet: Arc<dyn WalletSigner>,
    pub ledger: Arc<dyn Ledger>,
    pub provider: Arc<CryptoEngineProvider>,
    pub store: Arc<dyn KeyValueStore>,
}

pub struct ScholarSession {
    id: Uuid,
    chain_id: ChainId,
    contract: Address,
    recent_limit: u64,
    wallet: Arc<dyn WalletSigner>,
    ledger: Arc<dyn Ledger>,
    provider: Arc<CryptoEngineProvider>,
    encryption: EncryptionContext,
    sync: RecordSynchronizer,
    gate: OperationGate,
    in_flight: AtomicUsize,
    last_error: Mutex<Option<ScholarError>>,
}

impl ScholarSession {
    pub fn new(config: &ClientConfig, parts: SessionParts) -> Result<Self> {
        let contract = config.contract_address()?;
        let authorization = Arc::new(DecryptionAuthorization::new(parts.store));
        let sync = RecordSynchronizer::new(
            parts.ledger.clone(),
            contract,
            parts.provider.clone(),
            authorization,
            parts.wallet.clone(),
        );

        let id = Uuid::new_v4();
        debug!(session = %id, chain = %config.chain_id, contract = %contract, "Session created");
        Ok(Self {
            id,
            chain_id: config.chain_id,
            contract,
            recent_limit: config.recent_limit,
            encryption: EncryptionContext::new(parts.provider.clone()),
            wallet: parts.wallet,
            ledger: parts.ledger,
            provider: parts.provider,
            sync,
            gate: OperationGate::new(),
            in_flight: AtomicUsize::new(0),
            last_error: Mutex::new(None),
        })
    }

    /// Bring up the engine for the session's chain. Failures are reported in
    /// the returned status, not as an error.
    pub async fn start(&self) -> EngineStatus {
        if let Err(e) = self.provider.initialize(self.chain_id).await {
            let error = ScholarError::from(e);
            warn!(session = %self.id, error = %error, "Engine failed to start");
            self.record_error(error);
        }
        self.provider.status()
    }

    // ── Accessors ────────────────────────────────────────────

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn engine_status(&self) -> EngineStatus {
        self.provider.status()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn is_mutating(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn last_error(&self) -> Option<ScholarError> {
        self.last_error.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn clear_error(&self) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = None;
        }
    }

    pub fn questions(&self) -> Vec<ContentRecord> {
        self.sync.questions()
    }

    pub fn answers(&self, question_id: u64) -> Vec<ContentRecord> {
        self.sync.answers(question_id)
    }

    pub fn synchronizer(&self) -> &RecordSynchronizer {
        &self.sync
    }

    // ── Mutations ────────────────────────────────────────────

    pub async fn post_question(&self, text: &str) -> Result<MutationOutcome> {
        let Some(_gate) = self.gate.try_acquire() else {
            return Ok(self.skipped("postQuestion"));
        };
        self.track(self.submit_question(text)).await
    }

    pub async fn post_answer(&self, question_id: u64, text: &str) -> Result<MutationOutcome> {
        let Some(_gate) = self.gate.try_acquire() else {
            return Ok(self.skipped("postAnswer"));
        };
        self.track(self.submit_answer(question_id, text)).await
    }

    pub async fn cast_vote(&self, target_id: u64, is_question: bool, upvote: bool) -> Result<MutationOutcome> {
        let Some(_gate) = self.gate.try_acquire() else {
            return Ok(self.skipped("castVote"));
        };
        self.track(self.submit_vote(target_id, is_question, upvote)).await
    }

    async fn submit_question(&self, text: &str) -> Result<MutationOutcome> {
        let content = self.encrypt_content(text).await?;
        let author = self.encrypt_author().await?;
        self.sync.remember_text(text);

        let receipt = self
            .confirm(LedgerCall::PostQuestion { content, author })
            .await?;
        self.sync.refresh_questions(self.recent_limit).await?;
        Ok(MutationOutcome::Confirmed(receipt))
    }

    async fn submit_answer(&self, question_id: u64, text: &str) -> Result<MutationOutcome> {
        let content = self.encrypt_content(text).await?;
        let author = self.encrypt_author().await?;
        self.sync.remember_text(text);

        let receipt = self
            .confirm(LedgerCall::PostAnswer {
                question_id,
                content,
                author,
            })
            .await?;
        self.sync.refresh_answers(question_id).await?;
        Ok(MutationOutcome::Confirmed(receipt))
    }

    async fn submit_vote(&self, target_id: u64, is_question: bool, upvote: bool) -> Result<MutationOutcome> {
        let direction = if upvote { VOTE_UP } else { VOTE_DOWN };
        let vote_type = self.encrypt_u32(direction).await?;
        let weight = self.encrypt_u32(VOTE_WEIGHT).await?;

        let receipt = self
            .confirm(LedgerCall::CastVote {
                target_id,
                is_question,
                vote_type,
                weight,
            })
            .await?;

        if is_question {
            self.sync.refresh_questions(self.recent_limit).await?;
        } else {
            let answer = self.ledger.answer(self.contract, target_id).await?;
            self.sync.refresh_answers(answer.question_id).await?;
        }
        Ok(MutationOutcome::Confirmed(receipt))
    }

    // ── Reads ────────────────────────────────────────────────

    pub async fn refresh_questions(&self) -> Result<Vec<ContentRecord>> {
        self.track(self.sync.refresh_questions(self.recent_limit)).await
    }

    pub async fn refresh_answers(&self, question_id: u64) -> Result<Vec<ContentRecord>> {
        self.track(self.sync.refresh_answers(question_id)).await
    }

    pub async fn decrypt_question(&self, id: u64) -> Result<Option<ContentRecord>> {
        self.track(self.sync.decrypt_question(id)).await
    }

    pub async fn decrypt_answer(&self, id: u64) -> Result<Option<ContentRecord>> {
        self.track(self.sync.decrypt_answer(id)).await
    }

    pub async fn my_questions(&self) -> Result<Vec<u64>> {
        self.track(self.sync.my_questions()).await
    }

    // ── Internals ────────────────────────────────────────────

    async fn encrypt_content(&self, text: &str) -> Result<EncryptedArg> {
        let payload = self
            .encryption
            .encrypt(
                self.contract,
                self.address(),
                PlainValue::Text(text.to_string()),
                EncryptedType::Uint128,
            )
            .await?;
        Ok(payload.into())
    }

    async fn encrypt_author(&self) -> Result<EncryptedArg> {
        let payload = self
            .encryption
            .encrypt(
                self.contract,
                self.address(),
                PlainValue::Address(self.address()),
                EncryptedType::Address,
            )
            .await?;
        Ok(payload.into())
    }

    async fn encrypt_u32(&self, value: u128) -> Result<EncryptedArg> {
        let payload = self
            .encryption
            .encrypt(self.contract, self.address(), PlainValue::Unsigned(value), EncryptedType::Uint32)
            .await?;
        Ok(payload.into())
    }

    /// Submit and wait for the receipt.
    async fn confirm(&self, call: LedgerCall) -> Result<Receipt> {
        let name = call.name();
        let tx = self.ledger.submit(self.contract, self.address(), call).await?;
        info!(%tx, call = name, "Transaction submitted, waiting for confirmation");

        let receipt = self.ledger.wait_for_receipt(&tx).await?;
        if !receipt.success {
            return Err(ScholarError::TransactionFailed(format!(
                "{name} failed in block {}",
                receipt.block_number
            )));
        }
        info!(%tx, block = receipt.block_number, call = name, "Transaction confirmed");
        Ok(receipt)
    }

    async fn track<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        let result = {
            let _loading = InFlight::enter(&self.in_flight);
            op.await
        };

        if let Err(e) = &result {
            warn!(session = %self.id, error = %e, "Operation failed");
            self.record_error(e.clone());
        }
        result
    }

    fn record_error(&self, error: ScholarError) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = Some(error);
        }
    }

    fn skipped(&self, call: &'static str) -> MutationOutcome {
        debug!(session = %self.id, call, "Mutation already in flight, dropping call");
        MutationOutcome::Skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{build_provider, LocalNetwork};
    use crate::wallet::{LocalWallet, TypedSignature, WalletError};
    use async_trait::async_trait;
    use scholar_shared::{ReencryptMessage, TypedDataDomain};
    use scholar_store::MemoryStore;
    use std::time::Duration;

    struct Harness {
        network: LocalNetwork,
        session: ScholarSession,
    }

    /// Wallet whose signature prompt is never answered.
    struct StalledWallet(LocalWallet);

    #[async_trait]
    impl WalletSigner for StalledWallet {
        fn address(&self) -> Address {
            self.0.address()
        }

        async fn sign_typed_data(
            &self,
            _domain: &TypedDataDomain,
            _message: &ReencryptMessage,
        ) -> std::result::Result<TypedSignature, WalletError> {
            std::future::pending().await
        }
    }

    fn harness(config: &ClientConfig) -> Harness {
        harness_with(config, Arc::new(LocalWallet::generate()))
    }

    fn harness_with(config: &ClientConfig, wallet: Arc<dyn WalletSigner>) -> Harness {
        let network = LocalNetwork::hardhat(&ClientConfig::default()).unwrap();
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let provider = Arc::new(build_provider(config, store.clone(), network.devnet.clone()));
        let session = ScholarSession::new(
            config,
            SessionParts {
                wallet,
                ledger: network.ledger.clone(),
                provider,
                store,
            },
        )
        .unwrap();
        Harness { network, session }
    }

    async fn started() -> Harness {
        let h = harness(&ClientConfig::default());
        assert!(h.session.start().await.is_ready());
        h
    }

    #[tokio::test]
    async fn test_post_refreshes_before_returning() {
        let h = started().await;
        let outcome = h.session.post_question("hello").await.unwrap();
        assert!(outcome.is_confirmed());

        let questions = h.session.questions();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].display_content(), "Encrypted content");
        assert!(!h.session.is_loading());
    }

    #[tokio::test]
    async fn test_concurrent_mutation_dropped() {
        let h = started().await;

        let (first, second) = tokio::join!(
            h.session.post_question("first"),
            h.session.post_answer(1, "too soon"),
        );
        assert!(first.unwrap().is_confirmed());
        assert_eq!(second.unwrap(), MutationOutcome::Skipped);
        assert_eq!(h.network.ledger.transaction_count(), 1);
        assert!(!h.session.is_mutating());
    }

    #[tokio::test]
    async fn test_failed_mutation_releases_gate() {
        let h = started().await;

        let err = h.session.post_answer(9, "orphan").await.unwrap_err();
        assert!(matches!(err, ScholarError::TransactionFailed(_)));
        assert_eq!(h.session.last_error(), Some(err));
        assert!(!h.session.is_mutating());

        assert!(h.session.post_question("next").await.unwrap().is_confirmed());
        h.session.clear_error();
        assert_eq!(h.session.last_error(), None);
    }

    #[tokio::test]
    async fn test_answer_and_vote_refresh_answers() {
        let h = started().await;
        h.session.post_question("q").await.unwrap();
        h.session.post_answer(1, "a").await.unwrap();
        assert_eq!(h.session.answers(1).len(), 1);

        assert!(h.session.cast_vote(1, false, true).await.unwrap().is_confirmed());
        assert!(h.session.cast_vote(1, true, false).await.unwrap().is_confirmed());
        assert_eq!(h.network.ledger.votes_on(1, false).len(), 1);
        assert_eq!(h.network.ledger.votes_on(1, true).len(), 1);
        assert_eq!(h.network.ledger.transaction_count(), 4);
    }

    #[tokio::test]
    async fn test_abandoned_operation_clears_loading() {
        let h = harness_with(
            &ClientConfig::default(),
            Arc::new(StalledWallet(LocalWallet::generate())),
        );
        assert!(h.session.start().await.is_ready());
        h.session.post_question("hello").await.unwrap();

        let timed_out = tokio::time::timeout(Duration::from_millis(50), h.session.decrypt_question(1)).await;
        assert!(timed_out.is_err());
        assert!(!h.session.is_loading());
    }

    #[tokio::test]
    async fn test_mutation_before_start_is_not_ready() {
        let h = harness(&ClientConfig::default());
        let err = h.session.post_question("hello").await.unwrap_err();
        assert_eq!(err, ScholarError::EngineNotReady);
        assert_eq!(h.network.ledger.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_chain_reported_in_status() {
        let mut config = ClientConfig::default();
        config.chain_id = ChainId(1);
        config.deployments.insert(ChainId(1), Address([0x22; 20]));
        let h = harness(&config);

        let status = h.session.start().await;
        assert!(matches!(status, EngineStatus::Error { .. }));
        assert_eq!(h.session.last_error(), Some(ScholarError::UnsupportedNetwork(ChainId(1))));
    }

    #[test]
    fn test_missing_deployment_is_contract_unavailable() {
        let mut config = ClientConfig::default();
        config.chain_id = ChainId(11155111);
        let network = LocalNetwork::hardhat(&ClientConfig::default()).unwrap();
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let result = ScholarSession::new(
            &config,
            SessionParts {
                wallet: Arc::new(LocalWallet::generate()),
                ledger: network.ledger.clone(),
                provider: Arc::new(build_provider(&config, store.clone(), network.devnet.clone())),
                store,
            },
        );
        assert_eq!(
            result.err(),
            Some(ScholarError::ContractUnavailable(ChainId(11155111)))
        );
    }
}
