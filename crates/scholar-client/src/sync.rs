//! Client-side view of on-chain records.
//!
//! Refreshes read plain fields only and leave content as a placeholder.
//! Decryption happens one record at a time, on request, and the revealed
//! digest is kept in a session cache keyed by record id. The index is
//! copy-on-write: readers get an `Arc` snapshot that never changes under
//! them, writers build a new index and swap it in.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use scholar_fhe::{CryptoEngineProvider, RevealRequest};
use scholar_shared::digest::content_digest;
use scholar_shared::{Address, EncryptedType, Handle};

use crate::authorization::DecryptionAuthorization;
use crate::error::{Result, ScholarError};
use crate::ledger::{Ledger, LedgerError};
use crate::records::{ContentRecord, DecryptedContent};
use crate::wallet::WalletSigner;

/// An immutable snapshot of everything the session knows about records.
#[derive(Debug, Clone, Default)]
pub struct RecordIndex {
    recent_questions: Vec<u64>,
    questions: BTreeMap<u64, ContentRecord>,
    answers_by_question: HashMap<u64, Vec<u64>>,
    answers: BTreeMap<u64, ContentRecord>,
    decrypted_questions: HashMap<u64, DecryptedContent>,
    decrypted_answers: HashMap<u64, DecryptedContent>,
}

impl RecordIndex {
    /// Recent questions in ledger order, decrypted content overlaid.
    pub fn questions(&self) -> Vec<ContentRecord> {
        self.recent_questions
            .iter()
            .filter_map(|id| self.question(*id))
            .collect()
    }

    pub fn question(&self, id: u64) -> Option<ContentRecord> {
        self.questions
            .get(&id)
            .cloned()
            .map(|r| r.with_content(self.decrypted_questions.get(&id)))
    }

    pub fn answers(&self, question_id: u64) -> Vec<ContentRecord> {
        self.answers_by_question
            .get(&question_id)
            .map(|ids| ids.iter().filter_map(|id| self.answer(*id)).collect())
            .unwrap_or_default()
    }

    pub fn answer(&self, id: u64) -> Option<ContentRecord> {
        self.answers
            .get(&id)
            .cloned()
            .map(|r| r.with_content(self.decrypted_answers.get(&id)))
    }

    pub fn decrypted_question(&self, id: u64) -> Option<&DecryptedContent> {
        self.decrypted_questions.get(&id)
    }

    pub fn decrypted_answer(&self, id: u64) -> Option<&DecryptedContent> {
        self.decrypted_answers.get(&id)
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Question(u64),
    Answer(u64),
}

pub struct RecordSynchronizer {
    ledger: Arc<dyn Ledger>,
    contract: Address,
    provider: Arc<CryptoEngineProvider>,
    authorization: Arc<DecryptionAuthorization>,
    wallet: Arc<dyn WalletSigner>,
    index: RwLock<Arc<RecordIndex>>,
    // digest -> text for content this session submitted
    digest_book: RwLock<HashMap<u128, String>>,
    decrypt_lock: Mutex<()>,
    // refreshes apply in the order they read the ledger
    refresh_lock: Mutex<()>,
}

impl RecordSynchronizer {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        contract: Address,
        provider: Arc<CryptoEngineProvider>,
        authorization: Arc<DecryptionAuthorization>,
        wallet: Arc<dyn WalletSigner>,
    ) -> Self {
        Self {
            ledger,
            contract,
            provider,
            authorization,
            wallet,
            index: RwLock::new(Arc::new(RecordIndex::default())),
            digest_book: RwLock::new(HashMap::new()),
            decrypt_lock: Mutex::new(()),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<RecordIndex> {
        match self.index.read() {
            Ok(index) => index.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn questions(&self) -> Vec<ContentRecord> {
        self.snapshot().questions()
    }

    pub fn answers(&self, question_id: u64) -> Vec<ContentRecord> {
        self.snapshot().answers(question_id)
    }

    /// Remember the text behind content this session is about to submit.
    pub fn remember_text(&self, text: &str) {
        let digest = content_digest(text, EncryptedType::Uint128.bit_width());
        if let Ok(mut book) = self.digest_book.write() {
            book.insert(digest, text.to_string());
        }
    }

    fn known_text(&self, digest: u128) -> Option<String> {
        self.digest_book.read().ok()?.get(&digest).cloned()
    }

    fn update(&self, apply: impl FnOnce(&mut RecordIndex)) {
        let mut guard = match self.index.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = RecordIndex::clone(&guard);
        apply(&mut next);
        *guard = Arc::new(next);
    }

    // ── Refresh ──────────────────────────────────────────────

    /// Reload the `limit` most recent questions. Content stays encrypted.
    ///
    /// Refreshes run one at a time, so a slow refresh that read the ledger
    /// earlier can never replace the list written by a later one.
    pub async fn refresh_questions(&self, limit: u64) -> Result<Vec<ContentRecord>> {
        let _serial = self.refresh_lock.lock().await;
        let counter = self.ledger.question_counter(self.contract).await?;
        let ids = if counter == 0 {
            Vec::new()
        } else {
            self.ledger.recent_questions(self.contract, limit).await?
        };

        let mut records = Vec::with_capacity(ids.len());
        for id in &ids {
            let record = self.ledger.question(self.contract, *id).await?;
            records.push(ContentRecord::from_question(&record));
        }

        debug!(count = records.len(), counter, "Refreshed questions");
        self.update(|index| {
            index.recent_questions = ids;
            for record in records {
                index.questions.insert(record.id, record);
            }
        });
        Ok(self.questions())
    }

    pub async fn refresh_answers(&self, question_id: u64) -> Result<Vec<ContentRecord>> {
        let _serial = self.refresh_lock.lock().await;
        let ids = self.ledger.question_answers(self.contract, question_id).await?;

        let mut records = Vec::with_capacity(ids.len());
        for id in &ids {
            let record = self.ledger.answer(self.contract, *id).await?;
            records.push(ContentRecord::from_answer(&record));
        }

        debug!(question_id, count = records.len(), "Refreshed answers");
        self.update(|index| {
            index.answers_by_question.insert(question_id, ids);
            for record in records {
                index.answers.insert(record.id, record);
            }
        });
        Ok(self.answers(question_id))
    }

    /// Question ids posted by the session's wallet.
    pub async fn my_questions(&self) -> Result<Vec<u64>> {
        Ok(self
            .ledger
            .user_questions(self.contract, self.wallet.address())
            .await?)
    }

    pub async fn my_answers(&self) -> Result<Vec<u64>> {
        Ok(self
            .ledger
            .user_answers(self.contract, self.wallet.address())
            .await?)
    }

    // ── Decrypt ──────────────────────────────────────────────

    /// Reveal a question's content. `None` if the question does not exist.
    /// On success the question's answers are refreshed.
    pub async fn decrypt_question(&self, id: u64) -> Result<Option<ContentRecord>> {
        let record = self.decrypt(Target::Question(id)).await?;
        if record.is_some() {
            if let Err(e) = self.refresh_answers(id).await {
                warn!(question_id = id, error = %e, "Answer refresh after decrypt failed");
            }
        }
        Ok(record)
    }

    /// Reveal an answer's content. `None` if the answer does not exist.
    pub async fn decrypt_answer(&self, id: u64) -> Result<Option<ContentRecord>> {
        self.decrypt(Target::Answer(id)).await
    }

    async fn decrypt(&self, target: Target) -> Result<Option<ContentRecord>> {
        // serialized so two requests for one id reveal at most once
        let _serial = self.decrypt_lock.lock().await;

        let snapshot = self.snapshot();
        let cached = match target {
            Target::Question(id) => snapshot.decrypted_question(id).and(snapshot.question(id)),
            Target::Answer(id) => snapshot.decrypted_answer(id).and(snapshot.answer(id)),
        };
        if let Some(record) = cached {
            debug!(?target, "Decrypt served from cache");
            return Ok(Some(record));
        }

        let record = match self.fetch(target).await {
            Ok(record) => record,
            Err(LedgerError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let digest = self.reveal(&record.content_handle).await?;
        let decrypted = DecryptedContent {
            digest,
            text: self.known_text(digest),
        };
        info!(?target, "Decrypted content");

        self.update(|index| match target {
            Target::Question(id) => {
                index.questions.insert(id, record.clone());
                index.decrypted_questions.insert(id, decrypted.clone());
            }
            Target::Answer(id) => {
                index.answers.insert(id, record.clone());
                index.decrypted_answers.insert(id, decrypted.clone());
            }
        });
        Ok(Some(record.with_content(Some(&decrypted))))
    }

    async fn fetch(&self, target: Target) -> std::result::Result<ContentRecord, LedgerError> {
        match target {
            Target::Question(id) => self
                .ledger
                .question(self.contract, id)
                .await
                .map(|r| ContentRecord::from_question(&r)),
            Target::Answer(id) => self
                .ledger
                .answer(self.contract, id)
                .await
                .map(|r| ContentRecord::from_answer(&r)),
        }
    }

    async fn reveal(&self, handle: &Handle) -> Result<u128> {
        let config = self.provider.ready()?;
        let grant = self
            .authorization
            .get_or_create_grant(self.wallet.as_ref(), &config.public_key, handle)
            .await?;

        let value = config
            .engine
            .reveal(RevealRequest {
                handle,
                contract: self.contract,
                user: self.wallet.address(),
                grant: &grant,
            })
            .await?;

        value.as_u128().ok_or_else(|| {
            ScholarError::DecryptionFailed(format!(
                "expected a numeric digest, got {}",
                value.encrypted_type()
            ))
        })
    }
}
