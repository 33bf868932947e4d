use serde::Serialize;

use scholar_shared::Handle;

use crate::ledger::{AnswerRecord, QuestionRecord};

/// Shown for content that has not been decrypted in this session.
pub const ENCRYPTED_PLACEHOLDER: &str = "Encrypted content";

/// Authors are never decrypted for display.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentKind {
    Question,
    Answer { question_id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecryptedContent {
    /// The revealed content digest.
    pub digest: u128,
    /// Original text, when this session submitted the content itself.
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ContentState {
    Encrypted,
    Decrypted(DecryptedContent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentRecord {
    pub id: u64,
    pub kind: ContentKind,
    pub content_handle: Handle,
    pub author_handle: Handle,
    pub timestamp: u64,
    pub content: ContentState,
}

impl ContentRecord {
    pub fn from_question(record: &QuestionRecord) -> Self {
        Self {
            id: record.id,
            kind: ContentKind::Question,
            content_handle: record.content,
            author_handle: record.asker,
            timestamp: record.timestamp,
            content: ContentState::Encrypted,
        }
    }

    pub fn from_answer(record: &AnswerRecord) -> Self {
        Self {
            id: record.id,
            kind: ContentKind::Answer {
                question_id: record.question_id,
            },
            content_handle: record.content,
            author_handle: record.answerer,
            timestamp: record.timestamp,
            content: ContentState::Encrypted,
        }
    }

    pub fn with_content(mut self, content: Option<&DecryptedContent>) -> Self {
        if let Some(decrypted) = content {
            self.content = ContentState::Decrypted(decrypted.clone());
        }
        self
    }

    pub fn is_decrypted(&self) -> bool {
        matches!(self.content, ContentState::Decrypted(_))
    }

    pub fn display_content(&self) -> String {
        match &self.content {
            ContentState::Encrypted => ENCRYPTED_PLACEHOLDER.to_string(),
            ContentState::Decrypted(DecryptedContent { text: Some(text), .. }) => text.clone(),
            ContentState::Decrypted(DecryptedContent { digest, .. }) => format!("digest 0x{digest:032x}"),
        }
    }

    pub fn display_author(&self) -> &'static str {
        ANONYMOUS_AUTHOR
    }
}
