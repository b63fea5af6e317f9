//! [`ConversationRepository`]: encrypt-on-write, decrypt-on-read persistence.

use std::sync::Arc;

use chrono::Utc;
use common::protocol::{Conversation, Feedback, Message, Sender};
use common::ServiceError;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use super::records::{ConversationRecord, MessageRecord};
use super::{DocumentStore, StoreError};
use crate::crypto::FieldCipher;

/// Title given to conversations created without one.
pub const DEFAULT_TITLE: &str = "New conversation";

/// Errors produced by the repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("conversation {0} not found")]
    ConversationNotFound(Uuid),

    #[error("message {0} not found")]
    MessageNotFound(Uuid),

    /// Input rejected before touching the store.
    #[error("{0}")]
    Invalid(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::ConversationNotFound(_) | RepositoryError::MessageNotFound(_) => {
                ServiceError::NotFound(err.to_string())
            }
            RepositoryError::Invalid(msg) => ServiceError::BadRequest(msg.to_owned()),
            RepositoryError::Store(StoreError::Unavailable(_)) => {
                ServiceError::Unavailable("document store unavailable".into())
            }
            RepositoryError::Store(StoreError::Poisoned) => {
                ServiceError::Internal("document store failure".into())
            }
        }
    }
}

/// Conversation and message persistence with field encryption at rest.
///
/// Cheap to clone: both the store and the cipher are shared behind `Arc`s.
#[derive(Clone)]
pub struct ConversationRepository {
    store: Arc<dyn DocumentStore>,
    cipher: Arc<FieldCipher>,
}

impl ConversationRepository {
    pub fn new(store: Arc<dyn DocumentStore>, cipher: Arc<FieldCipher>) -> Self {
        Self { store, cipher }
    }

    /// Whether stored fields are being encrypted.
    pub fn encryption_enabled(&self) -> bool {
        self.cipher.is_enabled()
    }

    /// Number of stored conversations.
    pub fn conversation_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.store.conversation_count()?)
    }

    /// All conversations, most recently active first.
    pub fn list_conversations(&self) -> Result<Vec<Conversation>, RepositoryError> {
        let mut records = self.store.conversations()?;
        sort_by_activity(&mut records);
        Ok(records.iter().map(|r| self.conversation_view(r)).collect())
    }

    /// Create a conversation. A missing or blank title gets [`DEFAULT_TITLE`].
    pub fn create_conversation(&self, title: Option<&str>) -> Result<Conversation, RepositoryError> {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE);
        let record = ConversationRecord::new(self.cipher.encrypt(title), Utc::now());
        self.store.save_conversation(record.clone())?;
        debug!(conversation_id = %record.id, "conversation created");
        Ok(self.conversation_view(&record))
    }

    /// One conversation with its messages, oldest message first.
    pub fn get_conversation(&self, id: Uuid) -> Result<(Conversation, Vec<Message>), RepositoryError> {
        let record = self.load_conversation(id)?;
        let mut messages = self.store.messages_for(id)?;
        messages.sort_by_key(|m| m.timestamp);
        let messages = messages.iter().map(|m| self.message_view(m)).collect();
        Ok((self.conversation_view(&record), messages))
    }

    /// Replace a conversation's title.
    pub fn update_title(&self, id: Uuid, title: &str) -> Result<Conversation, RepositoryError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(RepositoryError::Invalid("title must not be empty"));
        }
        let mut record = self.load_conversation(id)?;
        record.title = self.cipher.encrypt(title);
        record.updated_at = Utc::now();
        self.store.save_conversation(record.clone())?;
        Ok(self.conversation_view(&record))
    }

    /// Delete a conversation and all of its messages.
    pub fn delete_conversation(&self, id: Uuid) -> Result<(), RepositoryError> {
        if !self.store.remove_conversation(id)? {
            return Err(RepositoryError::ConversationNotFound(id));
        }
        debug!(conversation_id = %id, "conversation deleted");
        Ok(())
    }

    /// Append a message and bump the owning conversation's counters.
    pub fn add_message(
        &self,
        conversation_id: Uuid,
        content: &str,
        sender: Sender,
    ) -> Result<Message, RepositoryError> {
        if content.trim().is_empty() {
            return Err(RepositoryError::Invalid("message content must not be empty"));
        }
        let mut conversation = self.load_conversation(conversation_id)?;

        let now = Utc::now();
        let record = MessageRecord::new(
            conversation_id,
            self.cipher.encrypt(content),
            sender,
            now,
        );
        self.store.save_message(record.clone())?;

        conversation.message_count += 1;
        conversation.last_message_at = now;
        conversation.updated_at = now;
        if let Err(e) = self.store.save_conversation(conversation) {
            error!(conversation_id = %conversation_id, error = %e, "message saved but conversation counters not updated");
            return Err(e.into());
        }

        Ok(self.message_view(&record))
    }

    /// Set or clear the feedback on a message. The stored content is untouched.
    pub fn update_feedback(
        &self,
        message_id: Uuid,
        feedback: Option<Feedback>,
    ) -> Result<Message, RepositoryError> {
        let mut record = self
            .store
            .message(message_id)?
            .ok_or(RepositoryError::MessageNotFound(message_id))?;
        record.feedback = feedback;
        record.updated_at = Utc::now();
        self.store.save_message(record.clone())?;
        Ok(self.message_view(&record))
    }

    /// Conversations whose title or any message contains `query`,
    /// case-insensitively, most recently active first.
    ///
    /// Stored fields are encrypted, so matching happens after decryption.
    pub fn search(&self, query: &str) -> Result<Vec<Conversation>, RepositoryError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(RepositoryError::Invalid("search query must not be empty"));
        }

        let mut records = self.store.conversations()?;
        sort_by_activity(&mut records);

        let mut hits = Vec::new();
        for record in &records {
            let view = self.conversation_view(record);
            if view.title.to_lowercase().contains(&needle) || self.thread_contains(record.id, &needle)? {
                hits.push(view);
            }
        }
        Ok(hits)
    }

    /// Encrypt stored titles and message bodies that are still plaintext,
    /// such as rows written before a key was configured. Values that already
    /// look like envelopes are left alone. Returns how many fields changed.
    pub fn seal_legacy_records(&self) -> Result<usize, RepositoryError> {
        if !self.cipher.is_enabled() {
            return Ok(0);
        }

        let mut sealed = 0;
        for mut conversation in self.store.conversations()? {
            let title = self.cipher.encrypt_unless_sealed(&conversation.title);
            if title != conversation.title {
                conversation.title = title;
                sealed += 1;
                self.store.save_conversation(conversation.clone())?;
            }

            for mut message in self.store.messages_for(conversation.id)? {
                let content = self.cipher.encrypt_unless_sealed(&message.content);
                if content != message.content {
                    message.content = content;
                    sealed += 1;
                    self.store.save_message(message)?;
                }
            }
        }
        Ok(sealed)
    }

    fn thread_contains(&self, conversation_id: Uuid, needle: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .store
            .messages_for(conversation_id)?
            .iter()
            .any(|m| self.cipher.decrypt(&m.content).to_lowercase().contains(needle)))
    }

    fn load_conversation(&self, id: Uuid) -> Result<ConversationRecord, RepositoryError> {
        self.store
            .conversation(id)?
            .ok_or(RepositoryError::ConversationNotFound(id))
    }

    fn conversation_view(&self, record: &ConversationRecord) -> Conversation {
        Conversation {
            id: record.id,
            title: self.cipher.decrypt(&record.title),
            user_id: record.user_id.clone(),
            message_count: record.message_count,
            last_message_at: record.last_message_at,
            metadata: record.metadata.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    fn message_view(&self, record: &MessageRecord) -> Message {
        Message {
            id: record.id,
            conversation_id: record.conversation_id,
            content: self.cipher.decrypt(&record.content),
            sender: record.sender,
            timestamp: record.timestamp,
            feedback: record.feedback,
            metadata: record.metadata.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

fn sort_by_activity(records: &mut [ConversationRecord]) {
    records.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
}
