//! Conversation persistence.
//!
//! # Layers
//!
//! - [`DocumentStore`]: raw record storage. Knows nothing about encryption;
//!   it stores and returns `title` / `content` exactly as given.
//! - [`ConversationRepository`]: the only caller of [`crate::crypto`]. It
//!   encrypts a field at the moment the field is set and decrypts every field
//!   it reads, including in bulk list and search paths.
//!
//! [`MemoryStore`] is the bundled store. A database-backed store plugs in by
//! implementing [`DocumentStore`].

pub mod memory;
pub mod records;
pub mod repository;

pub use memory::MemoryStore;
pub use records::{ConversationRecord, MessageRecord};
pub use repository::{ConversationRepository, RepositoryError, DEFAULT_TITLE};

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by a [`DocumentStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A writer panicked while holding the store lock.
    #[error("document store lock poisoned")]
    Poisoned,

    /// The backing store could not be reached.
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

/// Record-level storage for conversations and their messages.
#[cfg_attr(test, mockall::automock)]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace a conversation.
    fn save_conversation(&self, record: ConversationRecord) -> Result<(), StoreError>;

    /// Look up one conversation.
    fn conversation(&self, id: Uuid) -> Result<Option<ConversationRecord>, StoreError>;

    /// All conversations, in no particular order.
    fn conversations(&self) -> Result<Vec<ConversationRecord>, StoreError>;

    /// Number of stored conversations.
    fn conversation_count(&self) -> Result<usize, StoreError>;

    /// Delete a conversation and all of its messages. Returns `false` if it
    /// did not exist.
    fn remove_conversation(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Insert or replace a message.
    fn save_message(&self, record: MessageRecord) -> Result<(), StoreError>;

    /// Look up one message.
    fn message(&self, id: Uuid) -> Result<Option<MessageRecord>, StoreError>;

    /// Messages of one conversation, in insertion order.
    fn messages_for(&self, conversation_id: Uuid) -> Result<Vec<MessageRecord>, StoreError>;
}
