//! Stored document shapes.
//!
//! `title` and `content` hold whatever is persisted: an envelope when a key is
//! configured, or plaintext (passthrough mode, or rows written before
//! encryption was enabled).

use chrono::{DateTime, Utc};
use common::protocol::{Feedback, Sender};
use uuid::Uuid;

/// A conversation as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRecord {
    pub id: Uuid,
    pub title: String,
    pub user_id: Option<String>,
    pub message_count: u64,
    pub last_message_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    /// A new, empty conversation whose stored title is `title`.
    pub fn new(title: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            user_id: None,
            message_count: 0,
            last_message_at: now,
            metadata: empty_metadata(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A message as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub feedback: Option<Feedback>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageRecord {
    /// A new message in `conversation_id` whose stored content is `content`.
    pub fn new(conversation_id: Uuid, content: String, sender: Sender, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            content,
            sender,
            timestamp: now,
            feedback: None,
            metadata: empty_metadata(),
            created_at: now,
            updated_at: now,
        }
    }
}

fn empty_metadata() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}
