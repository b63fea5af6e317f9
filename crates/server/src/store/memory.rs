//! [`MemoryStore`]: process-local [`DocumentStore`] implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use super::records::{ConversationRecord, MessageRecord};
use super::{DocumentStore, StoreError};

#[derive(Debug, Default)]
struct Collections {
    conversations: HashMap<Uuid, ConversationRecord>,
    messages: HashMap<Uuid, MessageRecord>,
    /// Message ids per conversation, in insertion order.
    threads: HashMap<Uuid, Vec<Uuid>>,
}

/// Thread-safe in-memory document store.
///
/// Wraps an `Arc<RwLock<_>>`; locks are held only for the duration of one map
/// operation. Records are stored exactly as the repository hands them over,
/// so encrypted fields stay encrypted here.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    /// Create a new, empty [`MemoryStore`].
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Collections>, StoreError> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Collections>, StoreError> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl DocumentStore for MemoryStore {
    fn save_conversation(&self, record: ConversationRecord) -> Result<(), StoreError> {
        self.write()?.conversations.insert(record.id, record);
        Ok(())
    }

    fn conversation(&self, id: Uuid) -> Result<Option<ConversationRecord>, StoreError> {
        Ok(self.read()?.conversations.get(&id).cloned())
    }

    fn conversations(&self) -> Result<Vec<ConversationRecord>, StoreError> {
        Ok(self.read()?.conversations.values().cloned().collect())
    }

    fn conversation_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.conversations.len())
    }

    fn remove_conversation(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut guard = self.write()?;
        let existed = guard.conversations.remove(&id).is_some();
        if let Some(thread) = guard.threads.remove(&id) {
            for message_id in thread {
                guard.messages.remove(&message_id);
            }
        }
        Ok(existed)
    }

    fn save_message(&self, record: MessageRecord) -> Result<(), StoreError> {
        let mut guard = self.write()?;
        if !guard.messages.contains_key(&record.id) {
            guard
                .threads
                .entry(record.conversation_id)
                .or_default()
                .push(record.id);
        }
        guard.messages.insert(record.id, record);
        Ok(())
    }

    fn message(&self, id: Uuid) -> Result<Option<MessageRecord>, StoreError> {
        Ok(self.read()?.messages.get(&id).cloned())
    }

    fn messages_for(&self, conversation_id: Uuid) -> Result<Vec<MessageRecord>, StoreError> {
        let guard = self.read()?;
        let messages: Vec<MessageRecord> = guard
            .threads
            .get(&conversation_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| guard.messages.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(messages)
    }
}
