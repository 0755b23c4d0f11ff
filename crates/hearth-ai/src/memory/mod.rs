//! Conversation memory - bounded per-identity message log
//!
//! Owns the trimming policy (keep the most recent `limit` entries, oldest
//! dropped first) and delegates persistence to [`HistoryStore`]. Saving an
//! already-trimmed sequence with the same limit changes nothing.

use uuid::Uuid;

use hearth_storage::{HistoryStore, MessageRole, StoredMessage};

use crate::llm::{Message, Role};

impl From<MessageRole> for Role {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::System => Role::System,
            MessageRole::User => Role::User,
            MessageRole::Assistant => Role::Assistant,
        }
    }
}

impl From<&StoredMessage> for Message {
    fn from(stored: &StoredMessage) -> Self {
        Self {
            role: stored.role.into(),
            content: stored.content.clone(),
        }
    }
}

/// Bounded, ordered, per-identity conversation log.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    store: HistoryStore,
}

impl ConversationMemory {
    pub fn new(store: HistoryStore) -> Self {
        Self { store }
    }

    /// Load an identity's history, oldest first. Empty when absent.
    pub fn load(&self, identity: Uuid) -> Vec<StoredMessage> {
        self.store.load(identity)
    }

    /// Persist an identity's history, keeping only the last `limit` entries.
    pub fn save(&self, identity: Uuid, messages: &[StoredMessage], limit: usize) {
        self.store.save(identity, tail(messages, limit));
    }
}

/// The most recent `limit` entries of a message sequence.
pub fn tail(messages: &[StoredMessage], limit: usize) -> &[StoredMessage] {
    if messages.len() <= limit {
        messages
    } else {
        &messages[messages.len() - limit..]
    }
}
