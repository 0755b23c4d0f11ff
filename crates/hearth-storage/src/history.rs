//! Conversation history storage - one JSON array per identity.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;
use uuid::Uuid;

/// Role of a stored conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One persisted conversation message.
///
/// Immutable once created; history files are ordered oldest-first and the
/// memory layer bounds their length before saving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: MessageRole,
    pub content: String,
    /// Creation time, milliseconds since epoch.
    pub timestamp: i64,
}

impl StoredMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a user message stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message stamped with the current time.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Durable store for per-identity conversation histories.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    /// Create a store rooted at the given contexts directory.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Load the history for an identity.
    ///
    /// An absent file or any read/parse error yields an empty sequence; the
    /// error case is logged.
    pub fn load(&self, identity: Uuid) -> Vec<StoredMessage> {
        let path = self.file_for(identity);
        if !path.exists() {
            return Vec::new();
        }
        match self.try_load(identity) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(%identity, "Failed to load conversation history: {e:#}");
                Vec::new()
            }
        }
    }

    /// Write the history for an identity.
    ///
    /// The caller hands in an already-bounded sequence; this layer only
    /// persists it. Failures are logged, never propagated.
    pub fn save(&self, identity: Uuid, messages: &[StoredMessage]) {
        if let Err(e) = self.try_save(identity, messages) {
            warn!(%identity, "Failed to save conversation history: {e:#}");
        }
    }

    fn file_for(&self, identity: Uuid) -> PathBuf {
        self.dir.join(format!("{identity}.json"))
    }

    fn try_load(&self, identity: Uuid) -> Result<Vec<StoredMessage>> {
        let path = self.file_for(identity);
        let raw =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let messages: Vec<StoredMessage> =
            serde_json::from_str(&raw).context("history is not a JSON message array")?;
        Ok(messages)
    }

    fn try_save(&self, identity: Uuid, messages: &[StoredMessage]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;

        let json = serde_json::to_string_pretty(messages)?;
        let path = self.file_for(identity);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }
}
