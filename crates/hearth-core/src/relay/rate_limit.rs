//! Per-identity response windows.
//!
//! Two ephemeral maps govern whether an incoming message is eligible for an
//! answer: when the player last got one, and until when a join greeting
//! keeps them "warm". Neither survives a restart; last write wins.

use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// In-memory rate-limit state, shared between the host thread and the
/// relay worker.
#[derive(Debug, Default)]
pub struct ResponseWindows {
    last_answer_at: RwLock<HashMap<Uuid, i64>>,
    greeted_until: RwLock<HashMap<Uuid, i64>>,
}

impl ResponseWindows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that an identity just received an answer.
    pub fn mark_answered(&self, identity: Uuid, now_ms: i64) {
        self.last_answer_at.write().insert(identity, now_ms);
    }

    /// Whether the identity's last answer is within `cooldown_ms` of now.
    pub fn within_cooldown(&self, identity: Uuid, now_ms: i64, cooldown_ms: i64) -> bool {
        self.last_answer_at
            .read()
            .get(&identity)
            .is_some_and(|last| now_ms - last < cooldown_ms)
    }

    /// Whether the identity got an answer within the follow-up window, i.e.
    /// an active dialogue is going on.
    pub fn in_followup_window(&self, identity: Uuid, now_ms: i64, window_ms: i64) -> bool {
        self.within_cooldown(identity, now_ms, window_ms)
    }

    /// Keep the identity greeting-eligible until the given instant.
    pub fn mark_greeted(&self, identity: Uuid, until_ms: i64) {
        self.greeted_until.write().insert(identity, until_ms);
    }

    /// Drop any pending greeting state for the identity.
    pub fn clear_greeted(&self, identity: Uuid) {
        self.greeted_until.write().remove(&identity);
    }

    /// Whether the identity was greeted and the window is still open.
    pub fn recently_greeted(&self, identity: Uuid, now_ms: i64) -> bool {
        self.greeted_until
            .read()
            .get(&identity)
            .is_some_and(|until| *until > now_ms)
    }
}
