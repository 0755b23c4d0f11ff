//! Account linking - one-time codes and the identity link table.
//!
//! A player asks for a code in game, presents it on the external platform,
//! and the platform-side handler redeems it with the external account id.
//! Codes expire after five minutes; expiry is checked when a code is
//! redeemed, with a periodic sweep clearing abandoned entries. A code is
//! good for exactly one redemption.

use parking_lot::{Mutex, RwLock};
use rand::RngExt;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use hearth_storage::LinkStore;

/// How long a generated code stays redeemable.
pub const CODE_TTL_MS: i64 = 5 * 60 * 1000;

/// Outcome of a "request code" command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCodeOutcome {
    /// The identity already has a linked account; no code was minted.
    AlreadyLinked(i64),
    /// A fresh code, valid for [`CODE_TTL_MS`].
    Pending(String),
}

#[derive(Debug, Clone, Copy)]
struct PendingCode {
    identity: Uuid,
    expires_at: i64,
}

/// Issues and redeems one-time linking codes, and owns the in-memory link
/// table. Safe to call from the host thread and a platform listener thread
/// concurrently; a given code redeems for at most one caller.
pub struct CodeRegistry {
    store: LinkStore,
    links: RwLock<HashMap<Uuid, i64>>,
    pending: Mutex<HashMap<String, PendingCode>>,
}

impl CodeRegistry {
    /// Create a registry, loading previously persisted links.
    pub fn new(store: LinkStore) -> Self {
        let links = store.load();
        Self {
            store,
            links: RwLock::new(links),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a 6-digit code for an identity, valid for five minutes.
    pub fn generate_code(&self, identity: Uuid) -> String {
        self.generate_code_at(identity, now_ms())
    }

    pub(crate) fn generate_code_at(&self, identity: Uuid, now_ms: i64) -> String {
        let code = rand::rng().random_range(100_000..=999_999).to_string();
        self.pending.lock().insert(
            code.clone(),
            PendingCode {
                identity,
                expires_at: now_ms + CODE_TTL_MS,
            },
        );
        debug!(%identity, "Issued linking code");
        code
    }

    /// Redeem a code, linking its identity to an external account.
    ///
    /// Returns `false` for an unknown, already-consumed, or expired code;
    /// that is a normal negative result, not an error. On success the link
    /// is committed (latest write wins) and persisted.
    pub fn redeem(&self, code: &str, external_id: i64) -> bool {
        self.redeem_at(code, external_id, now_ms())
    }

    pub(crate) fn redeem_at(&self, code: &str, external_id: i64, now_ms: i64) -> bool {
        // Removing under the lock makes redemption exactly-once: of any
        // concurrent callers, one gets the entry and the rest get nothing.
        let pending = self.pending.lock().remove(code);
        let Some(pending) = pending else {
            return false;
        };
        if pending.expires_at <= now_ms {
            // Consumed by expiry; the entry stays gone.
            return false;
        }

        let snapshot = {
            let mut links = self.links.write();
            links.insert(pending.identity, external_id);
            links.clone()
        };
        self.store.save(&snapshot);
        info!(identity = %pending.identity, external_id, "Linked external account");
        true
    }

    /// The external account linked to an identity, if any.
    pub fn linked(&self, identity: Uuid) -> Option<i64> {
        self.links.read().get(&identity).copied()
    }

    /// Remove an identity's link. Returns whether one existed.
    pub fn unlink(&self, identity: Uuid) -> bool {
        let snapshot = {
            let mut links = self.links.write();
            if links.remove(&identity).is_none() {
                return false;
            }
            links.clone()
        };
        self.store.save(&snapshot);
        info!(%identity, "Removed account link");
        true
    }

    /// Handle a "request code" command: report an existing link or mint a
    /// fresh code.
    pub fn request_code(&self, identity: Uuid) -> LinkCodeOutcome {
        match self.linked(identity) {
            Some(external_id) => LinkCodeOutcome::AlreadyLinked(external_id),
            None => LinkCodeOutcome::Pending(self.generate_code(identity)),
        }
    }

    /// Drop pending codes that expired before `now_ms`. Returns how many
    /// were removed.
    pub fn purge_expired(&self, now_ms: i64) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, entry| entry.expires_at > now_ms);
        before - pending.len()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
