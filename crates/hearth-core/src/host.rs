//! Host contract - event surface plumbing.
//!
//! The host is a single-threaded game loop delivering discrete events. It
//! owns the only legal path for chat output: `ChatSink::broadcast_message`,
//! which must be invoked from the host's own execution context. Background
//! work therefore parks its output in [`OutboundQueue`] and the host drains
//! it on tick.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Chat output callback implemented by the host. Fire-and-forget; called
/// only from host-context methods.
pub trait ChatSink: Send + Sync {
    fn broadcast_message(&self, text: &str);
}

/// Present participants, keyed by identity.
#[derive(Debug, Default)]
pub(crate) struct Roster {
    players: RwLock<HashMap<Uuid, String>>,
}

impl Roster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn join(&self, identity: Uuid, display_name: &str) {
        self.players
            .write()
            .insert(identity, display_name.to_string());
    }

    pub(crate) fn leave(&self, identity: Uuid) {
        self.players.write().remove(&identity);
    }

    /// Snapshot of present display names.
    pub(crate) fn names(&self) -> Vec<String> {
        self.players.read().values().cloned().collect()
    }
}

/// Replies produced off the host thread, waiting for the next tick.
pub(crate) struct OutboundQueue {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl OutboundQueue {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Sender handle for the relay worker.
    pub(crate) fn sender(&self) -> mpsc::UnboundedSender<String> {
        self.tx.clone()
    }

    /// Deliver everything queued so far. Called on the host thread only.
    pub(crate) fn drain(&self, mut deliver: impl FnMut(&str)) {
        let mut rx = self.rx.lock();
        while let Ok(text) = rx.try_recv() {
            debug!("Delivering queued chat line");
            deliver(&text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_tracks_joins_and_leaves() {
        let roster = Roster::new();
        let steve = Uuid::new_v4();
        let alex = Uuid::new_v4();

        roster.join(steve, "Steve");
        roster.join(alex, "Alex");
        assert_eq!(roster.names().len(), 2);

        roster.leave(steve);
        assert_eq!(roster.names(), vec!["Alex".to_string()]);
    }

    #[test]
    fn test_outbound_queue_drains_in_order() {
        let queue = OutboundQueue::new();
        queue.sender().send("one".into()).unwrap();
        queue.sender().send("two".into()).unwrap();

        let mut seen = Vec::new();
        queue.drain(|text| seen.push(text.to_string()));
        assert_eq!(seen, vec!["one", "two"]);

        queue.drain(|_| panic!("queue should be empty"));
    }
}
