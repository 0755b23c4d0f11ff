//! Ambient small talk - host-tick-driven cooperative timer.
//!
//! Runs entirely on the host's tick callback; it never spawns a thread and
//! keeps a single "next fire time" as state. Independent of the relay
//! worker and its rate limits. Nothing is persisted; a restart re-arms the
//! timer from scratch.

use rand::RngExt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Unarmed marker for `next_fire_at`.
const UNARMED: i64 = 0;

/// Emits one unprompted line every 2-4 minutes (configurable) while at
/// least one participant is present.
pub struct AmbientScheduler {
    min_delay_ms: i64,
    max_delay_ms: i64,
    lines: Vec<String>,
    next_fire_at: AtomicI64,
}

impl AmbientScheduler {
    /// Build a scheduler over a combined line pool. Lines may carry a
    /// `{name}` placeholder filled with a random present participant.
    pub fn new(min_delay_ms: i64, max_delay_ms: i64, lines: Vec<String>) -> Self {
        Self {
            min_delay_ms,
            max_delay_ms,
            lines,
            next_fire_at: AtomicI64::new(UNARMED),
        }
    }

    /// Advance the timer. Returns a line to broadcast when it fires.
    ///
    /// With no participants the timer is pushed back instead of firing, so
    /// an empty room never accumulates a due message.
    pub fn tick(&self, now_ms: i64, participants: &[String]) -> Option<String> {
        if participants.is_empty() {
            self.arm(now_ms);
            return None;
        }

        let next = self.next_fire_at.load(Ordering::Acquire);
        if next == UNARMED {
            self.arm(now_ms);
            return None;
        }
        if now_ms < next {
            return None;
        }

        self.arm(now_ms);
        if self.lines.is_empty() {
            return None;
        }

        let mut rng = rand::rng();
        let line = &self.lines[rng.random_range(0..self.lines.len())];
        let name = &participants[rng.random_range(0..participants.len())];
        Some(line.replace("{name}", name))
    }

    fn arm(&self, now_ms: i64) {
        let delay = rand::rng().random_range(self.min_delay_ms..=self.max_delay_ms);
        self.next_fire_at.store(now_ms + delay, Ordering::Release);
    }
}
