//! Single-worker relay for outbound chat-completion calls.
//!
//! The host's event thread only filters and enqueues; one dedicated worker
//! task performs the network calls sequentially, so at most one request is
//! in flight per installation and histories never interleave. Replies are
//! handed back through the outbound queue and delivered on the host's own
//! tick, never from the worker.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use hearth_ai::memory::tail;
use hearth_ai::{CompletionRequest, ConversationMemory, LlmClient, Message};
use hearth_storage::StoredMessage;

use super::classifier::MessageClassifier;
use super::now_ms;
use super::rate_limit::ResponseWindows;
use crate::config::ChatConfig;

/// One queued chat exchange.
struct RelayJob {
    identity: Uuid,
    display_name: String,
    text: String,
}

/// Decouples the host's event thread from chat-completion network calls.
pub struct ChatRelay {
    config: Arc<ChatConfig>,
    classifier: Arc<dyn MessageClassifier>,
    windows: Arc<ResponseWindows>,
    /// Taken on shutdown so no new jobs are accepted.
    tx: Mutex<Option<mpsc::Sender<RelayJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ChatRelay {
    /// Spawn the worker task and return the relay handle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        config: Arc<ChatConfig>,
        client: Arc<dyn LlmClient>,
        memory: ConversationMemory,
        windows: Arc<ResponseWindows>,
        classifier: Arc<dyn MessageClassifier>,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Self {
        // Bounded queue: when the worker falls behind, new messages are
        // rejected at the door rather than piling up without limit.
        let (tx, mut rx) = mpsc::channel(config.queue_capacity);

        let worker_config = config.clone();
        let worker_windows = windows.clone();
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                process(
                    &worker_config,
                    client.as_ref(),
                    &memory,
                    &worker_windows,
                    &outbound,
                    job,
                )
                .await;
            }
            debug!("Chat relay worker stopped");
        });

        Self {
            config,
            classifier,
            windows,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Host-thread entry point: filter, rate-limit and enqueue one message.
    ///
    /// Never blocks. Ineligible, rate-limited or overflowing messages are
    /// dropped without further action.
    pub fn offer(&self, identity: Uuid, display_name: &str, text: &str) {
        self.offer_at(identity, display_name, text, now_ms());
    }

    pub(crate) fn offer_at(&self, identity: Uuid, display_name: &str, text: &str, now_ms: i64) {
        let text = text.trim();
        if text.is_empty() || text.starts_with(self.config.command_prefix.as_str()) {
            return;
        }

        let signals = self.classifier.classify(text);
        let recently_greeted = self.windows.recently_greeted(identity, now_ms);
        let in_followup =
            self.windows
                .in_followup_window(identity, now_ms, self.config.followup_window_ms);

        let eligible = signals.mentions_companion
            || signals.looks_like_question
            || (recently_greeted && signals.looks_like_greeting)
            || in_followup;
        if !eligible {
            return;
        }

        if self
            .windows
            .within_cooldown(identity, now_ms, self.config.cooldown_ms)
        {
            return;
        }

        let job = RelayJob {
            identity,
            display_name: display_name.to_string(),
            text: text.to_string(),
        };
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return; // shutting down
        };
        if let Err(e) = tx.try_send(job) {
            debug!(%identity, "Relay queue rejected message: {e}");
        }
    }

    /// Stop accepting new jobs, then give the worker a bounded grace period
    /// to finish what it already holds. Anything not done by then is
    /// dropped.
    pub async fn shutdown(&self, grace: Duration) {
        drop(self.tx.lock().take());

        let handle = self.worker.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                warn!("Relay worker did not drain in time, aborting");
                handle.abort();
            }
        }
    }
}

/// Run one job to completion on the worker task.
async fn process(
    config: &ChatConfig,
    client: &dyn LlmClient,
    memory: &ConversationMemory,
    windows: &ResponseWindows,
    outbound: &mpsc::UnboundedSender<String>,
    job: RelayJob,
) {
    let history = memory.load(job.identity);
    let recent = tail(&history, config.history_messages);

    let mut prompt = Vec::with_capacity(recent.len() + 2);
    prompt.push(Message::system(&config.system_prompt));
    prompt.extend(recent.iter().map(Message::from));
    let user_line = format!("{}: {}", job.display_name, job.text);
    prompt.push(Message::user(&user_line));

    let request = CompletionRequest::new(prompt)
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_new_tokens);

    // The deadline is enforced here as well as in the client; a hung call
    // would block every queued message behind it.
    let call = client.complete(request);
    let outcome = tokio::time::timeout(Duration::from_millis(config.request_timeout_ms), call).await;

    let answer = match outcome {
        Ok(Ok(response)) => response.content,
        Ok(Err(e)) => {
            warn!(identity = %job.identity, "Chat completion failed: {e}");
            return;
        }
        Err(_) => {
            warn!(
                identity = %job.identity,
                timeout_ms = config.request_timeout_ms,
                "Chat completion timed out"
            );
            return;
        }
    };
    let Some(answer) = answer.filter(|text| !text.trim().is_empty()) else {
        return;
    };

    let mut updated = recent.to_vec();
    updated.push(StoredMessage::user(user_line));
    updated.push(StoredMessage::assistant(&answer));
    memory.save(job.identity, &updated, config.history_limit());

    windows.mark_answered(job.identity, now_ms());
    windows.clear_greeted(job.identity);

    if outbound.send(answer).is_err() {
        debug!("Outbound queue closed, reply discarded");
    }
}
