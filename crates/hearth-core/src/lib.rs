//! Hearth Core - game-server chat companion and account linking
//!
//! This crate provides:
//! - Account linking between local player identities and external accounts
//!   via short-lived one-time codes
//! - A rate-limited, single-worker relay from in-game chat to a
//!   chat-completion service
//! - Tick-driven ambient small talk
//! - The `Companion` service object wiring everything together with one
//!   lifecycle: create at host startup, shut down at host stop

pub mod ambient;
pub mod config;
pub mod host;
pub mod linking;
pub mod relay;

// Re-export commonly used types
pub use config::{ChatConfig, HearthConfig};
pub use host::ChatSink;
pub use linking::{CODE_TTL_MS, CodeRegistry, LinkCodeOutcome};
pub use relay::{ChatRelay, Classification, KeywordClassifier, MessageClassifier};

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use anyhow::Result;
use rand::RngExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use hearth_ai::{ConversationMemory, LlmClient, OpenAiCompatClient};
use hearth_storage::{HistoryStore, LinkStore, contexts_dir, links_path, resolve_data_dir};

use ambient::AmbientScheduler;
use host::{OutboundQueue, Roster};
use relay::{ResponseWindows, now_ms};

/// How often expired linking codes are swept from memory.
const CODE_SWEEP_INTERVAL_MS: i64 = 60_000;

/// Everything the chat-companion feature needs; absent when the feature is
/// disabled at startup.
struct ChatPipeline {
    relay: ChatRelay,
    ambient: AmbientScheduler,
    windows: Arc<ResponseWindows>,
    greetings: Vec<String>,
    follow_ups: Vec<String>,
    greeting_window_ms: i64,
    companion_name: String,
}

impl ChatPipeline {
    fn prefixed(&self, text: &str) -> String {
        format!("{} » {}", self.companion_name, text)
    }
}

/// The Hearth service object. One instance per host, created at startup
/// with its collaborators injected, shut down at host stop.
///
/// Event methods are cheap and never block; they are meant to be called
/// straight from the host's tick/event thread. Construction must happen
/// within a Tokio runtime, which the relay worker is spawned onto.
pub struct Companion {
    registry: Arc<CodeRegistry>,
    roster: Roster,
    outbound: OutboundQueue,
    chat: Option<ChatPipeline>,
    next_code_sweep: AtomicI64,
}

impl Companion {
    /// Create a companion from configuration, building the HTTP client for
    /// the configured chat-completion service.
    ///
    /// A missing API token (or `chat.enabled = false`) disables the whole
    /// chat pipeline with a warning; account linking stays active.
    pub fn new(config: HearthConfig) -> Result<Self> {
        let client: Option<Arc<dyn LlmClient>> = if config.chat.is_active() {
            let token = config.chat.api_token.clone().unwrap_or_default();
            Some(Arc::new(
                OpenAiCompatClient::new(token)
                    .with_base_url(config.chat.base_url.clone())
                    .with_model(config.chat.model.clone())
                    .with_timeout(Duration::from_millis(config.chat.request_timeout_ms))
                    .with_max_chars(config.chat.max_chars),
            ))
        } else {
            None
        };
        Self::build(config, client)
    }

    /// Create a companion with an injected chat-completion client. The
    /// client is still subject to the `chat.enabled` switch.
    pub fn with_client(config: HearthConfig, client: Arc<dyn LlmClient>) -> Result<Self> {
        let client = config.chat.enabled.then_some(client);
        Self::build(config, client)
    }

    fn build(config: HearthConfig, client: Option<Arc<dyn LlmClient>>) -> Result<Self> {
        config.chat.validate()?;
        let data_dir = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => resolve_data_dir()?,
        };

        let registry = Arc::new(CodeRegistry::new(LinkStore::new(links_path(&data_dir))));
        let outbound = OutboundQueue::new();

        let chat = match client {
            Some(client) => {
                let chat_config = Arc::new(config.chat.clone());
                let memory = ConversationMemory::new(HistoryStore::new(contexts_dir(&data_dir)));
                let windows = Arc::new(ResponseWindows::new());
                let classifier = Arc::new(KeywordClassifier::new(
                    &chat_config.mention_keywords,
                    &chat_config.interrogative_prefixes,
                    &chat_config.greeting_tokens,
                ));
                let relay = ChatRelay::spawn(
                    chat_config.clone(),
                    client,
                    memory,
                    windows.clone(),
                    classifier,
                    outbound.sender(),
                );

                let mut lines = chat_config.small_talk.clone();
                lines.extend(chat_config.fun_facts.iter().cloned());
                let ambient = AmbientScheduler::new(
                    chat_config.smalltalk_min_ms,
                    chat_config.smalltalk_max_ms,
                    lines,
                );

                info!(model = %chat_config.model, "Chat companion active");
                Some(ChatPipeline {
                    relay,
                    ambient,
                    windows,
                    greetings: chat_config.greetings.clone(),
                    follow_ups: chat_config.follow_ups.clone(),
                    greeting_window_ms: chat_config.greeting_window_ms,
                    companion_name: chat_config.companion_name.clone(),
                })
            }
            None => {
                warn!("Chat companion disabled; account linking remains active");
                None
            }
        };

        Ok(Self {
            registry,
            roster: Roster::new(),
            outbound,
            chat,
            next_code_sweep: AtomicI64::new(0),
        })
    }

    // ===== Host events =====

    /// A player joined: track them and, when the companion is active, greet
    /// them and open their greeting window.
    pub fn on_player_join(&self, identity: Uuid, display_name: &str, sink: &dyn ChatSink) {
        self.roster.join(identity, display_name);

        let Some(chat) = &self.chat else {
            return;
        };
        if chat.greetings.is_empty() {
            return;
        }

        let mut rng = rand::rng();
        let template = &chat.greetings[rng.random_range(0..chat.greetings.len())];
        let mut line = template.replace("{name}", display_name);
        if !chat.follow_ups.is_empty() && rng.random_bool(0.5) {
            line.push(' ');
            line.push_str(&chat.follow_ups[rng.random_range(0..chat.follow_ups.len())]);
        }

        chat.windows
            .mark_greeted(identity, now_ms() + chat.greeting_window_ms);
        sink.broadcast_message(&chat.prefixed(&line));
    }

    /// A player left: drop them from the roster. Their rate-limit state is
    /// left alone; it is ephemeral and harmless.
    pub fn on_player_leave(&self, identity: Uuid) {
        self.roster.leave(identity);
    }

    /// A chat line arrived. Filtering, rate limiting and enqueueing happen
    /// here on the caller's thread; everything slow happens on the worker.
    pub fn on_chat_message(&self, identity: Uuid, display_name: &str, text: &str) {
        if let Some(chat) = &self.chat {
            chat.relay.offer(identity, display_name, text);
        }
    }

    /// One host tick: deliver queued replies, drive the ambient timer and
    /// occasionally sweep expired linking codes.
    pub fn on_tick(&self, sink: &dyn ChatSink) {
        let now = now_ms();

        match &self.chat {
            Some(chat) => {
                self.outbound
                    .drain(|text| sink.broadcast_message(&chat.prefixed(text)));
                if let Some(line) = chat.ambient.tick(now, &self.roster.names()) {
                    sink.broadcast_message(&chat.prefixed(&line));
                }
            }
            None => {
                self.outbound.drain(|text| sink.broadcast_message(text));
            }
        }

        if now >= self.next_code_sweep.load(Ordering::Relaxed) {
            self.next_code_sweep
                .store(now + CODE_SWEEP_INTERVAL_MS, Ordering::Relaxed);
            let purged = self.registry.purge_expired(now);
            if purged > 0 {
                debug!(purged, "Swept expired linking codes");
            }
        }
    }

    // ===== Command / platform surface =====

    /// Handle the in-game "request code" command.
    pub fn request_link_code(&self, identity: Uuid) -> LinkCodeOutcome {
        self.registry.request_code(identity)
    }

    /// Redeem a code presented on the external platform. Safe to call from
    /// the platform listener thread.
    pub fn redeem_code(&self, code: &str, external_id: i64) -> bool {
        self.registry.redeem(code, external_id)
    }

    /// Handle the in-game "remove my link" command.
    pub fn remove_link(&self, identity: Uuid) -> bool {
        self.registry.unlink(identity)
    }

    /// The external account linked to an identity, if any.
    pub fn linked_account(&self, identity: Uuid) -> Option<i64> {
        self.registry.linked(identity)
    }

    /// Direct access to the code registry for platform-side handlers.
    pub fn registry(&self) -> &Arc<CodeRegistry> {
        &self.registry
    }

    // ===== Lifecycle =====

    /// Stop accepting chat work and give the relay worker a bounded grace
    /// period to finish its in-flight call.
    pub async fn shutdown(&self, grace: Duration) {
        if let Some(chat) = &self.chat {
            chat.relay.shutdown(grace).await;
        }
        info!("Hearth companion stopped");
    }
}
