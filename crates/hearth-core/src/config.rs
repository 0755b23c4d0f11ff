//! Companion configuration.
//!
//! All knobs of the chat pipeline live here with serde defaults, so a
//! missing or partial TOML file still yields a working setup. A missing API
//! token does not fail validation; it disables the chat companion at
//! startup while account linking stays active.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

// Default configuration constants
const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/v1";
const DEFAULT_MODEL: &str = "meta-llama/Llama-3.1-8B-Instruct";
const DEFAULT_TEMPERATURE: f32 = 0.8;
const DEFAULT_MAX_NEW_TOKENS: u32 = 180;
const DEFAULT_MAX_CHARS: usize = 700;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 12_000;
const DEFAULT_COOLDOWN_MS: i64 = 15_000;
const DEFAULT_HISTORY_MESSAGES: usize = 12;
const DEFAULT_QUEUE_CAPACITY: usize = 32;
const DEFAULT_COMMAND_PREFIX: &str = "/";
const DEFAULT_COMPANION_NAME: &str = "Ember";
const DEFAULT_GREETING_WINDOW_MS: i64 = 120_000;
const DEFAULT_FOLLOWUP_WINDOW_MS: i64 = 90_000;
const DEFAULT_SMALLTALK_MIN_MS: i64 = 120_000;
const DEFAULT_SMALLTALK_MAX_MS: i64 = 240_000;

const DEFAULT_SYSTEM_PROMPT: &str = "You are Ember, the chat companion of a small survival \
    server. Keep replies to a sentence or two, match the language the player writes in, and \
    never break character.";

fn default_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Chat companion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub enabled: bool,
    /// Bearer token for the chat-completion service. Absent token disables
    /// the companion feature as a whole.
    pub api_token: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_new_tokens: u32,
    /// Reply length cap in characters (0 = unlimited).
    pub max_chars: usize,
    pub request_timeout_ms: u64,
    /// Minimum pause between two answers to the same player.
    pub cooldown_ms: i64,
    /// Number of stored exchanges fed back into the prompt. The persisted
    /// history keeps twice this many entries (user + assistant pairs).
    pub history_messages: usize,
    pub queue_capacity: usize,
    pub system_prompt: String,
    pub companion_name: String,
    pub command_prefix: String,
    pub mention_keywords: Vec<String>,
    pub interrogative_prefixes: Vec<String>,
    pub greeting_tokens: Vec<String>,
    pub greetings: Vec<String>,
    pub follow_ups: Vec<String>,
    pub small_talk: Vec<String>,
    pub fun_facts: Vec<String>,
    pub greeting_window_ms: i64,
    pub followup_window_ms: i64,
    pub smalltalk_min_ms: i64,
    pub smalltalk_max_ms: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            max_chars: DEFAULT_MAX_CHARS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            history_messages: DEFAULT_HISTORY_MESSAGES,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            companion_name: DEFAULT_COMPANION_NAME.to_string(),
            command_prefix: DEFAULT_COMMAND_PREFIX.to_string(),
            mention_keywords: default_strings(&["ember", "эмбер"]),
            interrogative_prefixes: default_strings(&[
                "how ", "what ", "why ", "where ", "can ", "как ", "что ", "почему ", "зачем ",
                "где ",
            ]),
            greeting_tokens: default_strings(&["hello", "hey", "прив", "здаров", "салам"]),
            greetings: default_strings(&[
                "Hey {name}! Good to see you.",
                "Welcome back, {name}! What's the plan today?",
                "Hi {name}! Ready for an adventure?",
                "{name}! The hearth is warm, come sit.",
                "Greetings, {name}! What's new?",
            ]),
            follow_ups: default_strings(&[
                "What are you up to right now? I can help if you want.",
                "Mining, building, or exploring today?",
                "If you need a recipe or a trick, just ask.",
                "Got a goal for today? I love helping with ideas.",
            ]),
            small_talk: default_strings(&[
                "Who's up to what? Anyone want company in the mines?",
                "{name}, how's the base coming along? Need a hand?",
                "Anyone been to the nether today? Find anything good?",
                "I'm around if you need recipes or tips.",
                "How are everyone's supplies? We could mount a diamond run.",
            ]),
            fun_facts: default_strings(&[
                "Tip: torches under falling gravel clear a shaft in no time.",
                "Remember: a bed in the nether makes for a very short night.",
                "Tip: a shield holds up even down there once you learn to time the block.",
                "Fact: cats love sitting on chests precisely when you need them open.",
            ]),
            greeting_window_ms: DEFAULT_GREETING_WINDOW_MS,
            followup_window_ms: DEFAULT_FOLLOWUP_WINDOW_MS,
            smalltalk_min_ms: DEFAULT_SMALLTALK_MIN_MS,
            smalltalk_max_ms: DEFAULT_SMALLTALK_MAX_MS,
        }
    }
}

impl ChatConfig {
    /// Whether the companion feature can run: enabled and a token present.
    pub fn is_active(&self) -> bool {
        self.enabled
            && self
                .api_token
                .as_deref()
                .is_some_and(|token| !token.trim().is_empty())
    }

    /// Number of entries the persisted history is bounded to.
    pub fn history_limit(&self) -> usize {
        self.history_messages * 2
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow::anyhow!("Temperature must be between 0.0 and 2.0"));
        }

        if self.max_new_tokens == 0 {
            return Err(anyhow::anyhow!("Max new tokens must be at least 1"));
        }

        if self.history_messages == 0 {
            return Err(anyhow::anyhow!("History length must be at least 1"));
        }

        if self.queue_capacity == 0 {
            return Err(anyhow::anyhow!("Queue capacity must be at least 1"));
        }

        if self.request_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Request timeout must be at least 1 ms"));
        }

        if self.cooldown_ms < 0 {
            return Err(anyhow::anyhow!("Cooldown must not be negative"));
        }

        if self.smalltalk_min_ms <= 0 || self.smalltalk_max_ms < self.smalltalk_min_ms {
            return Err(anyhow::anyhow!(
                "Small-talk bounds must satisfy 0 < min <= max"
            ));
        }

        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HearthConfig {
    /// Data directory override. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
    pub chat: ChatConfig,
}

impl HearthConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        config.chat.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults on a missing or broken
    /// file (the failure is logged, not propagated).
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), "Falling back to default config: {e:#}");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        ChatConfig::default().validate().unwrap();
    }

    #[test]
    fn test_companion_inactive_without_token() {
        let config = ChatConfig::default();
        assert!(!config.is_active());

        let with_blank = ChatConfig {
            api_token: Some("   ".to_string()),
            ..ChatConfig::default()
        };
        assert!(!with_blank.is_active());

        let with_token = ChatConfig {
            api_token: Some("hf_token".to_string()),
            ..ChatConfig::default()
        };
        assert!(with_token.is_active());
    }

    #[test]
    fn test_disabled_flag_overrides_token() {
        let config = ChatConfig {
            enabled: false,
            api_token: Some("hf_token".to_string()),
            ..ChatConfig::default()
        };
        assert!(!config.is_active());
    }

    #[test]
    fn test_history_limit_counts_pairs() {
        let config = ChatConfig {
            history_messages: 7,
            ..ChatConfig::default()
        };
        assert_eq!(config.history_limit(), 14);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let config = ChatConfig {
            temperature: 3.5,
            ..ChatConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ChatConfig {
            queue_capacity: 0,
            ..ChatConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ChatConfig {
            smalltalk_min_ms: 5000,
            smalltalk_max_ms: 1000,
            ..ChatConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: HearthConfig = toml::from_str(
            r#"
            [chat]
            api_token = "hf_test"
            cooldown_ms = 30000
            "#,
        )
        .unwrap();
        assert!(parsed.chat.is_active());
        assert_eq!(parsed.chat.cooldown_ms, 30_000);
        assert_eq!(parsed.chat.model, DEFAULT_MODEL);
        assert!(!parsed.chat.greetings.is_empty());
    }
}
