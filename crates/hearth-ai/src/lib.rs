//! Hearth AI - Chat-completion client layer
//!
//! This crate provides:
//! - The `LlmClient` trait with message/request types
//! - An OpenAI-compatible HTTP client (any `/chat/completions` endpoint)
//! - A deterministic scripted mock client for tests
//! - Bounded per-identity conversation memory backed by hearth-storage

pub mod error;
mod http_client;
pub mod llm;
pub mod memory;

// Re-export commonly used types
pub use error::{AiError, Result};
pub use llm::{
    CompletionRequest, CompletionResponse, LlmClient, Message, MockLlmClient, MockStep,
    OpenAiCompatClient, Role,
};
pub use memory::ConversationMemory;
