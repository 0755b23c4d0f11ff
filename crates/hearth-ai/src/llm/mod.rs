//! LLM client layer - trait, wire types and implementations

pub mod client;
pub mod mock_client;
pub mod openai_compat;

pub use client::{CompletionRequest, CompletionResponse, LlmClient, Message, Role};
pub use mock_client::{MockLlmClient, MockStep};
pub use openai_compat::OpenAiCompatClient;
