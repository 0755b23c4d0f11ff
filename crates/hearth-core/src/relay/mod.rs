//! Chat relay - classification, rate limiting and the single-worker
//! pipeline for outbound chat-completion calls.

pub mod classifier;
pub mod rate_limit;
pub mod worker;

pub use classifier::{Classification, KeywordClassifier, MessageClassifier};
pub use rate_limit::ResponseWindows;
pub use worker::ChatRelay;

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
