//! Hearth Storage - File-backed persistence layer
//!
//! This crate provides the durable state for Hearth as plain JSON files:
//!
//! - `links.json` - one object mapping identity (UUID string) to the linked
//!   external account id (64-bit integer)
//! - `contexts/<uuid>.json` - one array of `{role, content, timestamp}`
//!   records per identity, holding that identity's recent conversation
//!
//! All load operations degrade to an empty result on missing or unreadable
//! files, and all save operations log failures instead of propagating them.
//! Callers must tolerate a no-op load and a failed save: the previous durable
//! state stays on disk and in-memory state catches up on the next successful
//! write.

pub mod history;
pub mod links;
pub mod paths;

pub use history::{HistoryStore, MessageRole, StoredMessage};
pub use links::LinkStore;
pub use paths::{contexts_dir, links_path, resolve_data_dir};
