//! Durable storage for iteration log events.
//!
//! Each log persists as an append-only JSONL journal plus an optional
//! snapshot cache; see [`file_store`] for the layout and locking rules.

pub mod file_store;

pub use file_store::{FileAggregateContext, FileEventStore, StoredEvent, StoredSnapshot};
