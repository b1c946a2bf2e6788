//! Persistence for settings and study history.

pub mod editor;
pub mod history_store;
pub mod settings_store;
pub mod storage;
pub mod transfer;

pub use history_store::{HistoryError, HistoryStore, MergeReport};
pub use settings_store::SettingsStore;
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};
