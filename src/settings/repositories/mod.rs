pub mod error;
pub mod in_memory_store;
pub mod json_file_store;
pub mod settings_store;

pub use error::{StoreError, StoreResult};
pub use in_memory_store::InMemorySettingsStore;
pub use json_file_store::JsonFileSettingsStore;
pub use settings_store::{BoxFuture, ChangeFeed, SYNC_QUOTA_BYTES_PER_ITEM, SettingsStore};
