pub mod controllers;
pub mod models;
pub mod repositories;

pub use models::{SettingsCache, SettingsRecord, SharedSettingsCache};
pub use repositories::{InMemorySettingsStore, JsonFileSettingsStore, SettingsStore};
