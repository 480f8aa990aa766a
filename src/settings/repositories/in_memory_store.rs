use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use super::error::{StoreError, StoreResult};
use super::settings_store::{
    BoxFuture, ChangeFeed, SettingsStore, check_quota, merge_items, select_items,
};
use crate::settings::models::{ChangeBatch, StorageArea};

/// In-memory store.
/// Useful for testing and for hosts that persist elsewhere.
#[derive(Clone)]
pub struct InMemorySettingsStore {
    areas: Arc<Mutex<BTreeMap<StorageArea, Map<String, Value>>>>,
    feed: ChangeFeed,
    unavailable: Arc<AtomicBool>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self {
            areas: Arc::new(Mutex::new(BTreeMap::new())),
            feed: ChangeFeed::new(),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent operation fail, to exercise fallback paths.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store marked unavailable".into()));
        }
        Ok(())
    }
}

impl Default for InMemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn get(&self, area: StorageArea, keys: &[&str]) -> BoxFuture<'static, StoreResult<Map<String, Value>>> {
        let result = self.ensure_available().map(|()| {
            let areas = self.areas.lock();
            areas
                .get(&area)
                .map(|items| select_items(items, keys))
                .unwrap_or_default()
        });

        Box::pin(async move { result })
    }

    fn set(&self, area: StorageArea, items: Map<String, Value>) -> BoxFuture<'static, StoreResult<()>> {
        let result = self.ensure_available().and_then(|()| {
            check_quota(area, &items)?;
            let mut areas = self.areas.lock();
            let changes = merge_items(areas.entry(area).or_default(), items);
            self.feed.publish(ChangeBatch { area, changes });
            Ok(())
        });

        Box::pin(async move { result })
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeBatch> {
        self.feed.subscribe()
    }
}
