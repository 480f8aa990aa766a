use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{error, trace};

use super::error::{StoreError, StoreResult};
use crate::settings::models::{
    ChangeBatch, SettingsPatch, SettingsRecord, StorageArea, StorageChange, keys,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Largest serialized size (key + JSON value) of one item in the synchronized namespace.
pub const SYNC_QUOTA_BYTES_PER_ITEM: usize = 8192;

const CHANGE_FEED_CAPACITY: usize = 256;

/// Key/value store shared by every context of the extension.
///
/// Writes are per key: a `set` only touches the keys it names, so two
/// concurrent multi-key writers can leave a record holding fields from both.
pub trait SettingsStore: Send + Sync + 'static {
    /// Read the named keys of `area`. An empty key list reads the whole area.
    /// Absent keys are simply missing from the result.
    fn get(&self, area: StorageArea, keys: &[&str]) -> BoxFuture<'static, StoreResult<Map<String, Value>>>;

    /// Write the given items. Resolves once the write is durable and the
    /// change batch (if any key actually changed) has been published.
    fn set(&self, area: StorageArea, items: Map<String, Value>) -> BoxFuture<'static, StoreResult<()>>;

    /// Subscribe to change batches of every area.
    fn subscribe(&self) -> broadcast::Receiver<ChangeBatch>;

    /// Read the full settings record, falling back to defaults when the
    /// store cannot be read.
    fn load_settings(&self) -> BoxFuture<'static, SettingsRecord> {
        let read = self.get(StorageArea::Sync, &keys::ALL);
        Box::pin(async move {
            match read.await {
                Ok(items) => SettingsRecord::from_items(&items),
                Err(e) => {
                    error!(error = ?e, "Failed to read settings, using defaults");
                    SettingsRecord::default()
                }
            }
        })
    }

    /// Write the fields set in `patch` to the synchronized namespace.
    fn apply_patch(&self, patch: &SettingsPatch) -> BoxFuture<'static, StoreResult<()>> {
        self.set(StorageArea::Sync, patch.to_items())
    }
}

/// Fan-out of change batches to every subscribed context.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeBatch>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeBatch> {
        self.sender.subscribe()
    }

    pub fn publish(&self, batch: ChangeBatch) {
        if batch.is_empty() {
            return;
        }
        trace!(area = batch.area.as_str(), keys = ?batch.changes.keys().collect::<Vec<_>>(), "Publishing change batch");
        // No receivers is fine: nobody is listening yet.
        let _ = self.sender.send(batch);
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject sync items larger than the per-item quota.
pub(crate) fn check_quota(area: StorageArea, items: &Map<String, Value>) -> StoreResult<()> {
    if area != StorageArea::Sync {
        return Ok(());
    }
    for (key, value) in items {
        let size = key.len() + serde_json::to_string(value)?.len();
        if size > SYNC_QUOTA_BYTES_PER_ITEM {
            return Err(StoreError::QuotaExceeded {
                key: key.clone(),
                size,
                limit: SYNC_QUOTA_BYTES_PER_ITEM,
            });
        }
    }
    Ok(())
}

/// Merge `items` into `target`, returning the keys whose value changed.
pub(crate) fn merge_items(
    target: &mut Map<String, Value>,
    items: Map<String, Value>,
) -> BTreeMap<String, StorageChange> {
    let mut changes = BTreeMap::new();
    for (key, value) in items {
        let old_value = if value.is_null() {
            target.remove(&key)
        } else {
            target.insert(key.clone(), value.clone())
        };
        let new_value = (!value.is_null()).then_some(value);
        if old_value != new_value {
            changes.insert(key, StorageChange { old_value, new_value });
        }
    }
    changes
}

pub(crate) fn select_items(source: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    if keys.is_empty() {
        return source.clone();
    }
    keys.iter()
        .filter_map(|key| source.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect()
}
