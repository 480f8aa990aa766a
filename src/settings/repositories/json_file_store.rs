use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

use super::error::{StoreError, StoreResult};
use super::settings_store::{
    BoxFuture, ChangeFeed, SettingsStore, check_quota, merge_items, select_items,
};
use crate::settings::models::{ChangeBatch, StorageArea};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StorageFile {
    #[serde(default)]
    sync: Map<String, Value>,
    #[serde(default)]
    local: Map<String, Value>,
}

impl StorageFile {
    fn area(&self, area: StorageArea) -> &Map<String, Value> {
        match area {
            StorageArea::Sync => &self.sync,
            StorageArea::Local => &self.local,
        }
    }

    fn area_mut(&mut self, area: StorageArea) -> &mut Map<String, Value> {
        match area {
            StorageArea::Sync => &mut self.sync,
            StorageArea::Local => &mut self.local,
        }
    }
}

/// Store persisted as one JSON document holding both namespaces.
///
/// The file is read on first access and rewritten (temp file + rename) on
/// every write that changes something.
#[derive(Clone)]
pub struct JsonFileSettingsStore {
    file_path: PathBuf,
    state: Arc<Mutex<Option<StorageFile>>>,
    feed: ChangeFeed,
}

impl JsonFileSettingsStore {
    /// Create store with XDG-compliant path
    pub fn new() -> StoreResult<Self> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            StoreError::PathError("Cannot determine data directory".into())
        })?;

        Ok(Self::with_path(data_dir.join("a11y-bridge").join("storage.json")))
    }

    /// Create store with custom path (for testing)
    pub fn with_path(file_path: PathBuf) -> Self {
        Self {
            file_path,
            state: Arc::new(Mutex::new(None)),
            feed: ChangeFeed::new(),
        }
    }

    pub fn storage_path(&self) -> String {
        self.file_path.to_string_lossy().to_string()
    }
}

async fn read_file(path: &PathBuf) -> StoreResult<StorageFile> {
    // First run: nothing stored yet
    if !tokio::fs::try_exists(path).await? {
        debug!(path = %path.display(), "No storage file yet, starting empty");
        return Ok(StorageFile::default());
    }

    let contents = tokio::fs::read_to_string(path).await?;
    let file: StorageFile = serde_json::from_str(&contents)?;
    info!(
        path = %path.display(),
        sync_keys = file.sync.len(),
        local_keys = file.local.len(),
        "Loaded storage file"
    );
    Ok(file)
}

async fn write_file(path: &PathBuf, file: &StorageFile) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(file)?;

    // Write atomically using temp file + rename
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, json).await?;
    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

impl SettingsStore for JsonFileSettingsStore {
    fn get(&self, area: StorageArea, keys: &[&str]) -> BoxFuture<'static, StoreResult<Map<String, Value>>> {
        let path = self.file_path.clone();
        let state = self.state.clone();
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();

        Box::pin(async move {
            let mut guard = state.lock().await;
            if guard.is_none() {
                *guard = Some(read_file(&path).await?);
            }
            let file = guard.as_ref().map(|f| f.area(area)).cloned().unwrap_or_default();
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            Ok(select_items(&file, &keys))
        })
    }

    fn set(&self, area: StorageArea, items: Map<String, Value>) -> BoxFuture<'static, StoreResult<()>> {
        let path = self.file_path.clone();
        let state = self.state.clone();
        let feed = self.feed.clone();

        Box::pin(async move {
            check_quota(area, &items)?;

            // Held across the file write and the publish so batches leave in
            // the same order the writes reach disk
            let mut guard = state.lock().await;
            let mut file = match guard.take() {
                Some(file) => file,
                None => read_file(&path).await?,
            };

            let previous = file.clone();
            let changes = merge_items(file.area_mut(area), items);
            if changes.is_empty() {
                *guard = Some(file);
                return Ok(());
            }

            if let Err(e) = write_file(&path, &file).await {
                *guard = Some(previous);
                return Err(e);
            }
            *guard = Some(file);
            feed.publish(ChangeBatch { area, changes });
            Ok(())
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeBatch> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::models::{FontSize, SettingsRecord, ThemeMode};
    use serde_json::json;
    use tempfile::tempdir;

    fn items(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileSettingsStore::with_path(dir.path().join("storage.json"));

        let read = store.get(StorageArea::Sync, &[]).await.unwrap();
        assert!(read.is_empty());
        assert_eq!(store.load_settings().await, SettingsRecord::default());
    }

    #[tokio::test]
    async fn test_values_survive_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let store = JsonFileSettingsStore::with_path(path.clone());
        store
            .set(StorageArea::Sync, items(json!({ "fontSize": "xl", "themeMode": "dark" })))
            .await
            .unwrap();
        store
            .set(StorageArea::Local, items(json!({ "cartItems": [{"id": 1}] })))
            .await
            .unwrap();

        let reopened = JsonFileSettingsStore::with_path(path);
        let record = reopened.load_settings().await;
        assert_eq!(record.font_size, FontSize::Xl);
        assert_eq!(record.theme_mode, ThemeMode::Dark);

        let local = reopened.get(StorageArea::Local, &["cartItems"]).await.unwrap();
        assert_eq!(local["cartItems"], json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn test_write_publishes_changes() {
        let dir = tempdir().unwrap();
        let store = JsonFileSettingsStore::with_path(dir.path().join("storage.json"));
        let mut rx = store.subscribe();

        store
            .set(StorageArea::Sync, items(json!({ "isCursorEnabled": false })))
            .await
            .unwrap();

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.area, StorageArea::Sync);
        assert_eq!(batch.new_value("isCursorEnabled"), Some(&json!(false)));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileSettingsStore::with_path(path);
        let err = store.get(StorageArea::Sync, &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::SerializationError(_)));
        assert_eq!(store.load_settings().await, SettingsRecord::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_publish_in_disk_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let store = Arc::new(JsonFileSettingsStore::with_path(path.clone()));
        let mut rx = store.subscribe();

        let writes = (0..16).map(|n| {
            let store = store.clone();
            let size = if n % 2 == 0 { "s" } else { "xl" };
            tokio::spawn(async move {
                store
                    .set(StorageArea::Sync, items(json!({ "fontSize": size })))
                    .await
                    .unwrap();
            })
        });
        for write in futures::future::join_all(writes).await {
            write.unwrap();
        }

        let mut last = None;
        while let Ok(batch) = rx.try_recv() {
            last = batch.new_value("fontSize").cloned();
        }
        let on_disk = JsonFileSettingsStore::with_path(path)
            .get(StorageArea::Sync, &["fontSize"])
            .await
            .unwrap();
        assert_eq!(last.as_ref(), on_disk.get("fontSize"));
    }
}
