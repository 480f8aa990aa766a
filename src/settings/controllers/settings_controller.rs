use serde_json::Map;
use tracing::{debug, info};

use crate::protocol::StyleCommand;
use crate::settings::models::{SettingsPatch, SettingsRecord, StorageArea, keys};
use crate::settings::repositories::{SettingsStore, StoreResult};

/// Write the default record for every key that is not stored yet.
///
/// Runs on first install; existing values survive an update.
pub async fn install_defaults(store: &dyn SettingsStore) -> StoreResult<SettingsRecord> {
    let stored = store.get(StorageArea::Sync, &keys::ALL).await?;
    let defaults = SettingsRecord::default().to_items();

    let missing: Map<_, _> = defaults
        .into_iter()
        .filter(|(key, _)| !stored.contains_key(key))
        .collect();

    if !missing.is_empty() {
        info!(keys = ?missing.keys().collect::<Vec<_>>(), "Installing default settings");
        store.set(StorageArea::Sync, missing).await?;
    }

    Ok(store.load_settings().await)
}

/// Persist a `SET_FONT_SIZE_*`, `SET_FONT_WEIGHT_*` or `SET_MODE_*` command.
pub async fn apply_style_command(store: &dyn SettingsStore, command: StyleCommand) -> StoreResult<()> {
    debug!(command = command.tag(), "Writing style command through the store");
    store.apply_patch(&command.to_patch()).await
}

/// Write a partial update through the store. Tabs learn about it from the
/// change feed, never from the caller.
pub async fn update_settings(store: &dyn SettingsStore, patch: &SettingsPatch) -> StoreResult<()> {
    if patch.is_empty() {
        debug!("Ignoring empty settings patch");
        return Ok(());
    }
    store.apply_patch(patch).await
}

/// Rewrite every field with its default.
pub async fn reset_to_defaults(store: &dyn SettingsStore) -> StoreResult<()> {
    info!("Resetting all settings to defaults");
    store
        .set(StorageArea::Sync, SettingsRecord::default().to_items())
        .await
}

/// Flip the global styles switch. Returns the new state.
pub async fn toggle_styles(store: &dyn SettingsStore) -> StoreResult<bool> {
    let current = store.get(StorageArea::Sync, &[keys::STYLES_ENABLED]).await?;
    let enabled = SettingsRecord::from_items(&current).styles_enabled;

    let patch = SettingsPatch {
        styles_enabled: Some(!enabled),
        ..Default::default()
    };
    store.apply_patch(&patch).await?;
    info!(styles_enabled = !enabled, "Toggled page styles");
    Ok(!enabled)
}
