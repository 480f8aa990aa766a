//! Turns store change batches into broadcasts to every tab and view.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::messaging::{TabMessenger, TabQuery};
use crate::assets::ExtensionAssets;
use crate::protocol::{PageControl, PageMessage};
use crate::settings::models::{
    ChangeBatch, SettingsRecord, SharedSettingsCache, StorageArea, keys,
};
use crate::settings::repositories::SettingsStore;

/// What a batch requires tabs to re-apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingUpdates {
    pub theme: bool,
    pub cursor: bool,
    /// New value of `stylesEnabled`, if it changed.
    pub styles: Option<bool>,
    /// New value of `iframeVisible`, if it changed.
    pub overlay: Option<bool>,
}

impl PendingUpdates {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub struct ChangePropagator {
    store: Arc<dyn SettingsStore>,
    cache: SharedSettingsCache,
    tabs: Arc<dyn TabMessenger>,
    assets: ExtensionAssets,
}

impl ChangePropagator {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        cache: SharedSettingsCache,
        tabs: Arc<dyn TabMessenger>,
        assets: ExtensionAssets,
    ) -> Self {
        Self {
            store,
            cache,
            tabs,
            assets,
        }
    }

    /// Update the cache from a batch and report which broadcasts are due.
    /// Only the synchronized namespace is considered.
    pub fn apply_batch(&self, batch: &ChangeBatch) -> PendingUpdates {
        let mut pending = PendingUpdates::default();
        if batch.area != StorageArea::Sync {
            return pending;
        }

        // Values are parsed the same way a full read would, so a removed
        // or malformed value falls back to its default.
        let mut items = serde_json::Map::new();
        for (key, change) in &batch.changes {
            if let Some(value) = &change.new_value {
                items.insert(key.clone(), value.clone());
            }
        }
        let record = SettingsRecord::from_items(&items);

        let mut cache = self.cache.write();
        for key in batch.changes.keys() {
            match key.as_str() {
                keys::FONT_SIZE => {
                    cache.set_font_size(record.font_size);
                    pending.theme = true;
                }
                keys::FONT_WEIGHT => {
                    cache.set_font_weight(record.font_weight);
                    pending.theme = true;
                }
                keys::THEME_MODE => {
                    cache.set_theme(record.theme_mode);
                    pending.theme = true;
                }
                keys::IS_CURSOR_ENABLED => {
                    cache.set_cursor_enabled(record.is_cursor_enabled);
                    pending.cursor = true;
                }
                keys::CURSOR_SIZE => {
                    cache.set_cursor_size(record.cursor_size);
                    pending.cursor = true;
                }
                keys::CURSOR_THEME => {
                    cache.set_cursor_theme(record.cursor_theme);
                    pending.cursor = true;
                }
                keys::STYLES_ENABLED => pending.styles = Some(record.styles_enabled),
                keys::IFRAME_VISIBLE => pending.overlay = Some(record.iframe_visible),
                other => debug!(key = other, "Ignoring change of unrelated key"),
            }
        }
        pending
    }

    /// Messages for the pending updates, built from the cache.
    pub fn messages(&self, pending: PendingUpdates) -> Vec<PageMessage> {
        let mut messages = Vec::new();
        if pending.theme {
            let payload = self.cache.read().theme_payload();
            messages.push(PageControl::ThemeUpdate { payload }.into());
        }
        if pending.cursor {
            let preferences = self.cache.read().cursor_preferences();
            messages.push(PageControl::UpdateCursor(self.assets.cursor_settings(preferences)).into());
        }
        match pending.styles {
            Some(true) => messages.push(PageControl::RestoreAllStyles.into()),
            Some(false) => messages.push(PageControl::DisableAllStyles.into()),
            None => {}
        }
        if let Some(is_visible) = pending.overlay {
            messages.push(PageControl::SetIframeVisibility { is_visible }.into());
        }
        messages
    }

    /// Send one message to every tab and every extension view.
    pub async fn broadcast(&self, message: &PageMessage) {
        let value = message.to_value();
        let tabs = self.tabs.query_tabs(TabQuery::all()).await;

        let deliveries = tabs.iter().map(|tab| {
            let send = self.tabs.send_to_tab(tab.id, value.clone());
            let tab_id = tab.id;
            async move {
                if let Err(e) = send.await {
                    debug!(tab_id, error = %e, "Broadcast not delivered to tab");
                }
            }
        });
        join_all(deliveries).await;

        self.tabs.notify_views(value);
    }

    pub async fn handle_batch(&self, batch: &ChangeBatch) {
        let pending = self.apply_batch(batch);
        if pending.is_empty() {
            return;
        }
        debug!(?pending, "Propagating settings change");
        for message in self.messages(pending) {
            self.broadcast(&message).await;
        }
    }

    /// Rebuild the cache from a full read of the store and re-send the theme
    /// and cursor to every tab. Used after dropped batches, whose keys the
    /// cache can no longer know.
    pub async fn resync(&self) {
        let record = self.store.load_settings().await;
        self.cache.write().populate(&record);
        let pending = PendingUpdates {
            theme: true,
            cursor: true,
            ..PendingUpdates::default()
        };
        for message in self.messages(pending) {
            self.broadcast(&message).await;
        }
    }

    /// Drain the change feed, one batch at a time in arrival order.
    pub fn spawn(self, mut receiver: broadcast::Receiver<ChangeBatch>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(batch) => self.handle_batch(&batch).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Change propagator fell behind, resyncing from store");
                        self.resync().await;
                    }
                    Err(RecvError::Closed) => {
                        info!("Change feed closed, stopping propagator");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::tab_registry::TabRegistry;
    use crate::background::test_support::RecordingTab;
    use crate::settings::models::{CursorTheme, FontWeight, SettingsCache, StorageChange};
    use crate::settings::repositories::InMemorySettingsStore;
    use serde_json::{Value, json};
    use std::collections::BTreeMap;

    fn batch(area: StorageArea, changes: &[(&str, Value)]) -> ChangeBatch {
        let changes: BTreeMap<String, StorageChange> = changes
            .iter()
            .map(|(key, value)| {
                (
                    key.to_string(),
                    StorageChange {
                        old_value: None,
                        new_value: Some(value.clone()),
                    },
                )
            })
            .collect();
        ChangeBatch { area, changes }
    }

    fn propagator() -> (ChangePropagator, Arc<TabRegistry>) {
        let tabs = Arc::new(TabRegistry::new());
        let propagator = ChangePropagator::new(
            Arc::new(InMemorySettingsStore::new()),
            SettingsCache::shared(),
            tabs.clone(),
            ExtensionAssets::new("chrome-extension://test"),
        );
        (propagator, tabs)
    }

    #[test]
    fn test_flags_per_group() {
        let (propagator, _tabs) = propagator();
        let pending = propagator.apply_batch(&batch(
            StorageArea::Sync,
            &[("fontSize", json!("xl")), ("cursorSize", json!("large"))],
        ));
        assert!(pending.theme);
        assert!(pending.cursor);
        assert_eq!(pending.styles, None);
    }

    #[test]
    fn test_local_and_unrelated_keys_ignored() {
        let (propagator, _tabs) = propagator();
        assert!(propagator
            .apply_batch(&batch(StorageArea::Local, &[("fontSize", json!("xl"))]))
            .is_empty());
        assert!(propagator
            .apply_batch(&batch(StorageArea::Sync, &[("cartItems", json!([]))]))
            .is_empty());
        assert!(propagator.cache.read().is_empty());
    }

    #[test]
    fn test_theme_message_reads_cache_not_event() {
        let (propagator, _tabs) = propagator();
        propagator.cache.write().set_font_weight(FontWeight::Regular);

        let pending = propagator.apply_batch(&batch(StorageArea::Sync, &[("fontSize", json!("s"))]));
        let messages = propagator.messages(pending);
        assert_eq!(
            messages[0].to_value(),
            json!({
                "type": "THEME_UPDATE",
                "payload": { "fontSize": "s", "fontWeight": "regular", "themeMode": "light" }
            })
        );
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_tab_and_views() {
        let (propagator, tabs) = propagator();
        let first = tabs.open_tab("https://shop.example/a");
        let second = tabs.open_tab("https://shop.example/b");
        tabs.open_tab("https://shop.example/no-listener");
        let page_a = Arc::new(RecordingTab::answering(json!({ "success": true })));
        let page_b = Arc::new(RecordingTab::answering(json!({ "success": true })));
        tabs.attach(first, page_a.clone()).unwrap();
        tabs.attach(second, page_b.clone()).unwrap();
        let mut views = tabs.subscribe_views();

        propagator
            .handle_batch(&batch(StorageArea::Sync, &[("stylesEnabled", json!(false))]))
            .await;

        let expected = json!({ "type": "DISABLE_ALL_STYLES" });
        assert_eq!(page_a.received(), vec![expected.clone()]);
        assert_eq!(page_b.received(), vec![expected.clone()]);
        assert_eq!(views.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_lagged_feed_resyncs_cache_and_tabs() {
        let store = Arc::new(InMemorySettingsStore::new());
        store
            .set(StorageArea::Sync, json!({ "cursorTheme": "black" }).as_object().cloned().unwrap())
            .await
            .unwrap();
        let tabs = Arc::new(TabRegistry::new());
        let id = tabs.open_tab("https://shop.example/");
        let page = Arc::new(RecordingTab::answering(json!({ "success": true })));
        tabs.attach(id, page.clone()).unwrap();
        let cache = SettingsCache::shared();
        let propagator = ChangePropagator::new(
            store.clone(),
            cache.clone(),
            tabs.clone(),
            ExtensionAssets::new("chrome-extension://test"),
        );

        // Eight batches into a feed of four: the first four are dropped.
        let (sender, receiver) = broadcast::channel(4);
        for size in ["s", "l", "s", "l", "s", "l", "s", "l"] {
            sender
                .send(batch(StorageArea::Sync, &[("fontSize", json!(size))]))
                .unwrap();
        }
        drop(sender);
        propagator.spawn(receiver).await.unwrap();

        assert_eq!(cache.read().cursor_theme(), CursorTheme::Black);
        let types: Vec<Value> = page.received().iter().map(|m| m["type"].clone()).collect();
        assert!(types.contains(&json!("UPDATE_CURSOR")));
        assert!(types.contains(&json!("THEME_UPDATE")));
    }
}
