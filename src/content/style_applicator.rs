//! Applies font, mode and cursor settings to one page, and moves the page
//! between its enabled and disabled states.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{debug, error, info, warn};

use super::document::SharedDocument;
use super::page_context::{PageContext, StyleSnapshot};
use super::styles::{
    FONT_FAMILY, FONT_STYLE_ID, MODE_STYLE_ID, STRIPPED_PROPERTIES, cursor_value, font_css,
    is_target, mode_css,
};
use crate::assets::ExtensionAssets;
use crate::background::RuntimeMessenger;
use crate::protocol::{CursorSettings, ThemePayload};
use crate::settings::controllers;
use crate::settings::models::settings_record::parse_field;
use crate::settings::models::{
    CursorPreferences, FontStyle, SettingsRecord, StorageArea, ThemeMode, keys,
};
use crate::settings::repositories::{SettingsStore, StoreResult};

#[derive(Clone)]
pub struct StyleApplicator {
    document: SharedDocument,
    context: Arc<PageContext>,
    store: Arc<dyn SettingsStore>,
    runtime: Arc<dyn RuntimeMessenger>,
    assets: ExtensionAssets,
}

impl StyleApplicator {
    pub fn new(
        document: SharedDocument,
        context: Arc<PageContext>,
        store: Arc<dyn SettingsStore>,
        runtime: Arc<dyn RuntimeMessenger>,
        assets: ExtensionAssets,
    ) -> Self {
        Self {
            document,
            context,
            store,
            runtime,
            assets,
        }
    }

    /// Replace the font stylesheet with the applied font merged with `style`,
    /// and set the same values inline on every target element.
    pub fn apply_font_style(&self, style: FontStyle) {
        if !self.context.is_active() {
            return;
        }
        let font = self.context.merge_font(style);
        let css = font_css(&font);

        let mut doc = self.document.lock();
        for element in doc.elements_mut().filter(|e| is_target(&e.tag)) {
            if let Some(size) = font.font_size {
                element.style.set("font-size", size.css_value());
            }
            if let Some(weight) = font.font_weight {
                element.style.set("font-weight", weight.css_value());
            }
            element.style.set("font-family", FONT_FAMILY);
        }
        doc.replace_style_node(FONT_STYLE_ID, css);
        debug!(?font, "Applied font style");
    }

    pub fn apply_mode_style(&self, mode: ThemeMode) {
        if !self.context.is_active() {
            return;
        }
        let mut doc = self.document.lock();
        match mode_css(mode) {
            Some(css) => doc.replace_style_node(MODE_STYLE_ID, css),
            None => {
                doc.remove_style_node(MODE_STYLE_ID);
            }
        }
        debug!(?mode, "Applied mode style");
    }

    pub fn apply_theme(&self, payload: &ThemePayload) {
        self.apply_mode_style(payload.theme_mode);
        self.apply_font_style(FontStyle::new(payload.font_size, payload.font_weight));
    }

    pub fn apply_cursor(&self, url: &str) {
        if !self.context.is_active() {
            return;
        }
        self.document
            .lock()
            .body_style_mut()
            .set("cursor", cursor_value(url));
        self.context.set_cursor_enabled(true);
    }

    pub fn remove_cursor(&self) {
        if !self.context.is_active() {
            return;
        }
        self.document.lock().body_style_mut().remove("cursor");
        self.context.set_cursor_enabled(false);
    }

    pub fn apply_cursor_settings(&self, settings: &CursorSettings) {
        match (settings.is_cursor_enabled, settings.cursor_url.as_deref()) {
            (true, Some(url)) => self.apply_cursor(url),
            _ => self.remove_cursor(),
        }
    }

    /// Remove every stylesheet and inline property this page ever set.
    fn strip_document(&self) {
        let mut doc = self.document.lock();
        doc.remove_style_node(FONT_STYLE_ID);
        doc.remove_style_node(MODE_STYLE_ID);
        doc.body_style_mut().remove("cursor");
        doc.strip_inline_properties(&STRIPPED_PROPERTIES);
        drop(doc);
        self.context.clear_font();
    }

    async fn read_snapshot(&self) -> StyleSnapshot {
        match self.store.get(StorageArea::Sync, &keys::THEME_GROUP).await {
            Ok(items) => StyleSnapshot {
                font_size: parse_field(&items, keys::FONT_SIZE),
                font_weight: parse_field(&items, keys::FONT_WEIGHT),
                theme_mode: parse_field(&items, keys::THEME_MODE),
            },
            Err(e) => {
                warn!(error = ?e, "Failed to snapshot font and theme");
                StyleSnapshot::default()
            }
        }
    }

    /// Snapshot font and theme, persist the disabled state, then strip the page.
    pub async fn remove_all_styles(&self) -> StoreResult<()> {
        if !self.context.is_active() {
            return Ok(());
        }
        let snapshot = self.read_snapshot().await;
        self.context.set_snapshot(snapshot);

        let mut items = Map::new();
        items.insert(keys::STYLES_ENABLED.to_string(), Value::Bool(false));
        items.insert(keys::IFRAME_VISIBLE.to_string(), Value::Bool(false));
        let written = self.store.set(StorageArea::Sync, items).await;
        if let Err(e) = &written {
            error!(error = ?e, "Failed to persist disabled state");
        }

        if !self.context.is_active() {
            return written;
        }
        self.strip_document();
        info!("All styles removed");
        written
    }

    /// Strip the page, persist the default record, then apply the defaults.
    pub async fn reset_all_styles(&self) -> StoreResult<()> {
        if !self.context.is_active() {
            return Ok(());
        }
        self.strip_document();

        let written = controllers::reset_to_defaults(self.store.as_ref()).await;
        if let Err(e) = &written {
            error!(error = ?e, "Failed to persist default settings");
        }
        if !self.context.is_active() {
            return written;
        }

        let defaults = SettingsRecord::default();
        self.apply_theme(&ThemePayload {
            font_size: defaults.font_size,
            font_weight: defaults.font_weight,
            theme_mode: defaults.theme_mode,
        });
        let cursor = self.assets.cursor_settings(CursorPreferences {
            enabled: defaults.is_cursor_enabled,
            theme: defaults.cursor_theme,
            size: defaults.cursor_size,
        });
        self.apply_cursor_settings(&cursor);
        info!("Styles reset to defaults");
        written
    }

    /// Persist the enabled state, then re-apply the stored font, theme and cursor.
    ///
    /// Fields missing from the store fall back to the snapshot taken when the
    /// page was last disabled.
    pub async fn restore_all_styles(&self) -> StoreResult<()> {
        if !self.context.is_active() {
            return Ok(());
        }
        let mut items = Map::new();
        items.insert(keys::STYLES_ENABLED.to_string(), Value::Bool(true));
        if let Err(e) = self.store.set(StorageArea::Sync, items).await {
            error!(error = ?e, "Failed to persist enabled state");
            return Err(e);
        }

        let stored = self.read_snapshot().await;
        if !self.context.is_active() {
            return Ok(());
        }
        let snapshot = self.context.snapshot();
        let font_size = stored.font_size.or(snapshot.font_size);
        let font_weight = stored.font_weight.or(snapshot.font_weight);
        let theme_mode = stored.theme_mode.or(snapshot.theme_mode);

        if let Some(mode) = theme_mode {
            self.apply_mode_style(mode);
        }
        if font_size.is_some() || font_weight.is_some() {
            self.apply_font_style(FontStyle {
                font_size,
                font_weight,
            });
        }

        match self.runtime.send_message(json!({ "type": "GET_CURSOR_SETTINGS" })).await {
            Ok(response) => match serde_json::from_value::<CursorSettings>(response) {
                Ok(settings) if settings.is_cursor_enabled && settings.cursor_url.is_some() => {
                    self.apply_cursor_settings(&settings);
                }
                Ok(_) => debug!("Cursor disabled, nothing to restore"),
                Err(e) => warn!(error = %e, "Unexpected cursor settings reply"),
            },
            Err(e) => warn!(error = %e, "Could not ask background for cursor settings"),
        }
        info!("All styles restored");
        Ok(())
    }
}
