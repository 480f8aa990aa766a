use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::settings_record::{
    CursorSize, CursorTheme, FontSize, FontWeight, SettingsRecord, ThemeMode,
};
use crate::protocol::{SettingsSnapshot, ThemePayload};

/// Background-resident mirror of the theme and cursor settings.
///
/// Written only by the change propagator. Every field starts out `None` after
/// a restart; readers get defaults for anything not yet observed. Fields are
/// updated one at a time, so a reader may briefly see a new font size next to
/// an old font weight.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingsCache {
    font_size: Option<FontSize>,
    font_weight: Option<FontWeight>,
    theme_mode: Option<ThemeMode>,
    cursor_theme: Option<CursorTheme>,
    cursor_size: Option<CursorSize>,
    cursor_enabled: Option<bool>,
}

pub type SharedSettingsCache = Arc<RwLock<SettingsCache>>;

/// Cursor part of the cache, with defaults applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorPreferences {
    pub enabled: bool,
    pub theme: CursorTheme,
    pub size: CursorSize,
}

impl SettingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedSettingsCache {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Seed every field from a full store read.
    pub fn populate(&mut self, record: &SettingsRecord) {
        self.font_size = Some(record.font_size);
        self.font_weight = Some(record.font_weight);
        self.theme_mode = Some(record.theme_mode);
        self.cursor_theme = Some(record.cursor_theme);
        self.cursor_size = Some(record.cursor_size);
        self.cursor_enabled = Some(record.is_cursor_enabled);
        debug!(?record, "Settings cache populated");
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn set_font_size(&mut self, size: FontSize) {
        debug!(?size, "Cached font size");
        self.font_size = Some(size);
    }

    pub fn set_font_weight(&mut self, weight: FontWeight) {
        debug!(?weight, "Cached font weight");
        self.font_weight = Some(weight);
    }

    pub fn set_theme(&mut self, mode: ThemeMode) {
        debug!(?mode, "Cached theme mode");
        self.theme_mode = Some(mode);
    }

    pub fn set_cursor_theme(&mut self, theme: CursorTheme) {
        self.cursor_theme = Some(theme);
    }

    pub fn set_cursor_size(&mut self, size: CursorSize) {
        self.cursor_size = Some(size);
    }

    pub fn set_cursor_enabled(&mut self, enabled: bool) {
        self.cursor_enabled = Some(enabled);
    }

    pub fn font_size(&self) -> FontSize {
        self.font_size.unwrap_or_default()
    }

    pub fn font_weight(&self) -> FontWeight {
        self.font_weight.unwrap_or_default()
    }

    pub fn theme_mode(&self) -> ThemeMode {
        self.theme_mode.unwrap_or_default()
    }

    pub fn cursor_theme(&self) -> CursorTheme {
        self.cursor_theme.unwrap_or_default()
    }

    pub fn cursor_size(&self) -> CursorSize {
        self.cursor_size.unwrap_or_default()
    }

    pub fn cursor_enabled(&self) -> bool {
        self.cursor_enabled
            .unwrap_or(SettingsRecord::default().is_cursor_enabled)
    }

    pub fn cursor_preferences(&self) -> CursorPreferences {
        CursorPreferences {
            enabled: self.cursor_enabled(),
            theme: self.cursor_theme(),
            size: self.cursor_size(),
        }
    }

    /// Full theme view, read at call time.
    pub fn theme_payload(&self) -> ThemePayload {
        ThemePayload {
            font_size: self.font_size(),
            font_weight: self.font_weight(),
            theme_mode: self.theme_mode(),
        }
    }

    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            font_size: self.font_size(),
            font_weight: self.font_weight(),
            theme_mode: self.theme_mode(),
            is_cursor_enabled: self.cursor_enabled(),
            cursor_size: self.cursor_size(),
            cursor_theme: self.cursor_theme(),
        }
    }
}
