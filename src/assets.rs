use crate::protocol::CursorSettings;
use crate::settings::models::{CursorPreferences, CursorSize, CursorTheme};

const OVERLAY_DOCUMENT: &str = "iframe.html";

/// Resolves files packaged with the extension: cursor images and the overlay document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionAssets {
    base_url: String,
}

impl ExtensionAssets {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn cursor_url(&self, theme: CursorTheme, size: CursorSize) -> String {
        self.url(&format!(
            "images/cursors/{}_{}.png",
            theme.as_str(),
            size.as_str()
        ))
    }

    /// What pages should apply for the given preferences. Disabled cursors carry no url.
    pub fn cursor_settings(&self, preferences: CursorPreferences) -> CursorSettings {
        CursorSettings {
            is_cursor_enabled: preferences.enabled,
            cursor_url: preferences
                .enabled
                .then(|| self.cursor_url(preferences.theme, preferences.size)),
        }
    }

    pub fn overlay_document_url(&self) -> String {
        self.url(OVERLAY_DOCUMENT)
    }
}
