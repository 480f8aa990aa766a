//! Settings commands. They only write the store; tabs hear about the result
//! from the change propagator.

use serde_json::Value;
use tracing::{error, warn};

use crate::background::BackgroundServices;
use crate::protocol::{Ack, StyleCommand};
use crate::settings::controllers;
use crate::settings::models::SettingsPatch;
use crate::settings::repositories::StoreResult;

fn ack(result: StoreResult<()>, what: &str) -> Value {
    match result {
        Ok(()) => Ack::ok().to_value(),
        Err(e) => {
            error!(error = ?e, command = what, "Settings write failed");
            Ack::failed(e.to_string()).to_value()
        }
    }
}

pub async fn style_command(services: BackgroundServices, command: StyleCommand) -> Value {
    let result = controllers::apply_style_command(services.store.as_ref(), command).await;
    ack(result, command.tag())
}

pub async fn update_settings(services: BackgroundServices, patch: SettingsPatch) -> Value {
    let result = controllers::update_settings(services.store.as_ref(), &patch).await;
    ack(result, "UPDATE_SETTINGS")
}

pub async fn reset_settings(services: BackgroundServices) -> Value {
    let result = controllers::reset_to_defaults(services.store.as_ref()).await;
    ack(result, "RESET_SETTINGS")
}

pub async fn toggle_all_styles(services: BackgroundServices) -> Value {
    match controllers::toggle_styles(services.store.as_ref()).await {
        Ok(enabled) => {
            let mut reply = Ack::ok().to_value();
            reply["stylesEnabled"] = Value::Bool(enabled);
            reply
        }
        Err(e) => {
            error!(error = ?e, "Failed to toggle styles");
            Ack::failed(e.to_string()).to_value()
        }
    }
}

/// Cursor state as cached by the background, with the packaged image url.
pub fn cursor_settings(services: &BackgroundServices) -> Value {
    let preferences = services.cache.read().cursor_preferences();
    let settings = services.assets.cursor_settings(preferences);
    serde_json::to_value(settings).unwrap_or_else(|e| {
        warn!(error = ?e, "Failed to encode cursor settings");
        Value::Null
    })
}

pub fn settings_snapshot(services: &BackgroundServices) -> Value {
    let snapshot = services.cache.read().snapshot();
    serde_json::to_value(snapshot).unwrap_or_else(|e| {
        warn!(error = ?e, "Failed to encode settings snapshot");
        Value::Null
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::test_support::services_with_tabs;
    use crate::settings::models::{CursorTheme, FontSize, StorageArea, keys};
    use serde_json::json;

    #[tokio::test]
    async fn test_style_command_writes_store_only() {
        let (services, _tabs) = services_with_tabs("http://127.0.0.1:9");
        let reply = style_command(services.clone(), StyleCommand::FontSize(FontSize::Xl)).await;
        assert_eq!(reply, json!({ "success": true }));

        let stored = services.store.get(StorageArea::Sync, &[keys::FONT_SIZE]).await.unwrap();
        assert_eq!(stored[keys::FONT_SIZE], "xl");
        // The cache is the propagator's to update.
        assert!(services.cache.read().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_reports_new_state() {
        let (services, _tabs) = services_with_tabs("http://127.0.0.1:9");
        let reply = toggle_all_styles(services.clone()).await;
        assert_eq!(reply, json!({ "success": true, "stylesEnabled": false }));
    }

    #[test]
    fn test_cursor_settings_from_cache() {
        let (services, _tabs) = services_with_tabs("http://127.0.0.1:9");
        services.cache.write().set_cursor_theme(CursorTheme::Black);

        let value = cursor_settings(&services);
        assert_eq!(value["isCursorEnabled"], true);
        assert_eq!(
            value["cursorUrl"],
            "chrome-extension://a11y-bridge/images/cursors/black_medium.png"
        );
    }
}
