//! Lifecycle of the floating overlay frame on one page.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::document::{InlineStyle, PageDocument, SharedDocument, WindowEvent};
use super::page_context::PageContext;
use super::styles::{OVERLAY_BASE_STYLE, OVERLAY_FRAME_ID, overlay_geometry};
use crate::assets::ExtensionAssets;
use crate::protocol::FrameMessage;
use crate::settings::models::settings_record::parse_field;
use crate::settings::models::{StorageArea, local_keys};
use crate::settings::repositories::SettingsStore;

/// Why the overlay was last hidden by a keyboard toggle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayHiddenReason {
    #[default]
    None,
    /// Removed by the overlay toggle (`toggle_iframe`).
    HiddenByToggleA,
    /// Removed by the sidebar toggle (`toggle_sidebar`).
    HiddenByToggleV,
}

#[derive(Clone)]
pub struct OverlayManager {
    document: SharedDocument,
    context: Arc<PageContext>,
    store: Arc<dyn SettingsStore>,
    assets: ExtensionAssets,
}

impl OverlayManager {
    pub fn new(
        document: SharedDocument,
        context: Arc<PageContext>,
        store: Arc<dyn SettingsStore>,
        assets: ExtensionAssets,
    ) -> Self {
        Self {
            document,
            context,
            store,
            assets,
        }
    }

    pub fn is_present(&self) -> bool {
        self.document.lock().frame(OVERLAY_FRAME_ID).is_some()
    }

    pub fn is_expanded(&self) -> bool {
        self.document
            .lock()
            .frame(OVERLAY_FRAME_ID)
            .is_some_and(|frame| frame.style.get("width") == Some("100%"))
    }

    /// Append the frame, collapsed, and re-register the resize listener.
    /// No-op when the frame already exists.
    pub fn create(&self) {
        if !self.context.is_active() || self.is_present() {
            return;
        }

        let mut style = InlineStyle::default();
        for (property, value) in OVERLAY_BASE_STYLE.iter().chain(overlay_geometry(false).iter()) {
            style.set(property, *value);
        }

        let mut doc = self.document.lock();
        let window = doc.append_frame(OVERLAY_FRAME_ID, self.assets.overlay_document_url(), style);

        let listener = doc.add_window_listener(Arc::new(move |doc: &mut PageDocument, event: &WindowEvent| {
            if event.source != Some(window) {
                return;
            }
            if let Ok(FrameMessage::ResizeIframe { is_open }) = serde_json::from_value(event.data.clone())
                && let Some(frame) = doc.frame_mut(OVERLAY_FRAME_ID)
            {
                for (property, value) in overlay_geometry(is_open) {
                    frame.style.set(property, value);
                }
            }
        }));

        if let Some(previous) = self.context.replace_overlay_listener(Some(listener)) {
            doc.remove_window_listener(previous);
        }
        debug!(window, "Overlay frame created");
    }

    /// Remove the frame and its resize listener. Returns whether it was present.
    pub fn remove(&self) -> bool {
        let mut doc = self.document.lock();
        if let Some(listener) = self.context.replace_overlay_listener(None) {
            doc.remove_window_listener(listener);
        }
        let removed = doc.remove_frame(OVERLAY_FRAME_ID).is_some();
        if removed {
            debug!("Overlay frame removed");
        }
        removed
    }

    fn post_toggle_sidebar(&self) {
        let message = serde_json::to_value(FrameMessage::ToggleSidebar).unwrap_or(Value::Null);
        self.document.lock().post_to_frame(OVERLAY_FRAME_ID, message);
    }

    pub async fn hidden_reason(&self) -> OverlayHiddenReason {
        match self
            .store
            .get(StorageArea::Local, &[local_keys::OVERLAY_HIDDEN_REASON])
            .await
        {
            Ok(items) => parse_field(&items, local_keys::OVERLAY_HIDDEN_REASON).unwrap_or_default(),
            Err(e) => {
                warn!(error = ?e, "Failed to read overlay hidden reason");
                OverlayHiddenReason::None
            }
        }
    }

    async fn set_hidden_reason(&self, reason: OverlayHiddenReason) {
        let mut items = Map::new();
        items.insert(
            local_keys::OVERLAY_HIDDEN_REASON.to_string(),
            serde_json::to_value(reason).unwrap_or(Value::Null),
        );
        if let Err(e) = self.store.set(StorageArea::Local, items).await {
            warn!(error = ?e, ?reason, "Failed to store overlay hidden reason");
        }
    }

    /// `toggle_iframe`: remove when present, create collapsed when absent.
    pub async fn toggle_overlay(&self) {
        if !self.context.is_active() {
            return;
        }
        if self.remove() {
            self.set_hidden_reason(OverlayHiddenReason::HiddenByToggleA).await;
            info!("Overlay hidden by toggle");
        } else {
            self.create();
            self.set_hidden_reason(OverlayHiddenReason::None).await;
            info!("Overlay shown by toggle");
        }
    }

    /// `toggle_sidebar`: open or close the sidebar. A present frame is handed
    /// to the sidebar toggle, which removes it on the following press. Only a
    /// frame removed that way is recreated.
    pub async fn toggle_sidebar(&self) {
        if !self.context.is_active() {
            return;
        }
        let reason = self.hidden_reason().await;
        if !self.context.is_active() {
            return;
        }

        if !self.is_present() {
            if reason != OverlayHiddenReason::HiddenByToggleV {
                debug!(?reason, "Overlay not hidden by sidebar toggle, ignoring");
                return;
            }
            self.create();
            self.post_toggle_sidebar();
            info!("Overlay reopened by sidebar toggle");
            return;
        }

        self.post_toggle_sidebar();
        if reason == OverlayHiddenReason::HiddenByToggleV {
            self.remove();
            info!("Overlay hidden by sidebar toggle");
        } else {
            self.set_hidden_reason(OverlayHiddenReason::HiddenByToggleV).await;
        }
    }

    /// Show or hide the frame without touching the stored visibility.
    /// Hiding clears the toggle reason so no keyboard toggle brings it back.
    pub async fn set_visible(&self, visible: bool) {
        if visible {
            self.create();
        } else {
            self.remove();
            self.set_hidden_reason(OverlayHiddenReason::None).await;
        }
    }
}
