//! The page's message listener: wires the applicator, the overlay manager and
//! the product requests to messages from the background.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::document::{SharedDocument, WindowId};
use super::overlay_manager::OverlayManager;
use super::page_context::PageContext;
use super::product_requests::{ProductRequests, RequestTimings};
use super::style_applicator::StyleApplicator;
use crate::assets::ExtensionAssets;
use crate::background::handlers::product_id_from_url;
use crate::background::{RuntimeMessenger, TabEndpoint};
use crate::protocol::{
    Ack, KeyboardCommand, PageControl, PageMessage, ProductTitle, StyleCommand, ThemePayload,
    VendorHtml, message_type,
};
use crate::settings::controllers;
use crate::settings::models::settings_record::parse_field;
use crate::settings::models::{SettingsPatch, StorageArea, keys};
use crate::settings::repositories::{BoxFuture, SettingsStore};

const STYLES_DISABLED: &str = "Styles are disabled";

/// One injected page. Cheap to clone; clones share the same context.
#[derive(Clone)]
pub struct PageRuntime {
    document: SharedDocument,
    context: Arc<PageContext>,
    store: Arc<dyn SettingsStore>,
    runtime: Arc<dyn RuntimeMessenger>,
    applicator: StyleApplicator,
    overlay: OverlayManager,
    requests: ProductRequests,
}

impl PageRuntime {
    pub fn new(
        document: SharedDocument,
        store: Arc<dyn SettingsStore>,
        runtime: Arc<dyn RuntimeMessenger>,
        assets: ExtensionAssets,
        timings: RequestTimings,
    ) -> Self {
        let context = Arc::new(PageContext::new());
        let applicator = StyleApplicator::new(
            document.clone(),
            context.clone(),
            store.clone(),
            runtime.clone(),
            assets.clone(),
        );
        let overlay = OverlayManager::new(document.clone(), context.clone(), store.clone(), assets);
        let requests = ProductRequests::new(
            document.clone(),
            context.clone(),
            store.clone(),
            runtime.clone(),
            timings,
        );
        Self {
            document,
            context,
            store,
            runtime,
            applicator,
            overlay,
            requests,
        }
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn context(&self) -> &Arc<PageContext> {
        &self.context
    }

    pub fn overlay(&self) -> &OverlayManager {
        &self.overlay
    }

    pub fn requests(&self) -> &ProductRequests {
        &self.requests
    }

    /// Apply the stored settings to a freshly injected page.
    pub async fn start(&self) {
        let record = self.store.load_settings().await;
        if !self.context.is_active() {
            return;
        }
        if !record.styles_enabled {
            debug!("Styles disabled, leaving page untouched");
            return;
        }

        self.applicator.apply_theme(&ThemePayload {
            font_size: record.font_size,
            font_weight: record.font_weight,
            theme_mode: record.theme_mode,
        });

        match self
            .runtime
            .send_message(json!({ "type": "GET_CURSOR_SETTINGS" }))
            .await
        {
            Ok(reply) => match serde_json::from_value(reply) {
                Ok(settings) => self.applicator.apply_cursor_settings(&settings),
                Err(e) => warn!(error = %e, "Unexpected cursor settings reply"),
            },
            Err(e) => warn!(error = %e, "Could not ask background for cursor settings"),
        }

        if record.iframe_visible {
            self.overlay.create();
        }
        info!(url = %self.document.lock().url(), "Page styles applied");
    }

    /// Navigation away: every pending wait stops and later messages are ignored.
    pub fn teardown(&self) {
        self.overlay.remove();
        self.context.teardown();
    }

    /// A `postMessage` from some window into this page.
    pub fn on_window_message(&self, source: Option<WindowId>, data: Value) {
        if !self.context.is_active() {
            return;
        }
        self.document.lock().post_window_message(source, data);
    }

    async fn styles_enabled(&self) -> bool {
        match self.store.get(StorageArea::Sync, &[keys::STYLES_ENABLED]).await {
            Ok(items) => parse_field(&items, keys::STYLES_ENABLED).unwrap_or(true),
            Err(e) => {
                warn!(error = ?e, "Failed to read styles switch");
                true
            }
        }
    }

    async fn handle_style(&self, command: StyleCommand) -> Value {
        if !self.styles_enabled().await {
            return Ack::failed(STYLES_DISABLED).to_value();
        }
        match command {
            StyleCommand::Mode(mode) => self.applicator.apply_mode_style(mode),
            other => {
                if let Some(font) = other.font_style() {
                    self.applicator.apply_font_style(font);
                }
            }
        }
        match controllers::apply_style_command(self.store.as_ref(), command).await {
            Ok(()) => Ack::ok().to_value(),
            Err(e) => Ack::failed(e.to_string()).to_value(),
        }
    }

    async fn handle_control(&self, control: PageControl) -> Value {
        match control {
            PageControl::ThemeUpdate { payload } => {
                if !self.styles_enabled().await {
                    return Ack::failed(STYLES_DISABLED).to_value();
                }
                self.applicator.apply_theme(&payload);
                Ack::ok().to_value()
            }
            PageControl::UpdateCursor(settings) => {
                if !self.styles_enabled().await {
                    return Ack::failed(STYLES_DISABLED).to_value();
                }
                self.applicator.apply_cursor_settings(&settings);
                Ack::ok().to_value()
            }
            PageControl::DisableAllStyles => {
                let result = self.applicator.remove_all_styles().await;
                self.overlay.set_visible(false).await;
                ack(result)
            }
            PageControl::RestoreAllStyles => {
                let result = self.applicator.restore_all_styles().await;
                let visible = self
                    .store
                    .apply_patch(&SettingsPatch {
                        iframe_visible: Some(true),
                        ..Default::default()
                    })
                    .await;
                self.overlay.set_visible(true).await;
                ack(result.and(visible))
            }
            PageControl::ResetSettings => {
                let result = self.applicator.reset_all_styles().await;
                self.overlay.set_visible(true).await;
                ack(result)
            }
            PageControl::SetIframeVisibility { is_visible } => {
                self.overlay.set_visible(is_visible).await;
                Ack::ok().to_value()
            }
            PageControl::KeyboardCommand { command } => {
                match command {
                    KeyboardCommand::ToggleIframe => self.overlay.toggle_overlay().await,
                    KeyboardCommand::ToggleSidebar => self.overlay.toggle_sidebar().await,
                }
                Ack::ok().to_value()
            }
            PageControl::PageType { value } => {
                debug!(page_type = %value, "Page type reported");
                Ack::ok().to_value()
            }
            PageControl::CartPage { .. } | PageControl::CartItemsUpdated { .. } => Ack::ok().to_value(),
            PageControl::GetProductTitle => {
                let title = self.document.lock().product().title.clone().unwrap_or_default();
                serde_json::to_value(ProductTitle { title }).unwrap_or(Value::Null)
            }
            PageControl::GetVendorHtml => {
                let doc = self.document.lock();
                let vendor = VendorHtml {
                    html: doc.product().vendor_html.clone().unwrap_or_default(),
                    product_id: product_id_from_url(doc.url()).unwrap_or_default().to_string(),
                };
                serde_json::to_value(vendor).unwrap_or(Value::Null)
            }
        }
    }

    async fn handle(&self, message: Value) -> Option<Value> {
        if !self.context.is_active() {
            return None;
        }
        match serde_json::from_value::<PageMessage>(message.clone()) {
            Ok(PageMessage::Style(command)) => Some(self.handle_style(command).await),
            Ok(PageMessage::Control(control)) => Some(self.handle_control(control).await),
            Err(_) => {
                let tag = message_type(&message).unwrap_or_default();
                if tag.ends_with("_RESPONSE") || tag.ends_with("_ERROR") {
                    debug!(tag, "Reply delivered to page");
                    self.context.record_reply(message);
                    Some(Ack::ok().to_value())
                } else {
                    debug!(tag, "Page ignoring unknown message");
                    None
                }
            }
        }
    }
}

fn ack<E: std::fmt::Display>(result: Result<(), E>) -> Value {
    match result {
        Ok(()) => Ack::ok().to_value(),
        Err(e) => Ack::failed(e.to_string()).to_value(),
    }
}

impl TabEndpoint for PageRuntime {
    fn on_message(&self, message: Value) -> BoxFuture<'static, Option<Value>> {
        let page = self.clone();
        Box::pin(async move { page.handle(message).await })
    }
}
