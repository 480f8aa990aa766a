//! Requests answered by a page rather than by the background itself.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::background::BackgroundServices;
use crate::background::messaging::{ContextError, MessageSender};
use crate::protocol::{Ack, PageControl, PageMessage, ProductTitle, VendorHtml};
use crate::settings::models::{StorageArea, local_keys};

async fn send_to_active_tab(services: &BackgroundServices, message: PageControl) -> Result<Value, ContextError> {
    let tab = services.tabs.active_tab().await.ok_or(ContextError::NoActiveTab)?;
    services
        .tabs
        .send_to_tab(tab.id, PageMessage::from(message).to_value())
        .await
}

/// Relay `PAGE_TYPE` / `CART_PAGE` to the active tab and return its answer.
pub async fn proxy_to_active_tab(services: BackgroundServices, message: PageControl) -> Value {
    match send_to_active_tab(&services, message).await {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "Active tab did not answer proxied message");
            Ack::failed(e.to_string()).to_value()
        }
    }
}

pub async fn product_title(services: BackgroundServices) -> Value {
    let fallback = || serde_json::to_value(ProductTitle::default()).unwrap_or(Value::Null);

    match send_to_active_tab(&services, PageControl::GetProductTitle).await {
        Ok(response) if response.get("title").is_some() => response,
        Ok(response) => {
            warn!(response = %response, "Title request answered without a title, using empty title");
            fallback()
        }
        Err(e) => {
            warn!(error = %e, "Title request failed, using empty title");
            fallback()
        }
    }
}

/// Ask the sender's own tab for the vendor block of its product page.
pub async fn vendor_html(services: BackgroundServices, sender: MessageSender) -> Value {
    let fallback = || serde_json::to_value(VendorHtml::default()).unwrap_or(Value::Null);

    let Some(tab_id) = sender.tab_id() else {
        warn!("Vendor html requested outside of a tab, using empty html");
        return fallback();
    };

    let message = PageMessage::from(PageControl::GetVendorHtml).to_value();
    match services.tabs.send_to_tab(tab_id, message).await {
        Ok(response) => response,
        Err(e) => {
            warn!(tab_id, error = %e, "Vendor html request failed, using empty html");
            fallback()
        }
    }
}

/// Persist the cart contents, then tell the active tab without waiting on it.
pub async fn cart_items_updated(services: BackgroundServices, data: Value) -> Value {
    let mut items = Map::new();
    items.insert(local_keys::CART_ITEMS.to_string(), data.clone());

    if let Err(e) = services.store.set(StorageArea::Local, items).await {
        warn!(error = ?e, "Failed to store cart items");
        return Ack::failed(e.to_string()).to_value();
    }

    if let Err(e) = send_to_active_tab(&services, PageControl::CartItemsUpdated { data }).await {
        debug!(error = %e, "Cart update notification not delivered");
    }
    Ack::ok().to_value()
}
