use serde_json::Value;
use tracing::{debug, info, warn};

use super::BackgroundServices;
use super::handlers::{api_handlers, page_handlers, settings_handlers};
use super::messaging::{ContextError, MessageSender};
use crate::protocol::{
    BackgroundMessage, BackgroundRequest, KeyboardCommand, PageControl, PageMessage, message_type,
};
use crate::settings::repositories::BoxFuture;

/// Outcome of routing one inbound message.
pub enum Dispatch {
    /// The message is handled; the future resolves to the single response.
    Handled(BoxFuture<'static, Value>),
    /// No handler for this message; the caller should not wait for a response.
    Unhandled,
}

impl Dispatch {
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled(_))
    }

    /// Await the response, or fail for unhandled messages.
    pub async fn into_response(self, tag: &str) -> Result<Value, ContextError> {
        match self {
            Self::Handled(response) => Ok(response.await),
            Self::Unhandled => Err(ContextError::Unhandled(tag.to_string())),
        }
    }
}

/// Entry point of the background for runtime messages and keyboard commands.
pub struct Router {
    services: BackgroundServices,
}

impl Router {
    pub fn new(services: BackgroundServices) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &BackgroundServices {
        &self.services
    }

    pub fn dispatch(&self, message: Value, sender: MessageSender) -> Dispatch {
        let Some(tag) = message_type(&message).map(str::to_string) else {
            debug!("Ignoring message without a type");
            return Dispatch::Unhandled;
        };

        let parsed = match serde_json::from_value::<BackgroundMessage>(message) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(tag = %tag, error = %e, "No handler for message");
                return Dispatch::Unhandled;
            }
        };

        debug!(tag = %tag, tab_id = ?sender.tab_id(), "Dispatching message");
        let services = self.services.clone();
        let response: BoxFuture<'static, Value> = match parsed {
            BackgroundMessage::Style(command) => {
                Box::pin(settings_handlers::style_command(services, command))
            }
            BackgroundMessage::Request(request) => self.route_request(services, request, sender),
        };
        Dispatch::Handled(response)
    }

    fn route_request(
        &self,
        services: BackgroundServices,
        request: BackgroundRequest,
        sender: MessageSender,
    ) -> BoxFuture<'static, Value> {
        match request {
            BackgroundRequest::PageType { value } => Box::pin(page_handlers::proxy_to_active_tab(
                services,
                PageControl::PageType { value },
            )),
            BackgroundRequest::CartPage { value } => Box::pin(page_handlers::proxy_to_active_tab(
                services,
                PageControl::CartPage { value },
            )),
            BackgroundRequest::CartItemsUpdated { data } => {
                Box::pin(page_handlers::cart_items_updated(services, data))
            }
            BackgroundRequest::FetchFoodData { payload } => {
                Box::pin(api_handlers::fetch_food_data(services, payload))
            }
            BackgroundRequest::FetchImageAnalysis { payload } => {
                Box::pin(api_handlers::fetch_image_analysis(services, sender, payload))
            }
            BackgroundRequest::FetchOutlineInfo { payload } => {
                Box::pin(api_handlers::fetch_outline_info(services, sender, payload))
            }
            BackgroundRequest::FetchCosmeticData { payload } => {
                Box::pin(api_handlers::fetch_cosmetic_data(services, sender, payload))
            }
            BackgroundRequest::FetchReviewSummary { payload } => {
                Box::pin(api_handlers::fetch_review_summary(services, sender, payload))
            }
            BackgroundRequest::FetchHealthData { payload } => {
                Box::pin(api_handlers::fetch_health_data(services, sender, payload))
            }
            BackgroundRequest::FetchVendorHtml => {
                Box::pin(page_handlers::vendor_html(services, sender))
            }
            BackgroundRequest::GetProductTitle => Box::pin(page_handlers::product_title(services)),
            BackgroundRequest::GetCursorSettings => {
                let value = settings_handlers::cursor_settings(&services);
                Box::pin(async move { value })
            }
            BackgroundRequest::GetSettings => {
                let value = settings_handlers::settings_snapshot(&services);
                Box::pin(async move { value })
            }
            BackgroundRequest::UpdateSettings { settings } => {
                Box::pin(settings_handlers::update_settings(services, settings))
            }
            BackgroundRequest::ResetSettings => Box::pin(settings_handlers::reset_settings(services)),
            BackgroundRequest::ToggleAllStyles => {
                Box::pin(settings_handlers::toggle_all_styles(services))
            }
        }
    }

    /// Forward a keyboard shortcut to the active tab. Unknown names are ignored.
    pub async fn on_command(&self, name: &str) -> Result<(), ContextError> {
        let Some(command) = KeyboardCommand::from_name(name) else {
            warn!(command = name, "Unknown keyboard command");
            return Ok(());
        };

        let tab = self
            .services
            .tabs
            .active_tab()
            .await
            .ok_or(ContextError::NoActiveTab)?;
        info!(command = name, tab_id = tab.id, "Forwarding keyboard command");

        let message = PageMessage::from(PageControl::KeyboardCommand { command }).to_value();
        self.services.tabs.send_to_tab(tab.id, message).await?;
        Ok(())
    }
}
