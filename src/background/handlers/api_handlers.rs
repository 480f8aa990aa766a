//! Requests relayed to the inference backend.
//!
//! Every reply goes back to the caller and, when the request came from a
//! page, also to that page's tab so a separately listening panel sees it.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::background::BackgroundServices;
use crate::background::messaging::MessageSender;
use crate::background::services::BackendResult;
use crate::protocol::{
    ApiKind, ApiReply, CosmeticRequest, FoodReply, HealthDataRequest, ImageAnalysisRequest,
    OutlineInfoRequest, ReviewSummaryRequest,
};

static PRODUCT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"vp/products/(\d+)").expect("product id pattern is valid"));

const NO_PRODUCT_PAGE: &str = "Product page not found";
const NO_PRODUCT_ID: &str = "Product id not found";

/// Product id of a product page url.
pub fn product_id_from_url(url: &str) -> Option<&str> {
    PRODUCT_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Product id of the active tab, or the error to answer with.
async fn active_product_id(services: &BackgroundServices) -> Result<String, &'static str> {
    let tab = services.tabs.active_tab().await.ok_or(NO_PRODUCT_PAGE)?;
    if tab.url.is_empty() {
        return Err(NO_PRODUCT_PAGE);
    }
    product_id_from_url(&tab.url)
        .map(str::to_string)
        .ok_or(NO_PRODUCT_ID)
}

fn to_reply(kind: ApiKind, result: BackendResult<Value>) -> ApiReply {
    match result {
        Ok(data) => ApiReply::data(kind, data),
        Err(e) => ApiReply::error(kind, e.to_string()),
    }
}

/// Send the reply to the sender's tab too, then hand it back for the caller.
async fn deliver(services: &BackgroundServices, sender: &MessageSender, reply: ApiReply) -> Value {
    let value = reply.to_value();
    if let Some(tab_id) = sender.tab_id()
        && let Err(e) = services.tabs.send_to_tab(tab_id, value.clone()).await
    {
        debug!(tab_id, error = %e, "Reply not delivered to originating tab");
    }
    value
}

pub async fn fetch_food_data(services: BackgroundServices, mut payload: Map<String, Value>) -> Value {
    let product_id = match active_product_id(&services).await {
        Ok(id) => id,
        Err(error) => {
            return FoodReply::Error {
                status: 400,
                error: error.to_string(),
            }
            .to_value();
        }
    };
    payload.insert("productId".to_string(), Value::String(product_id));
    services.backend.food(payload).await.to_value()
}

pub async fn fetch_image_analysis(
    services: BackgroundServices,
    sender: MessageSender,
    request: ImageAnalysisRequest,
) -> Value {
    let result = services.backend.image_analysis(&request).await;
    deliver(&services, &sender, to_reply(ApiKind::ImageAnalysis, result)).await
}

pub async fn fetch_outline_info(
    services: BackgroundServices,
    sender: MessageSender,
    request: OutlineInfoRequest,
) -> Value {
    let product_id = match active_product_id(&services).await {
        Ok(id) => id,
        Err(error) => return ApiReply::error(ApiKind::OutlineInfo, error).to_value(),
    };
    let result = services
        .backend
        .outline_info(&request.outline, &request.html, &product_id)
        .await;
    deliver(&services, &sender, to_reply(ApiKind::OutlineInfo, result)).await
}

pub async fn fetch_cosmetic_data(
    services: BackgroundServices,
    sender: MessageSender,
    request: CosmeticRequest,
) -> Value {
    let result = services.backend.cosmetic(&request).await;
    deliver(&services, &sender, to_reply(ApiKind::CosmeticData, result)).await
}

pub async fn fetch_review_summary(
    services: BackgroundServices,
    sender: MessageSender,
    request: ReviewSummaryRequest,
) -> Value {
    info!(product_id = %request.product_id, "Requesting review summary");
    let result = services.backend.review_summary(&request).await;
    deliver(&services, &sender, to_reply(ApiKind::ReviewSummary, result)).await
}

pub async fn fetch_health_data(
    services: BackgroundServices,
    sender: MessageSender,
    request: HealthDataRequest,
) -> Value {
    let result = services.backend.health_keywords(&request).await;
    deliver(&services, &sender, to_reply(ApiKind::HealthData, result)).await
}
