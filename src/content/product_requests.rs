//! Page-side assembly of the health and review-summary requests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::document::SharedDocument;
use super::page_context::PageContext;
use super::wait::{WaitError, sleep_or_cancel, wait_until};
use crate::background::handlers::product_id_from_url;
use crate::background::{ContextError, RuntimeMessenger};
use crate::config::AppConfig;
use crate::protocol::{
    ApiKind, HealthDataRequest, ProductTitle, ReviewSummary, ReviewSummaryRequest, VendorHtml,
};
use crate::settings::models::settings_record::parse_field;
use crate::settings::models::{StorageArea, local_keys};
use crate::settings::repositories::SettingsStore;

const REVIEW_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error, PartialEq)]
pub enum ProductRequestError {
    #[error("Birth year and gender are required")]
    MissingProfile,

    #[error("Not a product page")]
    NotProductPage,

    #[error("Vendor html unavailable: {0}")]
    VendorHtmlUnavailable(WaitError),

    #[error("Review data unavailable: {0}")]
    ReviewDataUnavailable(WaitError),

    #[error("Context error: {0}")]
    ContextError(#[from] ContextError),

    #[error("{0}")]
    BackendError(String),

    #[error("Unexpected response shape: {0}")]
    ShapeError(String),

    #[error("Page context was torn down")]
    Cancelled,
}

/// Retry and wait bounds, taken from [`AppConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestTimings {
    pub vendor_html_attempts: u32,
    pub vendor_html_interval: Duration,
    pub review_wait_timeout: Duration,
    pub review_retry_delay: Duration,
}

impl RequestTimings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            vendor_html_attempts: config.vendor_html_attempts,
            vendor_html_interval: config.vendor_html_interval(),
            review_wait_timeout: config.review_wait_timeout(),
            review_retry_delay: config.review_retry_delay(),
        }
    }

    /// Deadline covering exactly `vendor_html_attempts` attempts.
    fn vendor_html_timeout(&self) -> Duration {
        self.vendor_html_interval * self.vendor_html_attempts.saturating_sub(1)
    }
}

impl Default for RequestTimings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// The user's health profile from the local namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthProfile {
    pub birth_year: u32,
    pub gender: String,
    pub allergies: Vec<String>,
}

#[derive(Clone)]
pub struct ProductRequests {
    document: SharedDocument,
    context: Arc<PageContext>,
    store: Arc<dyn SettingsStore>,
    runtime: Arc<dyn RuntimeMessenger>,
    timings: RequestTimings,
}

impl ProductRequests {
    pub fn new(
        document: SharedDocument,
        context: Arc<PageContext>,
        store: Arc<dyn SettingsStore>,
        runtime: Arc<dyn RuntimeMessenger>,
        timings: RequestTimings,
    ) -> Self {
        Self {
            document,
            context,
            store,
            runtime,
            timings,
        }
    }

    /// `None` unless both birth year and gender are stored.
    pub async fn health_profile(&self) -> Option<HealthProfile> {
        let items = self
            .store
            .get(
                StorageArea::Local,
                &[local_keys::BIRTH_YEAR, local_keys::GENDER, local_keys::ALLERGIES],
            )
            .await
            .map_err(|e| warn!(error = ?e, "Failed to read health profile"))
            .ok()?;

        // Stored as a number or a numeric string.
        let birth_year = match items.get(local_keys::BIRTH_YEAR)? {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }?;
        let gender = parse_field::<String>(&items, local_keys::GENDER).filter(|g| !g.is_empty())?;
        let allergies = parse_field::<Vec<String>>(&items, local_keys::ALLERGIES).unwrap_or_default();

        Some(HealthProfile {
            birth_year,
            gender,
            allergies,
        })
    }

    async fn product_title(&self) -> String {
        match self.runtime.send_message(json!({ "type": "GET_PRODUCT_TITLE" })).await {
            Ok(reply) => serde_json::from_value::<ProductTitle>(reply)
                .map(|t| t.title)
                .unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Title request failed");
                String::new()
            }
        }
    }

    async fn vendor_html(&self) -> Result<VendorHtml, ProductRequestError> {
        let runtime = self.runtime.clone();
        wait_until(
            move || {
                let request = runtime.send_message(json!({ "type": "FETCH_VENDOR_HTML" }));
                async move {
                    let reply = request.await.ok()?;
                    serde_json::from_value::<VendorHtml>(reply)
                        .ok()
                        .filter(VendorHtml::is_complete)
                }
            },
            self.timings.vendor_html_interval,
            self.timings.vendor_html_timeout(),
            self.context.token(),
        )
        .await
        .map_err(ProductRequestError::VendorHtmlUnavailable)
    }

    /// Collect profile, title and vendor html, then ask the backend for
    /// health keywords. Returns the `HEALTH_DATA_RESPONSE` data.
    pub async fn request_health_data(&self) -> Result<Value, ProductRequestError> {
        let profile = self
            .health_profile()
            .await
            .ok_or(ProductRequestError::MissingProfile)?;
        let title = self.product_title().await;
        let vendor = self.vendor_html().await?;
        if !self.context.is_active() {
            return Err(ProductRequestError::Cancelled);
        }

        let request = HealthDataRequest {
            product_id: vendor.product_id,
            title,
            html: vendor.html,
            birth_year: Some(profile.birth_year),
            gender: Some(profile.gender),
            allergies: profile.allergies,
        };
        info!(product_id = %request.product_id, "Requesting health keywords");
        let reply = self
            .runtime
            .send_message(json!({ "type": "FETCH_HEALTH_DATA", "payload": request }))
            .await?;
        api_data(ApiKind::HealthData, reply)
    }

    async fn cached_summary(&self, key: &str) -> Option<ReviewSummary> {
        let items = self.store.get(StorageArea::Local, &[key]).await.ok()?;
        parse_field::<ReviewSummary>(&items, key)
    }

    async fn store_summary(&self, key: &str, summary: &ReviewSummary) {
        let Ok(value) = serde_json::to_value(summary) else {
            return;
        };
        let mut items = Map::new();
        items.insert(key.to_string(), value);
        if let Err(e) = self.store.set(StorageArea::Local, items).await {
            warn!(error = ?e, key, "Failed to cache review summary");
        }
    }

    async fn fetch_summary(&self, request: &ReviewSummaryRequest) -> Result<ReviewSummary, ProductRequestError> {
        let reply = self
            .runtime
            .send_message(json!({ "type": "FETCH_REVIEW_SUMMARY", "payload": request }))
            .await?;
        let data = api_data(ApiKind::ReviewSummary, reply)?;
        serde_json::from_value(data).map_err(|e| ProductRequestError::ShapeError(e.to_string()))
    }

    /// Review summary of this product page, from the local cache when present.
    ///
    /// Waits for the scraped review data, then asks the backend; a failed
    /// request is retried once after the configured delay.
    pub async fn request_review_summary(&self) -> Result<ReviewSummary, ProductRequestError> {
        let url = self.document.lock().url().to_string();
        let product_id = product_id_from_url(&url)
            .ok_or(ProductRequestError::NotProductPage)?
            .to_string();
        let cache_key = local_keys::review_summary(&product_id);

        if let Some(summary) = self.cached_summary(&cache_key).await {
            debug!(product_id = %product_id, "Review summary served from cache");
            return Ok(summary);
        }

        let document = self.document.clone();
        let payload = wait_until(
            move || {
                let payload = document.lock().product().review_payload.clone();
                async move { payload }
            },
            REVIEW_POLL_INTERVAL,
            self.timings.review_wait_timeout,
            self.context.token(),
        )
        .await
        .map_err(ProductRequestError::ReviewDataUnavailable)?;

        let request = ReviewSummaryRequest {
            product_id: product_id.clone(),
            review_rating: payload.get("reviewRating").cloned().unwrap_or(Value::Null),
            reviews: payload.get("reviews").cloned().unwrap_or(Value::Null),
        };

        let summary = match self.fetch_summary(&request).await {
            Ok(summary) => summary,
            Err(first) => {
                warn!(product_id = %product_id, error = %first, "Review summary failed, retrying once");
                if !sleep_or_cancel(self.timings.review_retry_delay, self.context.token()).await {
                    return Err(ProductRequestError::Cancelled);
                }
                self.fetch_summary(&request).await?
            }
        };

        self.store_summary(&cache_key, &summary).await;
        Ok(summary)
    }
}

/// `data` of a `<X>_RESPONSE` reply, or the error it carries.
fn api_data(kind: ApiKind, reply: Value) -> Result<Value, ProductRequestError> {
    let tag = reply.get("type").and_then(Value::as_str).unwrap_or_default();
    if tag == kind.error_type() {
        let error = reply
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("Request failed");
        return Err(ProductRequestError::BackendError(error.to_string()));
    }
    if tag != kind.response_type() {
        return Err(ProductRequestError::ShapeError(format!("unexpected reply {reply}")));
    }
    match reply.get("data") {
        Some(data) if !data.is_null() => Ok(data.clone()),
        _ => Err(ProductRequestError::ShapeError("reply carries no data".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::document::PageDocument;
    use crate::content::test_support::ScriptedRuntime;
    use crate::settings::repositories::InMemorySettingsStore;

    fn summary_json() -> Value {
        json!({
            "totalCount": 12,
            "averageRating": 4.5,
            "positiveReviews": ["fresh"],
            "negativeReviews": [],
            "keywords": ["taste"]
        })
    }

    fn requests(
        url: &str,
        runtime: Arc<ScriptedRuntime>,
    ) -> (ProductRequests, SharedDocument, Arc<InMemorySettingsStore>) {
        let document = PageDocument::shared(url);
        let store = Arc::new(InMemorySettingsStore::new());
        let requests = ProductRequests::new(
            document.clone(),
            Arc::new(PageContext::new()),
            store.clone(),
            runtime,
            RequestTimings::default(),
        );
        (requests, document, store)
    }

    async fn store_profile(store: &InMemorySettingsStore) {
        let items = json!({ "birthYear": "1990", "gender": "female", "allergies": ["milk"] });
        store
            .set(StorageArea::Local, items.as_object().cloned().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_health_requires_profile() {
        let runtime = Arc::new(ScriptedRuntime::new());
        let (requests, _doc, _store) = requests("https://shop.example/vp/products/1", runtime.clone());

        assert_eq!(
            requests.request_health_data().await,
            Err(ProductRequestError::MissingProfile)
        );
        assert!(runtime.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_retries_vendor_html() {
        let runtime = Arc::new(ScriptedRuntime::new());
        runtime.reply_to("GET_PRODUCT_TITLE", vec![json!({ "title": "Vitamin C" })]);
        runtime.reply_to(
            "FETCH_VENDOR_HTML",
            vec![
                json!({ "html": "", "productId": "" }),
                json!({ "html": "", "productId": "" }),
                json!({ "html": "<div>vendor</div>", "productId": "1" }),
            ],
        );
        runtime.reply_to(
            "FETCH_HEALTH_DATA",
            vec![json!({ "type": "HEALTH_DATA_RESPONSE", "data": ["IMMUNE"] })],
        );
        let (requests, _doc, store) = requests("https://shop.example/vp/products/1", runtime.clone());
        store_profile(&store).await;

        let data = requests.request_health_data().await.unwrap();
        assert_eq!(data, json!(["IMMUNE"]));

        let sent = runtime.sent();
        let health = sent.iter().find(|m| m["type"] == "FETCH_HEALTH_DATA").unwrap();
        assert_eq!(health["payload"]["birthYear"], 1990);
        assert_eq!(health["payload"]["title"], "Vitamin C");
        assert_eq!(health["payload"]["allergies"], json!(["milk"]));
        assert_eq!(sent.iter().filter(|m| m["type"] == "FETCH_VENDOR_HTML").count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_vendor_html_gives_up_after_attempts() {
        let runtime = Arc::new(ScriptedRuntime::new());
        let (requests, _doc, store) = requests("https://shop.example/vp/products/1", runtime.clone());
        store_profile(&store).await;

        let err = requests.request_health_data().await.unwrap_err();
        assert!(matches!(err, ProductRequestError::VendorHtmlUnavailable(WaitError::TimedOut(_))));
        assert_eq!(
            runtime.sent().iter().filter(|m| m["type"] == "FETCH_VENDOR_HTML").count(),
            10
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_review_summary_retries_once_then_caches() {
        let runtime = Arc::new(ScriptedRuntime::new());
        runtime.reply_to(
            "FETCH_REVIEW_SUMMARY",
            vec![
                json!({ "type": "REVIEW_SUMMARY_ERROR", "error": "server error" }),
                json!({ "type": "REVIEW_SUMMARY_RESPONSE", "data": summary_json() }),
            ],
        );
        let (requests, document, store) = requests("https://shop.example/vp/products/42", runtime.clone());
        document.lock().product_mut().review_payload = Some(json!({
            "reviewRating": { "totalCount": 12, "ratings": [10, 2, 0, 0, 0] },
            "reviews": ["fresh"]
        }));

        let summary = requests.request_review_summary().await.unwrap();
        assert_eq!(summary.total_count, 12);

        let cached = store
            .get(StorageArea::Local, &["review_summary_42"])
            .await
            .unwrap();
        assert_eq!(cached["review_summary_42"], summary_json());

        // Served from the cache now.
        requests.request_review_summary().await.unwrap();
        assert_eq!(
            runtime.sent().iter().filter(|m| m["type"] == "FETCH_REVIEW_SUMMARY").count(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_review_summary_rejects_bad_shape() {
        let runtime = Arc::new(ScriptedRuntime::new());
        runtime.reply_to(
            "FETCH_REVIEW_SUMMARY",
            vec![json!({ "type": "REVIEW_SUMMARY_RESPONSE", "data": { "totalCount": "many" } })],
        );
        let (requests, document, _store) = requests("https://shop.example/vp/products/42", runtime);
        document.lock().product_mut().review_payload = Some(json!({}));

        let err = requests.request_review_summary().await.unwrap_err();
        assert!(matches!(err, ProductRequestError::ShapeError(_)));
    }

    #[tokio::test]
    async fn test_review_summary_needs_product_page() {
        let runtime = Arc::new(ScriptedRuntime::new());
        let (requests, _doc, _store) = requests("https://shop.example/cart", runtime);
        assert_eq!(
            requests.request_review_summary().await,
            Err(ProductRequestError::NotProductPage)
        );
    }
}
