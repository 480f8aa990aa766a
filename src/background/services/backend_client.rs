//! HTTP client for the inference backend.
//!
//! Every endpoint takes a JSON POST and answers `{ "data": ... }`. Failures
//! are surfaced once; nothing here retries.

use std::time::Duration;

use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::protocol::{
    CosmeticRequest, FoodReply, HealthDataRequest, ImageAnalysisRequest, ReviewSummaryRequest,
};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    Transport(String),

    /// Non-2xx answer. The message comes from the body's `message` field when present.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Invalid JSON response: {0}")]
    Decode(String),

    #[error("Unexpected response shape: {0}")]
    Shape(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Transport(e.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> BackendResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("a11y-bridge/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post(&self, path: &str, body: &Value) -> BackendResult<reqwest::Response> {
        let url = self.endpoint(path);
        debug!(url = %url, "POST to backend");
        let response = self.client.post(&url).json(body).send().await.map_err(|e| {
            error!(url = %url, error = ?e, "Backend request failed");
            BackendError::from(e)
        })?;
        Ok(response)
    }

    /// POST and return the `data` field of a successful answer.
    async fn post_for_data(&self, path: &str, body: &Value) -> BackendResult<Value> {
        let response = self.post(path, body).await?;
        let status = response.status();

        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            warn!(path, status = status.as_u16(), message = %message, "Backend returned an error status");
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        match body.get("data") {
            Some(data) if !data.is_null() => Ok(data.clone()),
            _ => {
                warn!(path, "Backend response has no data field");
                Err(BackendError::Shape("response carries no data".into()))
            }
        }
    }

    /// Food lookups keep the raw status in the reply instead of failing.
    pub async fn food(&self, payload: Map<String, Value>) -> FoodReply {
        let response = match self.post("products/foods", &Value::Object(payload)).await {
            Ok(response) => response,
            Err(e) => {
                return FoodReply::Error {
                    status: 500,
                    error: e.to_string(),
                };
            }
        };

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<Value>(&text) {
            Ok(json) if (200..300).contains(&status) => FoodReply::Data { status: 200, data: json },
            Ok(json) => FoodReply::Error {
                status,
                error: json
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Request failed")
                    .to_string(),
            },
            Err(e) => {
                error!(status, error = %e, "Failed to parse food response");
                FoodReply::Error {
                    status,
                    error: "JSON parse failure".to_string(),
                }
            }
        }
    }

    pub async fn image_analysis(&self, request: &ImageAnalysisRequest) -> BackendResult<Value> {
        self.post_for_data("image-analysis", &json!({ "url": request.url }))
            .await
    }

    pub async fn outline_info(&self, outline: &str, html: &str, product_id: &str) -> BackendResult<Value> {
        if outline.is_empty() {
            return Err(BackendError::Shape("outline category is missing".into()));
        }
        self.post_for_data(
            &format!("product-detail/{outline}"),
            &json!({ "html": html, "productId": product_id }),
        )
        .await
    }

    pub async fn cosmetic(&self, request: &CosmeticRequest) -> BackendResult<Value> {
        let data = self
            .post_for_data(
                "cosmetic",
                &json!({ "productId": request.product_id, "html": request.html }),
            )
            .await?;
        if !data.is_object() {
            warn!(data = %data, "Cosmetic response data is not an object");
            return Err(BackendError::Shape("API response format error".into()));
        }
        Ok(data)
    }

    pub async fn review_summary(&self, request: &ReviewSummaryRequest) -> BackendResult<Value> {
        let body = serde_json::to_value(request).map_err(|e| BackendError::Decode(e.to_string()))?;
        self.post_for_data("review/summary", &body).await
    }

    pub async fn health_keywords(&self, request: &HealthDataRequest) -> BackendResult<Value> {
        let body = serde_json::to_value(request).map_err(|e| BackendError::Decode(e.to_string()))?;
        self.post_for_data("health-food/keywords", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> BackendClient {
        BackendClient::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_health_keywords_returns_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/health-food/keywords"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": ["IMMUNE", "SKIN"] })))
            .expect(1)
            .mount(&server)
            .await;

        let request = HealthDataRequest {
            product_id: "123".into(),
            birth_year: Some(1990),
            gender: Some("male".into()),
            ..Default::default()
        };
        let data = client(&server).health_keywords(&request).await.unwrap();
        assert_eq!(data, json!(["IMMUNE", "SKIN"]));
    }

    #[tokio::test]
    async fn test_error_status_uses_body_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/review/summary"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "server error" })))
            .mount(&server)
            .await;

        let err = client(&server)
            .review_summary(&ReviewSummaryRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 500, .. }));
        assert_eq!(err.to_string(), "server error");
    }

    #[tokio::test]
    async fn test_error_status_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/image-analysis"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server)
            .image_analysis(&ImageAnalysisRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP error! status: 404");
    }

    #[tokio::test]
    async fn test_missing_data_is_shape_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/review/summary"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .mount(&server)
            .await;

        let err = client(&server)
            .review_summary(&ReviewSummaryRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Shape(_)));
    }

    #[tokio::test]
    async fn test_cosmetic_requires_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cosmetic"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": "nope" })))
            .mount(&server)
            .await;

        let err = client(&server)
            .cosmetic(&CosmeticRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unexpected response shape: API response format error");
    }

    #[tokio::test]
    async fn test_outline_posts_to_category_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/product-detail/MAIN"))
            .and(body_json(json!({ "html": "<p/>", "productId": "42" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "summary": "s" } })))
            .expect(1)
            .mount(&server)
            .await;

        let data = client(&server).outline_info("MAIN", "<p/>", "42").await.unwrap();
        assert_eq!(data, json!({ "summary": "s" }));
    }

    #[tokio::test]
    async fn test_food_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/products/foods"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({ "message": "bad product" })))
            .mount(&server)
            .await;

        let reply = client(&server).food(Map::new()).await;
        assert_eq!(
            reply,
            FoodReply::Error {
                status: 422,
                error: "bad product".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_food_success_wraps_whole_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/products/foods"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "allergens": [] } })))
            .mount(&server)
            .await;

        let reply = client(&server).food(Map::new()).await;
        assert_eq!(
            reply,
            FoodReply::Data {
                status: 200,
                data: json!({ "data": { "allergens": [] } }),
            }
        );
    }
}
