use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::settings::models::{CursorSize, CursorTheme, FontSize, FontWeight, ThemeMode};

/// Complete theme view carried by `THEME_UPDATE`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemePayload {
    #[serde(default)]
    pub font_size: FontSize,
    #[serde(default)]
    pub font_weight: FontWeight,
    #[serde(default)]
    pub theme_mode: ThemeMode,
}

/// Cursor state as pages apply it. `cursor_url` is only set when the cursor is enabled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorSettings {
    #[serde(default)]
    pub is_cursor_enabled: bool,
    #[serde(default)]
    pub cursor_url: Option<String>,
}

/// Answer to `GET_SETTINGS`: everything the background cache knows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
    pub font_size: FontSize,
    pub font_weight: FontWeight,
    pub theme_mode: ThemeMode,
    pub is_cursor_enabled: bool,
    pub cursor_size: CursorSize,
    pub cursor_theme: CursorTheme,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTitle {
    #[serde(default)]
    pub title: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorHtml {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub product_id: String,
}

impl VendorHtml {
    /// Both the seller markup and the product id were found on the page.
    pub fn is_complete(&self) -> bool {
        !self.html.trim().is_empty() && !self.product_id.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAnalysisRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineInfoRequest {
    #[serde(default)]
    pub outline: String,
    #[serde(default)]
    pub html: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmeticRequest {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub html: String,
}

/// Review data scraped from a product page. Rating and review shapes vary
/// between page layouts, so they are forwarded untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummaryRequest {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub review_rating: Value,
    #[serde(default)]
    pub reviews: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDataRequest {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub birth_year: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
}

/// A review summary as returned by the backend. Deserializing it is the shape check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub total_count: u64,
    pub average_rating: f64,
    pub positive_reviews: Vec<String>,
    pub negative_reviews: Vec<String>,
    pub keywords: Vec<String>,
}
