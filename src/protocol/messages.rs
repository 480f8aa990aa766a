use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::payloads::{
    CosmeticRequest, CursorSettings, HealthDataRequest, ImageAnalysisRequest, OutlineInfoRequest,
    ReviewSummaryRequest, ThemePayload,
};
use crate::settings::models::{FontSize, FontStyle, FontWeight, SettingsPatch, ThemeMode};

/// Read the `type` discriminant of a raw message.
pub fn message_type(message: &Value) -> Option<&str> {
    message.get("type").and_then(Value::as_str)
}

/// One of the `SET_FONT_SIZE_*`, `SET_FONT_WEIGHT_*` or `SET_MODE_*` tags.
///
/// On the wire these are bare tags (`{"type": "SET_FONT_SIZE_L"}`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TaggedCommand", into = "TaggedCommand")]
pub enum StyleCommand {
    FontSize(FontSize),
    FontWeight(FontWeight),
    Mode(ThemeMode),
}

impl StyleCommand {
    pub fn from_tag(tag: &str) -> Option<Self> {
        FontSize::from_command(tag)
            .map(Self::FontSize)
            .or_else(|| FontWeight::from_command(tag).map(Self::FontWeight))
            .or_else(|| ThemeMode::from_command(tag).map(Self::Mode))
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::FontSize(size) => size.command(),
            Self::FontWeight(weight) => weight.command(),
            Self::Mode(mode) => mode.command(),
        }
    }

    /// The store write this command stands for.
    pub fn to_patch(self) -> SettingsPatch {
        match self {
            Self::FontSize(size) => SettingsPatch {
                font_size: Some(size),
                ..Default::default()
            },
            Self::FontWeight(weight) => SettingsPatch {
                font_weight: Some(weight),
                ..Default::default()
            },
            Self::Mode(mode) => SettingsPatch {
                theme_mode: Some(mode),
                ..Default::default()
            },
        }
    }

    /// The font part, if this is a font command.
    pub fn font_style(self) -> Option<FontStyle> {
        match self {
            Self::FontSize(size) => Some(FontStyle {
                font_size: Some(size),
                font_weight: None,
            }),
            Self::FontWeight(weight) => Some(FontStyle {
                font_size: None,
                font_weight: Some(weight),
            }),
            Self::Mode(_) => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaggedCommand {
    #[serde(rename = "type")]
    tag: String,
}

impl TryFrom<TaggedCommand> for StyleCommand {
    type Error = String;

    fn try_from(value: TaggedCommand) -> Result<Self, Self::Error> {
        Self::from_tag(&value.tag).ok_or_else(|| format!("not a style command: {}", value.tag))
    }
}

impl From<StyleCommand> for TaggedCommand {
    fn from(value: StyleCommand) -> Self {
        Self {
            tag: value.tag().to_string(),
        }
    }
}

/// Requests the background router understands, besides the style command tags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackgroundRequest {
    PageType {
        #[serde(default)]
        value: Value,
    },
    CartPage {
        #[serde(default)]
        value: Value,
    },
    CartItemsUpdated {
        #[serde(default)]
        data: Value,
    },
    FetchFoodData {
        #[serde(default)]
        payload: Map<String, Value>,
    },
    FetchImageAnalysis {
        #[serde(default)]
        payload: ImageAnalysisRequest,
    },
    FetchOutlineInfo {
        #[serde(default)]
        payload: OutlineInfoRequest,
    },
    FetchCosmeticData {
        #[serde(default)]
        payload: CosmeticRequest,
    },
    FetchReviewSummary {
        #[serde(default)]
        payload: ReviewSummaryRequest,
    },
    FetchHealthData {
        #[serde(default)]
        payload: HealthDataRequest,
    },
    FetchVendorHtml,
    GetProductTitle,
    GetCursorSettings,
    GetSettings,
    UpdateSettings {
        #[serde(default)]
        settings: SettingsPatch,
    },
    ResetSettings,
    ToggleAllStyles,
}

/// Everything that can arrive at the background router.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackgroundMessage {
    Style(StyleCommand),
    Request(BackgroundRequest),
}

/// Keyboard shortcuts bound by the extension manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyboardCommand {
    /// Show or remove the overlay.
    ToggleIframe,
    /// Open or close the overlay's sidebar.
    ToggleSidebar,
}

impl KeyboardCommand {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "toggle_iframe" => Some(Self::ToggleIframe),
            "toggle_sidebar" => Some(Self::ToggleSidebar),
            _ => None,
        }
    }
}

/// Control messages delivered to a page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageControl {
    ThemeUpdate {
        #[serde(default)]
        payload: ThemePayload,
    },
    UpdateCursor(CursorSettings),
    DisableAllStyles,
    RestoreAllStyles,
    ResetSettings,
    #[serde(rename_all = "camelCase")]
    SetIframeVisibility {
        is_visible: bool,
    },
    KeyboardCommand {
        command: KeyboardCommand,
    },
    PageType {
        #[serde(default)]
        value: Value,
    },
    CartPage {
        #[serde(default)]
        value: Value,
    },
    CartItemsUpdated {
        #[serde(default)]
        data: Value,
    },
    GetProductTitle,
    GetVendorHtml,
}

/// Everything a page's message listener understands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageMessage {
    Style(StyleCommand),
    Control(PageControl),
}

impl PageMessage {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<PageControl> for PageMessage {
    fn from(value: PageControl) -> Self {
        Self::Control(value)
    }
}

/// Messages posted into the page window by the overlay's own document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameMessage {
    #[serde(rename_all = "camelCase")]
    ResizeIframe {
        is_open: bool,
    },
    ToggleSidebar,
}
