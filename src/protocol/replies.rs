use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backend-backed requests answered with `<X>_RESPONSE` / `<X>_ERROR`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiKind {
    ImageAnalysis,
    OutlineInfo,
    CosmeticData,
    ReviewSummary,
    HealthData,
}

impl ApiKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::ImageAnalysis => "IMAGE_ANALYSIS",
            Self::OutlineInfo => "OUTLINE_INFO",
            Self::CosmeticData => "COSMETIC_DATA",
            Self::ReviewSummary => "REVIEW_SUMMARY",
            Self::HealthData => "HEALTH_DATA",
        }
    }

    pub fn response_type(self) -> String {
        format!("{}_RESPONSE", self.prefix())
    }

    pub fn error_type(self) -> String {
        format!("{}_ERROR", self.prefix())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiReply {
    Data {
        #[serde(rename = "type")]
        kind: String,
        data: Value,
    },
    Error {
        #[serde(rename = "type")]
        kind: String,
        error: String,
    },
}

impl ApiReply {
    pub fn data(kind: ApiKind, data: Value) -> Self {
        Self::Data {
            kind: kind.response_type(),
            data,
        }
    }

    pub fn error(kind: ApiKind, error: impl Into<String>) -> Self {
        Self::Error {
            kind: kind.error_type(),
            error: error.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Food lookups answer with an HTTP-like status instead of a type tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FoodReply {
    Data { status: u16, data: Value },
    Error { status: u16, error: String },
}

impl FoodReply {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Acknowledgement a page returns for style and overlay messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
