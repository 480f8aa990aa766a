//! Wire shapes of every message exchanged between the background, pages and
//! the overlay document.

pub mod messages;
pub mod payloads;
pub mod replies;

pub use messages::{
    BackgroundMessage, BackgroundRequest, FrameMessage, KeyboardCommand, PageControl, PageMessage,
    StyleCommand, message_type,
};
pub use payloads::{
    CosmeticRequest, CursorSettings, HealthDataRequest, ImageAnalysisRequest, OutlineInfoRequest,
    ProductTitle, ReviewSummary, ReviewSummaryRequest, SettingsSnapshot, ThemePayload, VendorHtml,
};
pub use replies::{Ack, ApiKind, ApiReply, FoodReply};
