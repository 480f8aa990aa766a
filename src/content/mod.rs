//! The per-page side of the extension: style application, the overlay frame
//! and product-info requests, driven by messages from the background.

pub mod document;
pub mod overlay_manager;
pub mod page_context;
pub mod page_runtime;
pub mod product_requests;
pub mod style_applicator;
pub mod styles;
pub mod wait;

pub use document::{PageDocument, SharedDocument};
pub use overlay_manager::{OverlayHiddenReason, OverlayManager};
pub use page_context::{PageContext, StyleSnapshot};
pub use page_runtime::PageRuntime;
pub use product_requests::{HealthProfile, ProductRequestError, ProductRequests, RequestTimings};
pub use style_applicator::StyleApplicator;
pub use wait::{WaitError, wait_until};
