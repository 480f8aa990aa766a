use serde_json::Value;
use thiserror::Error;

use crate::settings::repositories::BoxFuture;

pub type TabId = u32;

/// Failures delivering a message between contexts.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("No tab with id {0}")]
    NoSuchTab(TabId),

    #[error("Tab {0} has no message listener")]
    NoListener(TabId),

    #[error("Tab {0} did not answer")]
    NoResponse(TabId),

    #[error("No active tab")]
    NoActiveTab,

    #[error("Background context is gone")]
    BackgroundGone,

    #[error("No handler for message type {0:?}")]
    Unhandled(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
    pub active: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TabQuery {
    /// Only the active tab of the focused window.
    pub active: bool,
}

impl TabQuery {
    pub fn all() -> Self {
        Self { active: false }
    }

    pub fn active() -> Self {
        Self { active: true }
    }
}

/// Who sent a message to the background. Extension views have no tab.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageSender {
    pub tab: Option<TabInfo>,
}

impl MessageSender {
    pub fn from_tab(tab: TabInfo) -> Self {
        Self { tab: Some(tab) }
    }

    pub fn extension_view() -> Self {
        Self::default()
    }

    pub fn tab_id(&self) -> Option<TabId> {
        self.tab.as_ref().map(|tab| tab.id)
    }
}

/// Background-side view of the browser's tabs.
pub trait TabMessenger: Send + Sync + 'static {
    fn query_tabs(&self, query: TabQuery) -> BoxFuture<'static, Vec<TabInfo>>;

    /// Deliver a message to the page running in `tab_id` and wait for its answer.
    fn send_to_tab(&self, tab_id: TabId, message: Value) -> BoxFuture<'static, Result<Value, ContextError>>;

    /// Deliver a message to every open extension view (popup, overlay document).
    fn notify_views(&self, message: Value);

    fn active_tab(&self) -> BoxFuture<'static, Option<TabInfo>> {
        let query = self.query_tabs(TabQuery::active());
        Box::pin(async move { query.await.into_iter().next() })
    }
}

/// A page's message listener. `None` means the message was not answered.
pub trait TabEndpoint: Send + Sync + 'static {
    fn on_message(&self, message: Value) -> BoxFuture<'static, Option<Value>>;
}

/// Page-side channel to the background.
pub trait RuntimeMessenger: Send + Sync + 'static {
    fn send_message(&self, message: Value) -> BoxFuture<'static, Result<Value, ContextError>>;
}
