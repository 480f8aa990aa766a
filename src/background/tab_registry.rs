use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::messaging::{ContextError, TabEndpoint, TabId, TabInfo, TabMessenger, TabQuery};
use crate::settings::repositories::BoxFuture;

const VIEW_CHANNEL_CAPACITY: usize = 64;

struct TabEntry {
    url: String,
    endpoint: Option<Arc<dyn TabEndpoint>>,
}

/// In-process set of open tabs, each optionally running a page endpoint.
pub struct TabRegistry {
    tabs: RwLock<BTreeMap<TabId, TabEntry>>,
    active: RwLock<Option<TabId>>,
    next_id: AtomicU32,
    views: broadcast::Sender<Value>,
}

impl TabRegistry {
    pub fn new() -> Self {
        let (views, _) = broadcast::channel(VIEW_CHANNEL_CAPACITY);
        Self {
            tabs: RwLock::new(BTreeMap::new()),
            active: RwLock::new(None),
            next_id: AtomicU32::new(1),
            views,
        }
    }

    /// Open a tab on `url`. The new tab becomes the active one.
    pub fn open_tab(&self, url: impl Into<String>) -> TabId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = url.into();
        debug!(tab_id = id, url = %url, "Tab opened");
        self.tabs.write().insert(id, TabEntry { url, endpoint: None });
        *self.active.write() = Some(id);
        id
    }

    /// Attach the page listener of `tab_id`, replacing any previous one.
    pub fn attach(&self, tab_id: TabId, endpoint: Arc<dyn TabEndpoint>) -> Result<(), ContextError> {
        let mut tabs = self.tabs.write();
        let entry = tabs.get_mut(&tab_id).ok_or(ContextError::NoSuchTab(tab_id))?;
        entry.endpoint = Some(endpoint);
        Ok(())
    }

    pub fn detach(&self, tab_id: TabId) -> Option<Arc<dyn TabEndpoint>> {
        self.tabs
            .write()
            .get_mut(&tab_id)
            .and_then(|entry| entry.endpoint.take())
    }

    /// Point the tab at a new url. The old page listener goes away with its page.
    pub fn navigate(&self, tab_id: TabId, url: impl Into<String>) -> Result<Option<Arc<dyn TabEndpoint>>, ContextError> {
        let mut tabs = self.tabs.write();
        let entry = tabs.get_mut(&tab_id).ok_or(ContextError::NoSuchTab(tab_id))?;
        entry.url = url.into();
        debug!(tab_id, url = %entry.url, "Tab navigated");
        Ok(entry.endpoint.take())
    }

    pub fn activate(&self, tab_id: TabId) -> Result<(), ContextError> {
        if !self.tabs.read().contains_key(&tab_id) {
            return Err(ContextError::NoSuchTab(tab_id));
        }
        *self.active.write() = Some(tab_id);
        Ok(())
    }

    pub fn close_tab(&self, tab_id: TabId) -> Option<Arc<dyn TabEndpoint>> {
        let removed = self.tabs.write().remove(&tab_id);
        let mut active = self.active.write();
        if *active == Some(tab_id) {
            *active = None;
        }
        removed.and_then(|entry| entry.endpoint)
    }

    pub fn tab(&self, tab_id: TabId) -> Option<TabInfo> {
        let active = *self.active.read();
        self.tabs.read().get(&tab_id).map(|entry| TabInfo {
            id: tab_id,
            url: entry.url.clone(),
            active: active == Some(tab_id),
        })
    }

    /// Messages delivered to extension views.
    pub fn subscribe_views(&self) -> broadcast::Receiver<Value> {
        self.views.subscribe()
    }
}

impl Default for TabRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TabMessenger for TabRegistry {
    fn query_tabs(&self, query: TabQuery) -> BoxFuture<'static, Vec<TabInfo>> {
        let active = *self.active.read();
        let tabs: Vec<TabInfo> = self
            .tabs
            .read()
            .iter()
            .filter(|(id, _)| !query.active || active == Some(**id))
            .map(|(id, entry)| TabInfo {
                id: *id,
                url: entry.url.clone(),
                active: active == Some(*id),
            })
            .collect();
        Box::pin(async move { tabs })
    }

    fn send_to_tab(&self, tab_id: TabId, message: Value) -> BoxFuture<'static, Result<Value, ContextError>> {
        let endpoint = match self.tabs.read().get(&tab_id) {
            None => Err(ContextError::NoSuchTab(tab_id)),
            Some(entry) => entry.endpoint.clone().ok_or(ContextError::NoListener(tab_id)),
        };
        Box::pin(async move {
            let endpoint = endpoint?;
            trace!(tab_id, message = %message, "Delivering message to tab");
            endpoint
                .on_message(message)
                .await
                .ok_or(ContextError::NoResponse(tab_id))
        })
    }

    fn notify_views(&self, message: Value) {
        // No open view is fine.
        let _ = self.views.send(message);
    }
}
