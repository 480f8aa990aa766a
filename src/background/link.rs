use std::sync::{Arc, Weak};

use serde_json::Value;

use super::messaging::{ContextError, MessageSender, RuntimeMessenger};
use super::router::Router;
use crate::protocol::message_type;
use crate::settings::repositories::BoxFuture;

/// A page's channel to the background router, tagged with the page's tab.
///
/// Holds the router weakly so a page outliving the background gets
/// `BackgroundGone` instead of keeping it alive.
#[derive(Clone)]
pub struct BackgroundLink {
    router: Weak<Router>,
    sender: MessageSender,
}

impl BackgroundLink {
    pub fn new(router: &Arc<Router>, sender: MessageSender) -> Self {
        Self {
            router: Arc::downgrade(router),
            sender,
        }
    }

    pub fn sender(&self) -> &MessageSender {
        &self.sender
    }
}

impl RuntimeMessenger for BackgroundLink {
    fn send_message(&self, message: Value) -> BoxFuture<'static, Result<Value, ContextError>> {
        let Some(router) = self.router.upgrade() else {
            return Box::pin(async { Err(ContextError::BackgroundGone) });
        };
        let tag = message_type(&message).unwrap_or_default().to_string();
        let dispatch = router.dispatch(message, self.sender.clone());
        Box::pin(async move { dispatch.into_response(&tag).await })
    }
}
