use std::collections::VecDeque;

use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::document::ListenerId;
use crate::settings::models::{FontSize, FontStyle, FontWeight, ThemeMode};

/// Backend replies kept per page; older ones are evicted first.
pub const MAX_REPLIES: usize = 32;

/// Font and theme captured from the store right before styles are disabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StyleSnapshot {
    pub font_size: Option<FontSize>,
    pub font_weight: Option<FontWeight>,
    pub theme_mode: Option<ThemeMode>,
}

#[derive(Debug, Default)]
struct ContextState {
    snapshot: StyleSnapshot,
    cursor_enabled: bool,
    applied_font: FontStyle,
    overlay_listener: Option<ListenerId>,
    replies: VecDeque<Value>,
}

/// State of one injected page, alive from injection until navigation.
///
/// Once torn down every operation holding it becomes a no-op.
#[derive(Debug)]
pub struct PageContext {
    token: CancellationToken,
    state: Mutex<ContextState>,
}

impl PageContext {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            state: Mutex::new(ContextState {
                cursor_enabled: true,
                ..Default::default()
            }),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn teardown(&self) {
        if self.is_active() {
            debug!("Page context torn down");
            self.token.cancel();
        }
    }

    pub fn snapshot(&self) -> StyleSnapshot {
        self.state.lock().snapshot
    }

    pub fn set_snapshot(&self, snapshot: StyleSnapshot) {
        self.state.lock().snapshot = snapshot;
    }

    pub fn cursor_enabled(&self) -> bool {
        self.state.lock().cursor_enabled
    }

    pub fn set_cursor_enabled(&self, enabled: bool) {
        self.state.lock().cursor_enabled = enabled;
    }

    pub fn applied_font(&self) -> FontStyle {
        self.state.lock().applied_font
    }

    /// Merge `style` into the applied font and return the result.
    pub fn merge_font(&self, style: FontStyle) -> FontStyle {
        let mut state = self.state.lock();
        state.applied_font = state.applied_font.merged(style);
        state.applied_font
    }

    pub fn clear_font(&self) {
        self.state.lock().applied_font = FontStyle::default();
    }

    /// Swap in the new overlay listener, returning the previous one.
    pub fn replace_overlay_listener(&self, listener: Option<ListenerId>) -> Option<ListenerId> {
        std::mem::replace(&mut self.state.lock().overlay_listener, listener)
    }

    /// Record an `<X>_RESPONSE` / `<X>_ERROR` delivered by the background.
    pub fn record_reply(&self, reply: Value) {
        let mut state = self.state.lock();
        state.replies.push_back(reply);
        while state.replies.len() > MAX_REPLIES {
            state.replies.pop_front();
        }
    }

    pub fn replies(&self) -> Vec<Value> {
        self.state.lock().replies.iter().cloned().collect()
    }
}

impl Default for PageContext {
    fn default() -> Self {
        Self::new()
    }
}
