use std::collections::BTreeMap;
use std::fmt;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::time::SystemTime;

use tracing::{
    Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::Layer;

use super::store::{DiagnosticEntry, DiagnosticLevel};
use crate::background::TabId;

const CHANNEL_CAPACITY: usize = 1000;

const TAB_ID_FIELD: &str = "tab_id";
const PRODUCT_ID_FIELD: &str = "product_id";

/// Splits an event into its message, the tab and product it concerns, and
/// whatever other fields it carried.
#[derive(Default)]
struct EntryVisitor {
    message: Option<String>,
    tab_id: Option<TabId>,
    product_id: Option<String>,
    fields: BTreeMap<String, String>,
}

impl EntryVisitor {
    fn record_text(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            PRODUCT_ID_FIELD => self.product_id = Some(value),
            TAB_ID_FIELD => match value.parse() {
                Ok(id) => self.tab_id = Some(id),
                Err(_) => {
                    self.fields.insert(TAB_ID_FIELD.to_string(), value);
                }
            },
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for EntryVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_text(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == TAB_ID_FIELD
            && let Ok(id) = TabId::try_from(value)
        {
            self.tab_id = Some(id);
            return;
        }
        self.record_text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == TAB_ID_FIELD
            && let Ok(id) = TabId::try_from(value)
        {
            self.tab_id = Some(id);
            return;
        }
        self.record_text(field, value.to_string());
    }
}

/// Tracing layer forwarding WARN and ERROR events to a [`DiagnosticsStore`](super::DiagnosticsStore).
pub struct DiagnosticsLayer {
    sender: SyncSender<DiagnosticEntry>,
}

impl DiagnosticsLayer {
    pub fn new() -> (Self, Receiver<DiagnosticEntry>) {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, Receiver<DiagnosticEntry>) {
        let (sender, receiver) = sync_channel(capacity);
        (Self { sender }, receiver)
    }
}

impl<S> Layer<S> for DiagnosticsLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let metadata = event.metadata();
        let level = match *metadata.level() {
            Level::ERROR => DiagnosticLevel::Error,
            Level::WARN => DiagnosticLevel::Warning,
            _ => return,
        };

        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);

        let entry = DiagnosticEntry {
            timestamp: SystemTime::now(),
            level,
            message: visitor.message.unwrap_or_default(),
            target: metadata.target().to_string(),
            tab_id: visitor.tab_id,
            product_id: visitor.product_id,
            fields: visitor.fields,
        };

        // A full channel drops the entry; logging never blocks.
        let _ = self.sender.try_send(entry);
    }
}
