use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::background::TabId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct DiagnosticEntry {
    pub timestamp: SystemTime,
    pub level: DiagnosticLevel,
    pub message: String,
    pub target: String,
    /// Tab the event concerns, from its `tab_id` field.
    pub tab_id: Option<TabId>,
    /// Product the event concerns, from its `product_id` field.
    pub product_id: Option<String>,
    pub fields: BTreeMap<String, String>,
}

/// Bounded FIFO of recent warnings and errors, shown as console diagnostics.
#[derive(Clone)]
pub struct DiagnosticsStore {
    entries: Arc<Mutex<VecDeque<DiagnosticEntry>>>,
    max_entries: usize,
}

impl DiagnosticsStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(max_entries))),
            max_entries,
        }
    }

    pub fn add_entry(&self, entry: DiagnosticEntry) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);

        // FIFO eviction when exceeding max
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    /// Move every entry already waiting on `receiver` into the store.
    /// Returns how many were taken.
    pub fn drain(&self, receiver: &Receiver<DiagnosticEntry>) -> usize {
        let mut taken = 0;
        for entry in receiver.try_iter() {
            self.add_entry(entry);
            taken += 1;
        }
        taken
    }

    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn error_count(&self) -> usize {
        self.count(DiagnosticLevel::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(DiagnosticLevel::Warning)
    }

    fn count(&self, level: DiagnosticLevel) -> usize {
        self.entries.lock().iter().filter(|e| e.level == level).count()
    }

}
