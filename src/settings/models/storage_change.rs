use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Partition of the store.
///
/// Only `Sync` changes drive style propagation; `Local` holds data payloads
/// such as cart contents and cached summaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    Sync,
    Local,
}

impl StorageArea {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Local => "local",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

/// One change notification: every key whose value changed in a single write.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeBatch {
    pub area: StorageArea,
    pub changes: BTreeMap<String, StorageChange>,
}

impl ChangeBatch {
    pub fn contains(&self, key: &str) -> bool {
        self.changes.contains_key(key)
    }

    pub fn new_value(&self, key: &str) -> Option<&Value> {
        self.changes.get(key).and_then(|c| c.new_value.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
