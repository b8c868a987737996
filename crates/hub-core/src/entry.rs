//! Read model returned by lookups, queries and watch deliveries

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A node's value together with the revision it was last written at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Global counter value of the most recent write through this node
    pub revision: u64,

    /// The node's content in the boundary value model
    pub value: serde_json::Value,
}

impl Entry {
    /// Create a new entry
    pub fn new(revision: u64, value: serde_json::Value) -> Self {
        Self { revision, value }
    }

    /// Deserialize the value into a typed structure
    pub fn value_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.value.clone()).ok()
    }
}

/// Concrete URL to entry mapping produced by wildcard expansion
pub type Matches = BTreeMap<String, Entry>;
