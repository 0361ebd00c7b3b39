use std::collections::HashMap;

use serde::Serialize;

/// Whether a value is a monotonically increasing count or a point-in-time reading.
///
/// Advisory metadata for the exposition layer; it never changes the numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Counter,
    Gauge,
}

/// A transformed two-component reading for one (instance, counter) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComputedValue {
    pub kind: ValueKind,
    pub first: f64,
    pub second: f64,
}

/// Values of one collection cycle, keyed by live instance name then counter name.
///
/// Produced fresh by every `Collector::collect` call and owned by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// Unix timestamp (seconds) of the collection.
    pub timestamp: i64,
    pub instances: HashMap<String, HashMap<String, ComputedValue>>,
}

impl Snapshot {
    pub fn empty(timestamp: i64) -> Self {
        Self {
            timestamp,
            instances: HashMap::new(),
        }
    }

    pub fn get(&self, instance: &str, counter: &str) -> Option<&ComputedValue> {
        self.instances.get(instance)?.get(counter)
    }

    pub fn instance(&self, instance: &str) -> Option<&HashMap<String, ComputedValue>> {
        self.instances.get(instance)
    }

    /// Instance names in sorted order.
    pub fn instance_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.instances.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Total number of (instance, counter) values.
    pub fn value_count(&self) -> usize {
        self.instances.values().map(HashMap::len).sum()
    }
}
