//! Counter group configuration.

use serde::{Deserialize, Serialize};

/// One performance object with the instances and counters to collect.
///
/// An empty `instances` list means the object is not instanced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterGroup {
    pub object: String,
    #[serde(default)]
    pub instances: Vec<String>,
    pub counters: Vec<String>,
}

impl CounterGroup {
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            instances: Vec::new(),
            counters: Vec::new(),
        }
    }

    pub fn with_instances<I, S>(mut self, instances: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instances = instances.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_counters<I, S>(mut self, counters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.counters = counters.into_iter().map(Into::into).collect();
        self
    }
}
