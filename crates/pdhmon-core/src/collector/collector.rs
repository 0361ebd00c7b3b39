//! Collector for one performance object.
//!
//! The `Collector` struct owns a native query with its counters and turns
//! each collection cycle into a `Snapshot`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::collector::error::CollectError;
use crate::collector::probe::{ProbeBuffer, probe};
use crate::collector::query::{CounterMetadata, NO_INSTANCE, Query, TOTAL_SUFFIX, WILDCARD};
use crate::collector::status::{PdhStatus, StatusClass};
use crate::collector::traits::PdhApi;
use crate::collector::transform::transform;
use crate::config::CounterGroup;
use crate::model::{ComputedValue, Snapshot};

/// Timing information for the last successful cycle.
///
/// Used for debugging and performance monitoring.
#[derive(Debug, Clone, Default)]
pub struct CollectorTiming {
    /// Total cycle time.
    pub total: Duration,
    /// Time spent in the native collect call.
    pub collect_query_data: Duration,
    /// Time spent fetching and transforming raw counter arrays.
    pub fetch: Duration,
    /// Values recorded in the snapshot.
    pub values: usize,
    /// (counter, instance) fetches skipped for a recoverable status.
    pub skipped: usize,
}

/// Collector for one performance object, its instances and counters.
///
/// Construction registers every (counter, instance) pair and runs one
/// collection, so a returned collector is known to be collectible. Every
/// handle it acquired is released by [`Collector::close`] or on drop.
///
/// A collector is not safe for concurrent collection: the native query and
/// its scratch buffer are mutated in place, which is why [`Collector::collect`]
/// takes `&mut self`. Give each worker its own collector, or guard a shared
/// one with a mutex.
pub struct Collector<A: PdhApi> {
    api: A,
    object: String,
    query: Query,
    buffer: ProbeBuffer,
    last_collection: Option<DateTime<Utc>>,
    last_timing: Option<CollectorTiming>,
}

impl<A: PdhApi> Collector<A> {
    /// Creates a collector for `object`.
    ///
    /// # Arguments
    /// * `api` - PDH implementation (real or mock)
    /// * `object` - Performance object name, e.g. `LogicalDisk`
    /// * `instances` - Instance names; empty means the object is not instanced
    /// * `counters` - Counter names; the wildcard `*` is rejected
    ///
    /// On error nothing acquired so far is left allocated.
    pub fn new(
        mut api: A,
        object: &str,
        instances: &[String],
        counters: &[String],
    ) -> Result<Self, CollectError> {
        let instances = normalize_instances(instances);
        let mut buffer = ProbeBuffer::new();
        let mut query = Query::open(&mut api, object)?;

        for counter in counters {
            if let Err(err) = query.add_counter(&mut api, &mut buffer, &instances, counter) {
                query.release(&mut api);
                return Err(err);
            }
        }

        let mut collector = Self {
            api,
            object: object.to_string(),
            query,
            buffer,
            last_collection: None,
            last_timing: None,
        };
        // Dropping the collector on failure releases the query.
        collector.collect()?;

        debug!(
            object,
            counters = collector.query.counters.len(),
            instances = instances.len(),
            "collector ready"
        );
        Ok(collector)
    }

    /// Creates a collector from a configured counter group.
    pub fn from_group(api: A, group: &CounterGroup) -> Result<Self, CollectError> {
        Self::new(api, &group.object, &group.instances, &group.counters)
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    /// Metadata of every registered counter, in configuration order.
    pub fn counters(&self) -> impl Iterator<Item = &CounterMetadata> {
        self.query.counters.iter().map(|c| &c.metadata)
    }

    pub fn counter(&self, name: &str) -> Option<&CounterMetadata> {
        self.counters().find(|m| m.name == name)
    }

    /// Wall-clock time of the last successful native collection.
    pub fn last_collection(&self) -> Option<DateTime<Utc>> {
        self.last_collection
    }

    /// Returns timing information from the last successful `collect` call.
    pub fn last_timing(&self) -> Option<&CollectorTiming> {
        self.last_timing.as_ref()
    }

    /// Runs one collection cycle.
    ///
    /// Either every configured (counter, instance) pair has been read and the
    /// snapshot is returned, or the cycle failed and no snapshot is produced.
    /// Instances reporting expected absence of data are left out silently.
    pub fn collect(&mut self) -> Result<Snapshot, CollectError> {
        let total_start = Instant::now();
        let mut timing = CollectorTiming::default();

        if self.query.counters.is_empty() {
            return Ok(Snapshot::empty(Utc::now().timestamp()));
        }

        let query = self
            .query
            .handle()
            .ok_or(CollectError::CollectionFailure {
                operation: "PdhCollectQueryData",
                counter: None,
                status: PdhStatus::INVALID_HANDLE,
            })?;

        let start = Instant::now();
        let status = self.api.collect_query_data(query);
        if !status.is_success() {
            return Err(CollectError::CollectionFailure {
                operation: "PdhCollectQueryData",
                counter: None,
                status,
            });
        }
        timing.collect_query_data = start.elapsed();

        let collected_at = Utc::now();
        self.last_collection = Some(collected_at);

        let start = Instant::now();
        let mut data: Option<HashMap<String, HashMap<String, ComputedValue>>> = None;
        let counter_count = self.query.counters.len();

        for counter in &self.query.counters {
            let metadata = &counter.metadata;
            for instance in &counter.instances {
                let mut item_count = 0u32;
                let fetched = probe(&mut self.buffer, |buf| {
                    self.api.raw_counter_array(instance.handle, buf, &mut item_count)
                });

                if let Err(status) = fetched {
                    if status.classify() == StatusClass::Recoverable {
                        trace!(
                            counter = %metadata.name,
                            instance = %instance.name,
                            %status,
                            "no data for counter instance"
                        );
                        timing.skipped += 1;
                        continue;
                    }
                    return Err(CollectError::CollectionFailure {
                        operation: "PdhGetRawCounterArrayW",
                        counter: Some(instance.path.clone()),
                        status,
                    });
                }

                let items = self.api.decode_raw_items(&self.buffer, item_count);
                let capacity_hint = items.len();

                for item in items {
                    if !item.status.has_data() || item.name.ends_with(TOTAL_SUFFIX) {
                        continue;
                    }
                    let name = if item.name.is_empty() || item.name == WILDCARD {
                        NO_INSTANCE.to_string()
                    } else {
                        item.name
                    };
                    let value = transform(metadata.type_code, metadata.frequency, item.first, item.second);

                    data.get_or_insert_with(|| HashMap::with_capacity(capacity_hint))
                        .entry(name)
                        .or_insert_with(|| HashMap::with_capacity(counter_count))
                        .insert(metadata.name.clone(), value);
                    timing.values += 1;
                }
            }
        }
        timing.fetch = start.elapsed();
        timing.total = total_start.elapsed();
        self.last_timing = Some(timing);

        Ok(Snapshot {
            timestamp: collected_at.timestamp(),
            instances: data.unwrap_or_default(),
        })
    }

    /// Releases the query and every counter handle.
    pub fn close(self) {
        drop(self);
    }
}

impl<A: PdhApi> Drop for Collector<A> {
    fn drop(&mut self) {
        self.query.release(&mut self.api);
    }
}

/// Empty means "not instanced"; duplicates are registered once.
fn normalize_instances(instances: &[String]) -> Vec<String> {
    if instances.is_empty() {
        return vec![NO_INSTANCE.to_string()];
    }
    let mut unique: Vec<String> = Vec::with_capacity(instances.len());
    for instance in instances {
        if !unique.contains(instance) {
            unique.push(instance.clone());
        }
    }
    unique
}
