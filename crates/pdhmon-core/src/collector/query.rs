//! Query / counter / instance ownership tree.
//!
//! A [`Query`] owns its native query context and every counter handle added
//! to it. Releasing the query walks the tree: counter handles first, then the
//! query context.

use tracing::{debug, warn};

use crate::collector::error::CollectError;
use crate::collector::probe::{ProbeBuffer, probe};
use crate::collector::status::PdhStatus;
use crate::collector::traits::{CounterHandle, PdhApi, QueryHandle};
use crate::collector::transform::{is_time_based, value_kind};
use crate::model::ValueKind;

/// Instance name standing in for "no instance" and for empty live names.
pub const NO_INSTANCE: &str = "------";

/// Suffix of aggregate rows that are dropped from snapshots.
pub const TOTAL_SUFFIX: &str = "_Total";

/// Configured counter name that would match every counter of an object.
pub const WILDCARD: &str = "*";

/// Formats `\Object(Instance)\Counter`, or `\Object\Counter` for [`NO_INSTANCE`].
pub fn counter_path(object: &str, instance: &str, counter: &str) -> String {
    if instance == NO_INSTANCE {
        format!("\\{}\\{}", object, counter)
    } else {
        format!("\\{}({})\\{}", object, instance, counter)
    }
}

/// Type information resolved once per counter, from its first instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterMetadata {
    pub name: String,
    pub type_code: u32,
    /// Ticks per second; only resolved for time-based types, 0 otherwise.
    pub frequency: i64,
    pub description: String,
}

impl CounterMetadata {
    pub fn value_kind(&self) -> ValueKind {
        value_kind(self.type_code)
    }
}

/// One native counter handle for a configured instance.
#[derive(Debug)]
pub(crate) struct Instance {
    pub name: String,
    pub path: String,
    pub handle: CounterHandle,
}

/// A named counter and its per-instance handles.
#[derive(Debug)]
pub(crate) struct Counter {
    pub metadata: CounterMetadata,
    pub instances: Vec<Instance>,
}

/// Native query context plus the counters registered against it.
#[derive(Debug)]
pub(crate) struct Query {
    object: String,
    handle: Option<QueryHandle>,
    pub counters: Vec<Counter>,
}

impl Query {
    pub fn open<A: PdhApi>(api: &mut A, object: &str) -> Result<Self, CollectError> {
        let handle = api
            .open_query()
            .map_err(|status| CollectError::ResourceExhausted {
                object: object.to_string(),
                status,
            })?;
        debug!(object, ?handle, "opened query");
        Ok(Self {
            object: object.to_string(),
            handle: Some(handle),
            counters: Vec::new(),
        })
    }

    /// Handle of the live query context; `None` once released.
    pub fn handle(&self) -> Option<QueryHandle> {
        self.handle
    }

    /// Registers `name` for every instance in `instances`.
    ///
    /// Handles added before a failure stay owned by the query, so releasing
    /// it cleans them up.
    pub fn add_counter<A: PdhApi>(
        &mut self,
        api: &mut A,
        buffer: &mut ProbeBuffer,
        instances: &[String],
        name: &str,
    ) -> Result<(), CollectError> {
        let Some(query) = self.handle else {
            return Err(CollectError::ResourceExhausted {
                object: self.object.clone(),
                status: PdhStatus::INVALID_HANDLE,
            });
        };

        if name == WILDCARD {
            return Err(CollectError::UnsupportedWildcard {
                object: self.object.clone(),
                instance: instances.first().cloned().unwrap_or_else(|| NO_INSTANCE.to_string()),
                counter: name.to_string(),
            });
        }

        let mut metadata: Option<CounterMetadata> = None;
        let mut registered: Vec<Instance> = Vec::with_capacity(instances.len());

        for instance in instances {
            let path = counter_path(&self.object, instance, name);
            let handle = match api.add_counter(query, &path) {
                Ok(handle) => handle,
                Err(status) => {
                    self.adopt(name, metadata, registered);
                    return Err(CollectError::UnknownCounter {
                        object: self.object.clone(),
                        instance: instance.clone(),
                        counter: name.to_string(),
                        path,
                        status,
                    });
                }
            };
            debug!(path = %path, ?handle, "added counter");
            registered.push(Instance {
                name: instance.clone(),
                path: path.clone(),
                handle,
            });

            if metadata.is_none() {
                match self.resolve_metadata(api, buffer, handle, instance, name, &path) {
                    Ok(resolved) => metadata = Some(resolved),
                    Err(err) => {
                        self.adopt(name, None, registered);
                        return Err(err);
                    }
                }
            }
        }

        self.adopt(name, metadata, registered);
        Ok(())
    }

    /// Takes ownership of registered handles, even for a partially added counter.
    fn adopt(&mut self, name: &str, metadata: Option<CounterMetadata>, instances: Vec<Instance>) {
        if instances.is_empty() {
            return;
        }
        let metadata = metadata.unwrap_or_else(|| CounterMetadata {
            name: name.to_string(),
            type_code: 0,
            frequency: 0,
            description: String::new(),
        });
        self.counters.push(Counter {
            metadata,
            instances,
        });
    }

    fn resolve_metadata<A: PdhApi>(
        &self,
        api: &mut A,
        buffer: &mut ProbeBuffer,
        handle: CounterHandle,
        instance: &str,
        name: &str,
        path: &str,
    ) -> Result<CounterMetadata, CollectError> {
        let failure = |operation: &'static str, reason: String| CollectError::MetadataFailure {
            object: self.object.clone(),
            instance: instance.to_string(),
            counter: name.to_string(),
            path: path.to_string(),
            operation,
            reason,
        };

        probe(buffer, |buf| api.counter_info(handle, buf))
            .map_err(|status| failure("PdhGetCounterInfoW", status.to_string()))?;
        let info = api
            .decode_counter_info(buffer)
            .ok_or_else(|| failure("PdhGetCounterInfoW", "truncated counter info".to_string()))?;

        let frequency = if is_time_based(info.type_code) {
            let frequency = api
                .counter_time_base(handle)
                .map_err(|status| failure("PdhGetCounterTimeBase", status.to_string()))?;
            if frequency <= 0 {
                return Err(failure(
                    "PdhGetCounterTimeBase",
                    format!("invalid time base {}", frequency),
                ));
            }
            frequency
        } else {
            0
        };

        debug!(
            path,
            type_code = format_args!("0x{:08X}", info.type_code),
            frequency,
            "resolved counter type"
        );

        Ok(CounterMetadata {
            name: name.to_string(),
            type_code: info.type_code,
            frequency,
            description: info.description,
        })
    }

    /// Releases every counter handle, then the query context.
    ///
    /// Safe to call more than once; later calls do nothing.
    pub fn release<A: PdhApi>(&mut self, api: &mut A) {
        let Some(query) = self.handle.take() else {
            return;
        };
        for counter in self.counters.drain(..) {
            for instance in counter.instances {
                let status = api.remove_counter(instance.handle);
                if !status.is_success() {
                    warn!(path = %instance.path, %status, "failed to remove counter");
                }
            }
        }
        let status = api.close_query(query);
        if status.is_success() {
            debug!(object = %self.object, ?query, "closed query");
        } else {
            warn!(object = %self.object, %status, "failed to close query");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockPdh;
    use crate::collector::transform::{PERF_ELAPSED_TIME, PERF_RAW_FRACTION};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_counter_path_format() {
        assert_eq!(
            counter_path("LogicalDisk", "C:", "% Free Space"),
            "\\LogicalDisk(C:)\\% Free Space"
        );
        assert_eq!(
            counter_path("System", NO_INSTANCE, "System Up Time"),
            "\\System\\System Up Time"
        );
    }

    #[test]
    fn test_metadata_resolved_once_per_counter() {
        let mut api = MockPdh::logical_disk();
        let mut buffer = ProbeBuffer::new();
        let mut query = Query::open(&mut api, "LogicalDisk").unwrap();

        query
            .add_counter(&mut api, &mut buffer, &names(&["C:", "D:"]), "% Free Space")
            .unwrap();

        assert_eq!(query.counters.len(), 1);
        assert_eq!(query.counters[0].instances.len(), 2);
        assert_eq!(query.counters[0].metadata.type_code, PERF_RAW_FRACTION);
        assert_eq!(api.counter_info_calls(), 1);

        query.release(&mut api);
        assert_eq!(api.open_counter_count(), 0);
        assert_eq!(api.open_query_count(), 0);
    }

    #[test]
    fn test_elapsed_time_resolves_frequency() {
        let mut api = MockPdh::system_uptime();
        let mut buffer = ProbeBuffer::new();
        let mut query = Query::open(&mut api, "System").unwrap();

        query
            .add_counter(&mut api, &mut buffer, &names(&[NO_INSTANCE]), "System Up Time")
            .unwrap();

        let metadata = &query.counters[0].metadata;
        assert_eq!(metadata.type_code, PERF_ELAPSED_TIME);
        assert_eq!(metadata.frequency, 10_000_000);
        assert!(!metadata.description.is_empty());
        query.release(&mut api);
    }

    #[test]
    fn test_zero_time_base_is_metadata_failure() {
        let mut api = MockPdh::new();
        api.define_counter("\\System\\System Up Time", PERF_ELAPSED_TIME, 0);
        let mut buffer = ProbeBuffer::new();
        let mut query = Query::open(&mut api, "System").unwrap();

        let err = query
            .add_counter(&mut api, &mut buffer, &names(&[NO_INSTANCE]), "System Up Time")
            .unwrap_err();
        assert!(matches!(err, CollectError::MetadataFailure { .. }));

        // The handle added before the failure is still owned and released.
        assert_eq!(api.open_counter_count(), 1);
        query.release(&mut api);
        assert_eq!(api.open_counter_count(), 0);
    }

    #[test]
    fn test_unknown_instance_keeps_earlier_handles_owned() {
        let mut api = MockPdh::logical_disk();
        let mut buffer = ProbeBuffer::new();
        let mut query = Query::open(&mut api, "LogicalDisk").unwrap();

        let err = query
            .add_counter(&mut api, &mut buffer, &names(&["C:", "Z:"]), "% Free Space")
            .unwrap_err();
        match err {
            CollectError::UnknownCounter {
                instance, status, ..
            } => {
                assert_eq!(instance, "Z:");
                assert_eq!(status, PdhStatus::CSTATUS_NO_INSTANCE);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(query.counters.len(), 1);
        query.release(&mut api);
        assert_eq!(api.open_counter_count(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut api = MockPdh::logical_disk();
        let mut query = Query::open(&mut api, "LogicalDisk").unwrap();
        query.release(&mut api);
        query.release(&mut api);
        assert_eq!(api.close_query_calls(), 1);
        assert!(query.handle().is_none());
    }
}
