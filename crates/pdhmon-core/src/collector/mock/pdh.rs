//! In-memory mock of the PDH subsystem for testing collectors without Windows.
//!
//! `MockPdh` keeps counter definitions, open handles and injected failures in
//! shared state, so a test can hand one clone to a `Collector` and keep another
//! to steer and inspect it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::collector::probe::ProbeBuffer;
use crate::collector::status::PdhStatus;
use crate::collector::traits::{CounterHandle, CounterInfo, PdhApi, QueryHandle, RawCounterItem};

/// Words per encoded raw item: name index, status, first, second.
const ITEM_WORDS: usize = 4;
/// Words per encoded counter info: type code, description index.
const INFO_WORDS: usize = 2;

#[derive(Debug, Clone, Default)]
struct CounterDefinition {
    type_code: u32,
    frequency: i64,
    description: String,
    items: Vec<RawCounterItem>,
    fetch_status: Option<PdhStatus>,
    /// Items that appear between the size probe and the sized fetch.
    pending_growth: usize,
    /// Items that appear on every sized fetch, until cleared.
    growth_per_fetch: usize,
}

#[derive(Debug)]
struct OpenCounter {
    query: usize,
    path: String,
    /// Items captured by the last `collect_query_data`; `None` before the first.
    sampled: Option<Vec<RawCounterItem>>,
}

#[derive(Debug, Default)]
struct MockState {
    next_handle: usize,
    queries: HashSet<usize>,
    counters: HashMap<usize, OpenCounter>,
    definitions: HashMap<String, CounterDefinition>,
    strings: Vec<String>,
    open_failure: Option<PdhStatus>,
    collect_failure: Option<PdhStatus>,
    time_base_failure: Option<PdhStatus>,
    counter_info_calls: usize,
    collect_calls: usize,
    close_query_calls: usize,
}

impl MockState {
    fn next_handle(&mut self) -> usize {
        self.next_handle += 1;
        self.next_handle
    }

    fn intern(&mut self, s: &str) -> u64 {
        let index = self.strings.len();
        self.strings.push(s.to_string());
        index as u64
    }

    /// Status a real subsystem would give for an unresolvable path.
    fn unresolved_status(&self, path: &str) -> PdhStatus {
        let Some((object, _, counter)) = split_path(path) else {
            return PdhStatus::CSTATUS_BAD_COUNTERNAME;
        };
        let mut object_known = false;
        for known in self.definitions.keys() {
            if let Some((known_object, _, known_counter)) = split_path(known)
                && known_object == object
            {
                object_known = true;
                if known_counter == counter {
                    return PdhStatus::CSTATUS_NO_INSTANCE;
                }
            }
        }
        if object_known {
            PdhStatus::CSTATUS_NO_COUNTER
        } else {
            PdhStatus::CSTATUS_NO_OBJECT
        }
    }
}

/// Splits `\Object(Instance)\Counter` into its parts.
fn split_path(path: &str) -> Option<(&str, Option<&str>, &str)> {
    let rest = path.strip_prefix('\\')?;
    let (head, counter) = rest.rsplit_once('\\')?;
    match head.split_once('(') {
        Some((object, instance)) => Some((object, Some(instance.strip_suffix(')')?), counter)),
        None => Some((head, None, counter)),
    }
}

/// In-memory PDH implementation for tests.
///
/// `close_query` deliberately does not release counter handles, so handle
/// accounting exposes any handle the caller forgot to remove.
#[derive(Debug, Clone, Default)]
pub struct MockPdh {
    state: Arc<Mutex<MockState>>,
}

impl MockPdh {
    /// Creates a mock with no counters defined.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Builds a valid raw item.
    pub fn item(name: &str, first: i64, second: i64) -> RawCounterItem {
        RawCounterItem {
            name: name.to_string(),
            status: PdhStatus::CSTATUS_VALID_DATA,
            first,
            second,
        }
    }

    /// Defines a resolvable counter path with its type and time base.
    pub fn define_counter(&self, path: &str, type_code: u32, frequency: i64) {
        let mut state = self.state();
        let definition = state.definitions.entry(path.to_string()).or_default();
        definition.type_code = type_code;
        definition.frequency = frequency;
        definition.description = format!("Mock counter {}", path);
    }

    /// Sets the raw items returned for `path` by subsequent collections.
    pub fn set_items(&self, path: &str, items: Vec<RawCounterItem>) {
        self.state()
            .definitions
            .entry(path.to_string())
            .or_default()
            .items = items;
    }

    /// Makes every raw array fetch for `path` return `status` (`None` clears).
    pub fn set_fetch_status(&self, path: &str, status: Option<PdhStatus>) {
        self.state()
            .definitions
            .entry(path.to_string())
            .or_default()
            .fetch_status = status;
    }

    /// Adds `extra` items to `path` between the next size probe and its fetch.
    pub fn grow_during_fetch(&self, path: &str, extra: usize) {
        self.state()
            .definitions
            .entry(path.to_string())
            .or_default()
            .pending_growth = extra;
    }

    /// Adds `extra` items to `path` on every sized fetch (`0` stops it).
    pub fn keep_growing_during_fetch(&self, path: &str, extra: usize) {
        self.state()
            .definitions
            .entry(path.to_string())
            .or_default()
            .growth_per_fetch = extra;
    }

    pub fn fail_open(&self, status: Option<PdhStatus>) {
        self.state().open_failure = status;
    }

    pub fn fail_collect(&self, status: Option<PdhStatus>) {
        self.state().collect_failure = status;
    }

    pub fn fail_time_base(&self, status: Option<PdhStatus>) {
        self.state().time_base_failure = status;
    }

    /// Number of query contexts currently open.
    pub fn open_query_count(&self) -> usize {
        self.state().queries.len()
    }

    /// Number of counter handles currently held.
    pub fn open_counter_count(&self) -> usize {
        self.state().counters.len()
    }

    /// Number of counter-info size probes issued.
    pub fn counter_info_calls(&self) -> usize {
        self.state().counter_info_calls
    }

    pub fn collect_calls(&self) -> usize {
        self.state().collect_calls
    }

    pub fn close_query_calls(&self) -> usize {
        self.state().close_query_calls
    }
}

impl PdhApi for MockPdh {
    fn open_query(&mut self) -> Result<QueryHandle, PdhStatus> {
        let mut state = self.state();
        if let Some(status) = state.open_failure {
            return Err(status);
        }
        let handle = state.next_handle();
        state.queries.insert(handle);
        Ok(QueryHandle(handle))
    }

    fn add_counter(&mut self, query: QueryHandle, path: &str) -> Result<CounterHandle, PdhStatus> {
        let mut state = self.state();
        if !state.queries.contains(&query.0) {
            return Err(PdhStatus::INVALID_HANDLE);
        }
        if !state.definitions.contains_key(path) {
            return Err(state.unresolved_status(path));
        }
        let handle = state.next_handle();
        state.counters.insert(
            handle,
            OpenCounter {
                query: query.0,
                path: path.to_string(),
                sampled: None,
            },
        );
        Ok(CounterHandle(handle))
    }

    fn remove_counter(&mut self, counter: CounterHandle) -> PdhStatus {
        match self.state().counters.remove(&counter.0) {
            Some(_) => PdhStatus::SUCCESS,
            None => PdhStatus::INVALID_HANDLE,
        }
    }

    fn close_query(&mut self, query: QueryHandle) -> PdhStatus {
        let mut state = self.state();
        state.close_query_calls += 1;
        if state.queries.remove(&query.0) {
            PdhStatus::SUCCESS
        } else {
            PdhStatus::INVALID_HANDLE
        }
    }

    fn collect_query_data(&mut self, query: QueryHandle) -> PdhStatus {
        let mut state = self.state();
        state.collect_calls += 1;
        if !state.queries.contains(&query.0) {
            return PdhStatus::INVALID_HANDLE;
        }
        if let Some(status) = state.collect_failure {
            return status;
        }
        let MockState {
            counters,
            definitions,
            ..
        } = &mut *state;
        for counter in counters.values_mut().filter(|c| c.query == query.0) {
            let items = definitions
                .get(&counter.path)
                .map(|d| d.items.clone())
                .unwrap_or_default();
            counter.sampled = Some(items);
        }
        PdhStatus::SUCCESS
    }

    fn counter_info(&mut self, counter: CounterHandle, buffer: &mut ProbeBuffer) -> PdhStatus {
        let mut state = self.state();
        if !buffer.is_allocated() {
            state.counter_info_calls += 1;
        }
        let Some(path) = state.counters.get(&counter.0).map(|c| c.path.clone()) else {
            return PdhStatus::INVALID_HANDLE;
        };
        let Some(definition) = state.definitions.get(&path).cloned() else {
            return PdhStatus::CSTATUS_NO_COUNTER;
        };

        let required = (INFO_WORDS * 8) as u32;
        if buffer.capacity() < required as usize {
            *buffer.size_mut() = required;
            return PdhStatus::MORE_DATA;
        }
        let description = state.intern(&definition.description);
        let words = buffer.words_mut();
        words[0] = u64::from(definition.type_code);
        words[1] = description;
        *buffer.size_mut() = required;
        PdhStatus::SUCCESS
    }

    fn counter_time_base(&mut self, counter: CounterHandle) -> Result<i64, PdhStatus> {
        let state = self.state();
        if let Some(status) = state.time_base_failure {
            return Err(status);
        }
        let counter = state
            .counters
            .get(&counter.0)
            .ok_or(PdhStatus::INVALID_HANDLE)?;
        state
            .definitions
            .get(&counter.path)
            .map(|d| d.frequency)
            .ok_or(PdhStatus::CSTATUS_NO_COUNTER)
    }

    fn raw_counter_array(
        &mut self,
        counter: CounterHandle,
        buffer: &mut ProbeBuffer,
        item_count: &mut u32,
    ) -> PdhStatus {
        let mut state = self.state();
        let MockState {
            counters,
            definitions,
            ..
        } = &mut *state;
        let Some(open) = counters.get_mut(&counter.0) else {
            return PdhStatus::INVALID_HANDLE;
        };
        let Some(definition) = definitions.get_mut(&open.path) else {
            return PdhStatus::CSTATUS_NO_COUNTER;
        };
        if let Some(status) = definition.fetch_status {
            return status;
        }
        let Some(sampled) = open.sampled.as_mut() else {
            return PdhStatus::NO_DATA;
        };

        if buffer.is_allocated() && definition.pending_growth > 0 {
            for n in 0..definition.pending_growth {
                sampled.push(MockPdh::item(&format!("HarddiskVolume{}", n + 1), 0, 0));
            }
            definition.pending_growth = 0;
        }
        if buffer.is_allocated() {
            for _ in 0..definition.growth_per_fetch {
                let name = format!("HarddiskVolume{}", sampled.len() + 1);
                sampled.push(MockPdh::item(&name, 0, 0));
            }
        }

        let items = sampled.clone();
        let required = (items.len() * ITEM_WORDS * 8) as u32;
        *item_count = items.len() as u32;
        if required == 0 {
            *buffer.size_mut() = 0;
            return PdhStatus::SUCCESS;
        }
        if buffer.capacity() < required as usize {
            *buffer.size_mut() = required;
            return PdhStatus::MORE_DATA;
        }

        let mut encoded = Vec::with_capacity(items.len() * ITEM_WORDS);
        for item in &items {
            encoded.push(state.intern(&item.name));
            encoded.push(u64::from(item.status.0));
            encoded.push(item.first as u64);
            encoded.push(item.second as u64);
        }
        buffer.words_mut()[..encoded.len()].copy_from_slice(&encoded);
        *buffer.size_mut() = required;
        PdhStatus::SUCCESS
    }

    fn decode_counter_info(&self, buffer: &ProbeBuffer) -> Option<CounterInfo> {
        let words = buffer.words();
        if words.len() < INFO_WORDS {
            return None;
        }
        let state = self.state();
        Some(CounterInfo {
            type_code: words[0] as u32,
            description: state.strings.get(words[1] as usize)?.clone(),
        })
    }

    fn decode_raw_items(&self, buffer: &ProbeBuffer, count: u32) -> Vec<RawCounterItem> {
        let state = self.state();
        buffer
            .words()
            .chunks_exact(ITEM_WORDS)
            .take(count as usize)
            .map(|w| RawCounterItem {
                name: state.strings.get(w[0] as usize).cloned().unwrap_or_default(),
                status: PdhStatus(w[1] as u32),
                first: w[2] as i64,
                second: w[3] as i64,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::probe::probe;
    use crate::collector::transform::PERF_COUNTER_RAWCOUNT;

    #[test]
    fn test_split_path() {
        assert_eq!(
            split_path("\\LogicalDisk(C:)\\% Free Space"),
            Some(("LogicalDisk", Some("C:"), "% Free Space"))
        );
        assert_eq!(
            split_path("\\System\\Processes"),
            Some(("System", None, "Processes"))
        );
        assert_eq!(split_path("LogicalDisk"), None);
    }

    #[test]
    fn test_unresolved_path_statuses() {
        let mut pdh = MockPdh::new();
        pdh.define_counter("\\LogicalDisk(C:)\\% Free Space", PERF_COUNTER_RAWCOUNT, 0);
        let query = pdh.open_query().unwrap();

        assert_eq!(
            pdh.add_counter(query, "\\LogicalDisk(Q:)\\% Free Space"),
            Err(PdhStatus::CSTATUS_NO_INSTANCE)
        );
        assert_eq!(
            pdh.add_counter(query, "\\LogicalDisk(C:)\\Bogus"),
            Err(PdhStatus::CSTATUS_NO_COUNTER)
        );
        assert_eq!(
            pdh.add_counter(query, "\\Nope\\Bogus"),
            Err(PdhStatus::CSTATUS_NO_OBJECT)
        );
    }

    #[test]
    fn test_raw_array_before_collect_has_no_data() {
        let mut pdh = MockPdh::new();
        let path = "\\System\\Processes";
        pdh.define_counter(path, PERF_COUNTER_RAWCOUNT, 0);
        pdh.set_items(path, vec![MockPdh::item("", 245, 0)]);
        let query = pdh.open_query().unwrap();
        let counter = pdh.add_counter(query, path).unwrap();

        let mut buffer = ProbeBuffer::new();
        let mut count = 0;
        assert_eq!(
            pdh.raw_counter_array(counter, &mut buffer, &mut count),
            PdhStatus::NO_DATA
        );

        assert!(pdh.collect_query_data(query).is_success());
        probe(&mut buffer, |buf| pdh.raw_counter_array(counter, buf, &mut count)).unwrap();
        let items = pdh.decode_raw_items(&buffer, count);
        assert_eq!(items, vec![MockPdh::item("", 245, 0)]);
    }

    #[test]
    fn test_handle_accounting() {
        let mut pdh = MockPdh::new();
        let path = "\\System\\Processes";
        pdh.define_counter(path, PERF_COUNTER_RAWCOUNT, 0);
        let query = pdh.open_query().unwrap();
        let counter = pdh.add_counter(query, path).unwrap();
        assert_eq!(pdh.open_query_count(), 1);
        assert_eq!(pdh.open_counter_count(), 1);

        assert!(pdh.close_query(query).is_success());
        // Closing the query alone leaves the counter handle accounted for.
        assert_eq!(pdh.open_counter_count(), 1);
        assert!(pdh.remove_counter(counter).is_success());
        assert_eq!(pdh.open_counter_count(), 0);
        assert_eq!(pdh.remove_counter(counter), PdhStatus::INVALID_HANDLE);
    }
}
