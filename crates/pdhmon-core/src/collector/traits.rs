//! Abstraction over the native performance-counter subsystem.
//!
//! The `PdhApi` trait lets the collector run against the real PDH library on
//! Windows and against an in-memory mock everywhere else (tests, CI, macOS).

use crate::collector::probe::ProbeBuffer;
use crate::collector::status::PdhStatus;

/// Opaque token for a native query context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryHandle(pub usize);

/// Opaque token for a native counter handle bound to one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CounterHandle(pub usize);

/// Counter metadata decoded from a counter-info buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterInfo {
    /// Declared counter type code (`PERF_*`).
    pub type_code: u32,
    /// Explain text, empty when the provider has none.
    pub description: String,
}

/// One item of a raw counter array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCounterItem {
    /// Live instance name as reported by the subsystem (may be empty).
    pub name: String,
    /// Per-item data status.
    pub status: PdhStatus,
    pub first: i64,
    pub second: i64,
}

/// Native performance-counter operations.
///
/// Calls that return variable-length data (`counter_info`,
/// `raw_counter_array`) follow the probe protocol: with an unallocated
/// [`ProbeBuffer`] they report the required byte size through
/// [`ProbeBuffer::size_mut`] and return [`PdhStatus::MORE_DATA`]. The
/// matching `decode_*` method interprets the filled buffer; the engine never
/// looks at raw bytes itself.
pub trait PdhApi {
    /// Acquires a new query context.
    fn open_query(&mut self) -> Result<QueryHandle, PdhStatus>;

    /// Adds an English (locale independent) counter path to `query`.
    fn add_counter(&mut self, query: QueryHandle, path: &str) -> Result<CounterHandle, PdhStatus>;

    /// Releases one counter handle.
    fn remove_counter(&mut self, counter: CounterHandle) -> PdhStatus;

    /// Releases a query context.
    fn close_query(&mut self, query: QueryHandle) -> PdhStatus;

    /// Samples every counter of `query`.
    fn collect_query_data(&mut self, query: QueryHandle) -> PdhStatus;

    /// Fills `buffer` with counter metadata, explain text included.
    fn counter_info(&mut self, counter: CounterHandle, buffer: &mut ProbeBuffer) -> PdhStatus;

    /// Returns the counter's time base in ticks per second.
    fn counter_time_base(&mut self, counter: CounterHandle) -> Result<i64, PdhStatus>;

    /// Fills `buffer` with the raw counter array of the last collection.
    fn raw_counter_array(
        &mut self,
        counter: CounterHandle,
        buffer: &mut ProbeBuffer,
        item_count: &mut u32,
    ) -> PdhStatus;

    /// Decodes a buffer filled by [`PdhApi::counter_info`].
    fn decode_counter_info(&self, buffer: &ProbeBuffer) -> Option<CounterInfo>;

    /// Decodes `count` items from a buffer filled by [`PdhApi::raw_counter_array`].
    fn decode_raw_items(&self, buffer: &ProbeBuffer, count: u32) -> Vec<RawCounterItem>;
}
