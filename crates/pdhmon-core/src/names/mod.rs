//! Localized counter names and help texts.
//!
//! Windows publishes both as index/string lists under `HKEY_PERFORMANCE_DATA`.
//! Each table is read once, on first use, and is read-only afterwards.

#[cfg(windows)]
mod registry;
mod table;

use std::sync::LazyLock;

use tracing::debug;
#[cfg(windows)]
use tracing::warn;

use crate::collector::probe::FixedGrowth;

pub use table::NameTable;

/// Registry value holding English counter names.
pub const COUNTER_NAMES_VALUE: &str = "Counter 009";
/// Registry value holding English help texts.
pub const HELP_TEXTS_VALUE: &str = "Help 009";

/// Registry reads start at 128 KiB and grow by 64 KiB per retry.
#[cfg_attr(not(windows), allow(dead_code))]
const REGISTRY_GROWTH: FixedGrowth = FixedGrowth {
    initial: 128 * 1024,
    step: 64 * 1024,
};

/// Enough sized calls to reach 2 MiB.
#[cfg_attr(not(windows), allow(dead_code))]
const REGISTRY_MAX_ATTEMPTS: usize = 31;

static COUNTER_NAMES: LazyLock<NameTable> = LazyLock::new(|| load(COUNTER_NAMES_VALUE));
static HELP_TEXTS: LazyLock<NameTable> = LazyLock::new(|| load(HELP_TEXTS_VALUE));

/// Process-wide counter name table.
///
/// Empty when the registry could not be read.
pub fn counter_names() -> &'static NameTable {
    &COUNTER_NAMES
}

/// Process-wide help text table, keyed by the same indices as [`counter_names`]
/// plus one.
pub fn help_texts() -> &'static NameTable {
    &HELP_TEXTS
}

#[cfg(windows)]
fn load(value: &str) -> NameTable {
    match registry::read_performance_value(value) {
        Ok(blob) => {
            let table = NameTable::parse(&blob);
            debug!(value, entries = table.len(), "loaded name table");
            table
        }
        Err(status) => {
            warn!(value, %status, "failed to read name table");
            NameTable::default()
        }
    }
}

#[cfg(not(windows))]
fn load(value: &str) -> NameTable {
    debug!(value, "name tables are only available on Windows");
    NameTable::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_built_once() {
        assert!(std::ptr::eq(counter_names(), counter_names()));

        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| counter_names() as *const NameTable as usize))
            .collect();
        let first = counter_names() as *const NameTable as usize;
        for handle in handles {
            assert_eq!(handle.join().unwrap(), first);
        }
    }

    #[test]
    fn test_registry_sizing_reaches_large_blobs() {
        use crate::collector::probe::{ProbeBuffer, probe_bounded};
        use crate::collector::status::PdhStatus;

        let blob_size = 900 * 1024;
        let mut buffer = ProbeBuffer::new();
        probe_bounded(&mut buffer, REGISTRY_MAX_ATTEMPTS, |buf| {
            let offered = buf.capacity() as u32;
            if offered >= blob_size {
                return PdhStatus::SUCCESS;
            }
            let next = REGISTRY_GROWTH.next_size(0, offered);
            *buf.size_mut() = next;
            PdhStatus::MORE_DATA
        })
        .unwrap();
        assert!(buffer.size() >= blob_size);

        let largest = REGISTRY_GROWTH.initial as usize
            + (REGISTRY_MAX_ATTEMPTS - 1) * REGISTRY_GROWTH.step as usize;
        assert_eq!(largest, 2 * 1024 * 1024);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_tables_empty_off_windows() {
        assert!(counter_names().is_empty());
        assert!(help_texts().is_empty());
        assert_eq!(counter_names().lookup_index("Processor"), None);
    }
}
