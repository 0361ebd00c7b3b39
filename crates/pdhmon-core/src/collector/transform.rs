//! Raw sample to value conversion, by declared counter type.
//!
//! Elapsed-time counters are rebased from the Windows epoch and divided by
//! the counter's time base; 100ns timers are scaled to seconds; everything
//! else passes through unscaled. The value kind comes from a static table
//! and never affects the numbers.

use crate::model::{ComputedValue, ValueKind};

// ---------------------------------------------------------------------------
// Counter type codes (winperf.h)
// ---------------------------------------------------------------------------

pub const PERF_COUNTER_RAWCOUNT_HEX: u32 = 0x0000_0000;
pub const PERF_COUNTER_LARGE_RAWCOUNT_HEX: u32 = 0x0000_0100;
pub const PERF_COUNTER_RAWCOUNT: u32 = 0x0001_0000;
pub const PERF_COUNTER_LARGE_RAWCOUNT: u32 = 0x0001_0100;
pub const PERF_COUNTER_DELTA: u32 = 0x0040_0400;
pub const PERF_COUNTER_LARGE_DELTA: u32 = 0x0040_0500;
pub const PERF_COUNTER_COUNTER: u32 = 0x1041_0400;
pub const PERF_COUNTER_BULK_COUNT: u32 = 0x1041_0500;
pub const PERF_RAW_FRACTION: u32 = 0x2002_0400;
pub const PERF_LARGE_RAW_FRACTION: u32 = 0x2002_0500;
pub const PERF_COUNTER_TIMER: u32 = 0x2041_0500;
pub const PERF_100NSEC_TIMER: u32 = 0x2051_0500;
pub const PERF_PRECISION_100NS_TIMER: u32 = 0x2057_0500;
pub const PERF_SAMPLE_FRACTION: u32 = 0x20C2_0400;
pub const PERF_100NSEC_TIMER_INV: u32 = 0x2151_0500;
pub const PERF_AVERAGE_TIMER: u32 = 0x3002_0400;
pub const PERF_ELAPSED_TIME: u32 = 0x3024_0500;

// ---------------------------------------------------------------------------
// Scale constants
// ---------------------------------------------------------------------------

/// 1601-01-01 to 1970-01-01 in 100ns ticks.
pub const WINDOWS_EPOCH: i64 = 116_444_736_000_000_000;

/// 100ns ticks per second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Converts 100ns ticks to seconds.
pub const TICKS_TO_SECONDS_SCALE_FACTOR: f64 = 1.0 / TICKS_PER_SECOND as f64;

/// Value kind per counter type; types not listed are gauges.
const VALUE_KINDS: &[(u32, ValueKind)] = &[
    (PERF_COUNTER_RAWCOUNT_HEX, ValueKind::Gauge),
    (PERF_COUNTER_LARGE_RAWCOUNT_HEX, ValueKind::Gauge),
    (PERF_COUNTER_RAWCOUNT, ValueKind::Gauge),
    (PERF_COUNTER_LARGE_RAWCOUNT, ValueKind::Gauge),
    (PERF_COUNTER_DELTA, ValueKind::Counter),
    (PERF_COUNTER_COUNTER, ValueKind::Counter),
    (PERF_COUNTER_BULK_COUNT, ValueKind::Counter),
    (PERF_RAW_FRACTION, ValueKind::Gauge),
    (PERF_LARGE_RAW_FRACTION, ValueKind::Gauge),
    (PERF_100NSEC_TIMER, ValueKind::Counter),
    (PERF_PRECISION_100NS_TIMER, ValueKind::Counter),
    (PERF_SAMPLE_FRACTION, ValueKind::Gauge),
    (PERF_100NSEC_TIMER_INV, ValueKind::Counter),
    (PERF_ELAPSED_TIME, ValueKind::Gauge),
];

/// Whether the counter type needs a time base to be interpreted.
pub fn is_time_based(type_code: u32) -> bool {
    type_code == PERF_ELAPSED_TIME
}

pub fn value_kind(type_code: u32) -> ValueKind {
    VALUE_KINDS
        .iter()
        .find(|(code, _)| *code == type_code)
        .map(|(_, kind)| *kind)
        .unwrap_or(ValueKind::Gauge)
}

/// Converts one raw component.
///
/// `frequency` is only read for time-based types and must be positive there.
pub fn scale(type_code: u32, frequency: i64, raw: i64) -> f64 {
    match type_code {
        PERF_ELAPSED_TIME => (i128::from(raw) - i128::from(WINDOWS_EPOCH)) as f64 / frequency as f64,
        PERF_100NSEC_TIMER | PERF_PRECISION_100NS_TIMER => raw as f64 * TICKS_TO_SECONDS_SCALE_FACTOR,
        _ => raw as f64,
    }
}

/// Converts a raw `(first, second)` sample into a [`ComputedValue`].
pub fn transform(type_code: u32, frequency: i64, first: i64, second: i64) -> ComputedValue {
    ComputedValue {
        kind: value_kind(type_code),
        first: scale(type_code, frequency, first),
        second: scale(type_code, frequency, second),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_time_rebases_and_divides() {
        let value = transform(PERF_ELAPSED_TIME, 10_000_000, WINDOWS_EPOCH + 50_000_000, 0);
        assert_eq!(value.first, 5.0);
        assert_eq!(value.second, -WINDOWS_EPOCH as f64 / 10_000_000.0);
        assert_eq!(value.kind, ValueKind::Gauge);
    }

    #[test]
    fn test_elapsed_time_components_are_independent() {
        let frequency = 3_579_545;
        let first = WINDOWS_EPOCH + 7 * frequency;
        let second = WINDOWS_EPOCH + 11 * frequency;
        let value = transform(PERF_ELAPSED_TIME, frequency, first, second);
        assert_eq!(value.first, 7.0);
        assert_eq!(value.second, 11.0);
    }

    #[test]
    fn test_elapsed_time_extreme_raw_values() {
        let value = transform(PERF_ELAPSED_TIME, 10_000_000, i64::MIN + 1, i64::MAX);
        let expected_first = (i128::from(i64::MIN + 1) - i128::from(WINDOWS_EPOCH)) as f64 / 1e7;
        let expected_second = (i128::from(i64::MAX) - i128::from(WINDOWS_EPOCH)) as f64 / 1e7;
        assert_eq!(value.first, expected_first);
        assert_eq!(value.second, expected_second);
        assert!(value.first < 0.0);
        assert!(value.second > 0.0);
    }

    #[test]
    fn test_100ns_timers_scale_to_seconds() {
        for type_code in [PERF_100NSEC_TIMER, PERF_PRECISION_100NS_TIMER] {
            let value = transform(type_code, 0, 25_000_000, TICKS_PER_SECOND);
            assert!((value.first - 2.5).abs() < 1e-12);
            assert!((value.second - 1.0).abs() < 1e-12);
            assert_eq!(value.kind, ValueKind::Counter);
        }
    }

    #[test]
    fn test_100ns_scale_preserves_ordering() {
        let a = scale(PERF_100NSEC_TIMER, 0, 1_000);
        let b = scale(PERF_100NSEC_TIMER, 0, 2_000);
        assert!(a < b);
        assert!((b / a - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_other_types_pass_through() {
        for type_code in [
            PERF_COUNTER_RAWCOUNT,
            PERF_COUNTER_COUNTER,
            PERF_100NSEC_TIMER_INV,
            PERF_AVERAGE_TIMER,
            0xFFFF_FFFF,
        ] {
            let value = transform(type_code, 10_000_000, 42, -7);
            assert_eq!(value.first, 42.0);
            assert_eq!(value.second, -7.0);
        }
    }

    #[test]
    fn test_value_kind_table() {
        assert_eq!(value_kind(PERF_COUNTER_COUNTER), ValueKind::Counter);
        assert_eq!(value_kind(PERF_COUNTER_BULK_COUNT), ValueKind::Counter);
        assert_eq!(value_kind(PERF_COUNTER_RAWCOUNT), ValueKind::Gauge);
        assert_eq!(value_kind(PERF_AVERAGE_TIMER), ValueKind::Gauge);
        assert_eq!(value_kind(0x1234_5678), ValueKind::Gauge);
    }

    #[test]
    fn test_time_based_types() {
        assert!(is_time_based(PERF_ELAPSED_TIME));
        assert!(!is_time_based(PERF_100NSEC_TIMER));
    }
}
