//! Native PDH status codes and their classification.
//!
//! Raw status codes only drive control flow here: everything past this
//! module works with [`StatusClass`] and keeps the code as diagnostic payload.

use std::fmt;

use serde::Serialize;

/// A raw status code returned by the performance-counter subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PdhStatus(pub u32);

/// How a non-success status is handled by the per-cycle protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The call completed.
    Success,
    /// The supplied buffer was too small; the required size has been reported.
    MoreData,
    /// Expected absence of data for one counter instance; skip it this cycle.
    Recoverable,
    /// Anything else; aborts the current operation.
    Fatal,
}

impl PdhStatus {
    pub const SUCCESS: Self = Self(0x0000_0000);
    pub const CSTATUS_VALID_DATA: Self = Self(0x0000_0000);
    pub const CSTATUS_NEW_DATA: Self = Self(0x0000_0001);
    pub const CSTATUS_NO_MACHINE: Self = Self(0x8000_07D0);
    pub const CSTATUS_NO_INSTANCE: Self = Self(0x8000_07D1);
    pub const MORE_DATA: Self = Self(0x8000_07D2);
    pub const CSTATUS_ITEM_NOT_VALIDATED: Self = Self(0x8000_07D3);
    pub const RETRY: Self = Self(0x8000_07D4);
    pub const NO_DATA: Self = Self(0x8000_07D5);
    pub const CALC_NEGATIVE_DENOMINATOR: Self = Self(0x8000_07D6);
    pub const CALC_NEGATIVE_TIMEBASE: Self = Self(0x8000_07D7);
    pub const CALC_NEGATIVE_VALUE: Self = Self(0x8000_07D8);
    pub const CSTATUS_NO_OBJECT: Self = Self(0xC000_0BB8);
    pub const CSTATUS_NO_COUNTER: Self = Self(0xC000_0BB9);
    pub const CSTATUS_INVALID_DATA: Self = Self(0xC000_0BBA);
    pub const MEMORY_ALLOCATION_FAILURE: Self = Self(0xC000_0BBB);
    pub const INVALID_HANDLE: Self = Self(0xC000_0BBC);
    pub const INVALID_ARGUMENT: Self = Self(0xC000_0BBD);
    pub const FUNCTION_NOT_FOUND: Self = Self(0xC000_0BBE);
    pub const CSTATUS_NO_COUNTERNAME: Self = Self(0xC000_0BBF);
    pub const CSTATUS_BAD_COUNTERNAME: Self = Self(0xC000_0BC0);
    pub const INVALID_BUFFER: Self = Self(0xC000_0BC1);
    pub const INSUFFICIENT_BUFFER: Self = Self(0xC000_0BC2);
    pub const CANNOT_CONNECT_MACHINE: Self = Self(0xC000_0BC3);
    pub const INVALID_PATH: Self = Self(0xC000_0BC4);
    pub const INVALID_INSTANCE: Self = Self(0xC000_0BC5);
    pub const INVALID_DATA: Self = Self(0xC000_0BC6);
    pub const CANNOT_READ_NAME_STRINGS: Self = Self(0xC000_0BC8);

    const NAMES: &'static [(PdhStatus, &'static str)] = &[
        (Self::SUCCESS, "ERROR_SUCCESS"),
        (Self::CSTATUS_NEW_DATA, "PDH_CSTATUS_NEW_DATA"),
        (Self::CSTATUS_NO_MACHINE, "PDH_CSTATUS_NO_MACHINE"),
        (Self::CSTATUS_NO_INSTANCE, "PDH_CSTATUS_NO_INSTANCE"),
        (Self::MORE_DATA, "PDH_MORE_DATA"),
        (Self::CSTATUS_ITEM_NOT_VALIDATED, "PDH_CSTATUS_ITEM_NOT_VALIDATED"),
        (Self::RETRY, "PDH_RETRY"),
        (Self::NO_DATA, "PDH_NO_DATA"),
        (Self::CALC_NEGATIVE_DENOMINATOR, "PDH_CALC_NEGATIVE_DENOMINATOR"),
        (Self::CALC_NEGATIVE_TIMEBASE, "PDH_CALC_NEGATIVE_TIMEBASE"),
        (Self::CALC_NEGATIVE_VALUE, "PDH_CALC_NEGATIVE_VALUE"),
        (Self::CSTATUS_NO_OBJECT, "PDH_CSTATUS_NO_OBJECT"),
        (Self::CSTATUS_NO_COUNTER, "PDH_CSTATUS_NO_COUNTER"),
        (Self::CSTATUS_INVALID_DATA, "PDH_CSTATUS_INVALID_DATA"),
        (Self::MEMORY_ALLOCATION_FAILURE, "PDH_MEMORY_ALLOCATION_FAILURE"),
        (Self::INVALID_HANDLE, "PDH_INVALID_HANDLE"),
        (Self::INVALID_ARGUMENT, "PDH_INVALID_ARGUMENT"),
        (Self::FUNCTION_NOT_FOUND, "PDH_FUNCTION_NOT_FOUND"),
        (Self::CSTATUS_NO_COUNTERNAME, "PDH_CSTATUS_NO_COUNTERNAME"),
        (Self::CSTATUS_BAD_COUNTERNAME, "PDH_CSTATUS_BAD_COUNTERNAME"),
        (Self::INVALID_BUFFER, "PDH_INVALID_BUFFER"),
        (Self::INSUFFICIENT_BUFFER, "PDH_INSUFFICIENT_BUFFER"),
        (Self::CANNOT_CONNECT_MACHINE, "PDH_CANNOT_CONNECT_MACHINE"),
        (Self::INVALID_PATH, "PDH_INVALID_PATH"),
        (Self::INVALID_INSTANCE, "PDH_INVALID_INSTANCE"),
        (Self::INVALID_DATA, "PDH_INVALID_DATA"),
        (Self::CANNOT_READ_NAME_STRINGS, "PDH_CANNOT_READ_NAME_STRINGS"),
    ];

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    pub fn is_more_data(self) -> bool {
        self == Self::MORE_DATA
    }

    /// Per-item data status: the sample carries a usable value.
    pub fn has_data(self) -> bool {
        self == Self::CSTATUS_VALID_DATA || self == Self::CSTATUS_NEW_DATA
    }

    /// Classifies a status returned while fetching one counter instance.
    pub fn classify(self) -> StatusClass {
        match self {
            Self::SUCCESS => StatusClass::Success,
            Self::MORE_DATA => StatusClass::MoreData,
            Self::INVALID_DATA
            | Self::CALC_NEGATIVE_DENOMINATOR
            | Self::CALC_NEGATIVE_VALUE
            | Self::CSTATUS_INVALID_DATA
            | Self::CSTATUS_NO_INSTANCE
            | Self::NO_DATA => StatusClass::Recoverable,
            _ => StatusClass::Fatal,
        }
    }

    /// Converts a plain success/failure reply into a `Result`.
    pub fn ok(self) -> Result<(), PdhStatus> {
        if self.is_success() { Ok(()) } else { Err(self) }
    }

    /// Symbolic name of the status, if it is one the engine knows about.
    pub fn name(self) -> Option<&'static str> {
        Self::NAMES
            .iter()
            .find(|(status, _)| *status == self)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for PdhStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_statuses() {
        for status in [
            PdhStatus::INVALID_DATA,
            PdhStatus::CALC_NEGATIVE_DENOMINATOR,
            PdhStatus::CALC_NEGATIVE_VALUE,
            PdhStatus::CSTATUS_INVALID_DATA,
            PdhStatus::CSTATUS_NO_INSTANCE,
            PdhStatus::NO_DATA,
        ] {
            assert_eq!(status.classify(), StatusClass::Recoverable, "{}", status);
        }
    }

    #[test]
    fn test_fatal_statuses() {
        for status in [
            PdhStatus::INVALID_HANDLE,
            PdhStatus::CSTATUS_NO_OBJECT,
            PdhStatus::MEMORY_ALLOCATION_FAILURE,
            PdhStatus(0xDEAD_BEEF),
        ] {
            assert_eq!(status.classify(), StatusClass::Fatal, "{}", status);
        }
        assert_eq!(PdhStatus::MORE_DATA.classify(), StatusClass::MoreData);
        assert_eq!(PdhStatus::SUCCESS.classify(), StatusClass::Success);
    }

    #[test]
    fn test_item_data_status() {
        assert!(PdhStatus::CSTATUS_VALID_DATA.has_data());
        assert!(PdhStatus::CSTATUS_NEW_DATA.has_data());
        assert!(!PdhStatus::CSTATUS_NO_INSTANCE.has_data());
    }

    #[test]
    fn test_display() {
        assert_eq!(PdhStatus::NO_DATA.to_string(), "PDH_NO_DATA (0x800007D5)");
        assert_eq!(PdhStatus(0x1234).to_string(), "0x00001234");
    }
}
