//! Error taxonomy for collector construction and collection cycles.

use thiserror::Error;

use crate::collector::status::PdhStatus;

/// Errors surfaced by [`Collector`](crate::collector::Collector).
///
/// Construction errors name the offending object, instance and counter;
/// cycle errors name the failing native operation and its status code.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The subsystem refused to open a query context.
    #[error("failed to open query for {object}: {status}")]
    ResourceExhausted { object: String, status: PdhStatus },

    /// A counter path did not resolve when registering it.
    #[error("unknown counter {path} (object {object}, instance {instance}, counter {counter}): {status}")]
    UnknownCounter {
        object: String,
        instance: String,
        counter: String,
        path: String,
        status: PdhStatus,
    },

    /// A configured counter name was the all-match token.
    #[error("wildcard counter names are not supported (object {object}, instance {instance}, counter {counter})")]
    UnsupportedWildcard {
        object: String,
        instance: String,
        counter: String,
    },

    /// Counter type or time base lookup failed.
    #[error("{operation} failed for {path} (object {object}, instance {instance}, counter {counter}): {reason}")]
    MetadataFailure {
        object: String,
        instance: String,
        counter: String,
        path: String,
        operation: &'static str,
        reason: String,
    },

    /// A native call failed fatally during a collection cycle.
    #[error("{operation} failed{}: {status}", for_counter(.counter))]
    CollectionFailure {
        operation: &'static str,
        /// Counter path of the failing item fetch, if any.
        counter: Option<String>,
        status: PdhStatus,
    },
}

fn for_counter(counter: &Option<String>) -> String {
    counter
        .as_ref()
        .map(|path| format!(" for {path}"))
        .unwrap_or_default()
}

impl CollectError {
    /// The native status carried by this error, if any.
    pub fn status(&self) -> Option<PdhStatus> {
        match self {
            CollectError::ResourceExhausted { status, .. }
            | CollectError::UnknownCounter { status, .. }
            | CollectError::CollectionFailure { status, .. } => Some(*status),
            CollectError::UnsupportedWildcard { .. } | CollectError::MetadataFailure { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_failure_message() {
        let err = CollectError::CollectionFailure {
            operation: "PdhGetRawCounterArrayW",
            counter: Some("\\LogicalDisk(C:)\\% Free Space".to_string()),
            status: PdhStatus::INVALID_HANDLE,
        };
        assert_eq!(
            err.to_string(),
            "PdhGetRawCounterArrayW failed for \\LogicalDisk(C:)\\% Free Space: PDH_INVALID_HANDLE (0xC0000BBC)"
        );
        assert_eq!(err.status(), Some(PdhStatus::INVALID_HANDLE));
    }

    #[test]
    fn test_wildcard_message_names_triple() {
        let err = CollectError::UnsupportedWildcard {
            object: "Processor".to_string(),
            instance: "------".to_string(),
            counter: "*".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Processor"));
        assert!(msg.contains("------"));
        assert!(msg.contains("counter *"));
        assert_eq!(err.status(), None);
    }
}
