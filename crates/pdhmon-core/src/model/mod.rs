//! Collection results handed to the exposition layer.

pub mod snapshot;

pub use snapshot::{ComputedValue, Snapshot, ValueKind};
