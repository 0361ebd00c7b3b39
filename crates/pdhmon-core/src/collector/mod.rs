//! Performance counter collector for Windows.
//!
//! This module reads performance objects through the PDH (Performance Data
//! Helper) subsystem, with an in-memory mock for testing on other platforms.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Collector                           │
//! │  ┌─────────────────────┐   ┌─────────────────────────────┐  │
//! │  │       Query         │   │        transform            │  │
//! │  │  - counters         │   │  - PERF_ELAPSED_TIME        │  │
//! │  │  - instance handles │   │  - PERF_100NSEC_TIMER       │  │
//! │  └──────────┬──────────┘   └──────────────┬──────────────┘  │
//! │             └──────────────┬──────────────┘                 │
//! │                            │                                │
//! │                     ┌──────▼──────┐                         │
//! │                     │   PdhApi    │ (trait) + probe         │
//! │                     └──────┬──────┘                         │
//! └────────────────────────────┼────────────────────────────────┘
//!                              │
//!              ┌───────────────┼───────────────┐
//!              │               │               │
//!       ┌──────▼──────┐ ┌──────▼──────┐ ┌──────▼──────┐
//!       │   RealPdh   │ │   MockPdh   │ │  Scenarios  │
//!       │ (Windows)   │ │ (Testing)   │ │ (Fixtures)  │
//!       └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! # Usage
//!
//! ## Production (Windows)
//!
//! ```ignore
//! use pdhmon_core::collector::{Collector, RealPdh};
//!
//! let instances = vec!["C:".to_string()];
//! let counters = vec!["% Free Space".to_string()];
//! let mut collector = Collector::new(RealPdh::new(), "LogicalDisk", &instances, &counters)?;
//! let snapshot = collector.collect()?;
//! ```
//!
//! ## Testing (with MockPdh)
//!
//! ```
//! use pdhmon_core::collector::{Collector, MockPdh};
//!
//! let pdh = MockPdh::logical_disk();
//! let instances = vec!["C:".to_string(), "D:".to_string()];
//! let counters = vec!["% Free Space".to_string()];
//! let mut collector = Collector::new(pdh, "LogicalDisk", &instances, &counters).unwrap();
//! let snapshot = collector.collect().unwrap();
//! assert!(snapshot.get("C:", "% Free Space").is_some());
//! ```

#[allow(clippy::module_inception)]
mod collector;
pub mod error;
pub mod mock;
#[cfg(windows)]
mod native;
pub mod probe;
pub mod query;
pub mod status;
pub mod traits;
pub mod transform;

pub use collector::{Collector, CollectorTiming};
pub use error::CollectError;
pub use mock::MockPdh;
#[cfg(windows)]
pub use native::RealPdh;
pub use query::{CounterMetadata, NO_INSTANCE};
pub use status::{PdhStatus, StatusClass};
pub use traits::PdhApi;
