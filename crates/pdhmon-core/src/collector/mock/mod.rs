//! Mock PDH subsystem for testing without Windows.
//!
//! Provides `MockPdh`, an in-memory implementation of `PdhApi`,
//! plus pre-built scenarios for common objects.

mod pdh;
mod scenarios;

pub use pdh::MockPdh;
