//! pdhmon-core - Windows performance counter collection.
//!
//! Provides:
//! - `collector`: PDH query lifecycle, raw array fetch and value transform
//! - `model`: snapshot types handed to the exposition layer
//! - `names`: process-wide counter name and help text tables
//! - `config`: counter group configuration

pub mod collector;
pub mod config;
pub mod model;
pub mod names;
