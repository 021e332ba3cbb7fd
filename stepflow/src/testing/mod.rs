//! Testing utilities for stepflow.
//!
//! This module provides:
//! - Probes for measuring concurrency and attempt timing
//! - Mock transforms that record calls and fail on demand

mod mocks;
mod probes;

pub use mocks::{FlakyTransform, RecordingTransform};
pub use probes::{CallLog, InFlightGuard, InFlightTracker};
