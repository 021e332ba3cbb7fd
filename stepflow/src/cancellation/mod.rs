//! Cooperative cancellation.
//!
//! This module provides:
//! - CancellationToken, a pollable one-way signal with one-shot callbacks
//! - Waits that compose with a token or a time limit

mod token;
mod wait;

pub use token::{CancelCallback, CancellationToken};
pub use wait::{sleep_or_cancel, with_timeout};
