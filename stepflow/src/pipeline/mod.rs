//! Flow definition and execution.
//!
//! This module provides:
//! - The persistent `Flow` builder and its step values
//! - The single-step executor (retry, backoff, timeout)
//! - The sequential runner and the bounded-concurrency batch scheduler
//! - Flow, run and batch configuration

mod batch;
mod config;
mod flow;
mod retry;
mod runner;
mod step;


pub use batch::WorkCursor;
pub use config::{BatchOptions, FlowDefaults, RunOptions};
pub use flow::Flow;
pub use retry::{execute_step, RetryPolicy, DEFAULT_RETRY_DELAY_MS};
pub use step::{FlowValue, Step, StepPolicy};
