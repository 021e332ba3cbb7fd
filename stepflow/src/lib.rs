//! # Stepflow
//!
//! An execution engine for pipelines of asynchronous steps.
//!
//! Stepflow runs an ordered sequence of transforms with support for:
//!
//! - **Typed composition**: each step's input type is checked against the
//!   previous step's output at compile time
//! - **Persistent flow definitions**: builder calls return new flows that
//!   share their prefix; flows are cheap to clone and safe to run concurrently
//! - **Retry with exponential backoff** and **per-step or flow-wide timeouts**
//! - **Parallel groups**: several transforms run concurrently on the same input
//! - **Bounded batches**: one run per input under a concurrency ceiling
//! - **Cooperative cancellation** polled before every step and attempt
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepflow::prelude::*;
//! use std::time::Duration;
//!
//! let flow = Flow::new()
//!     .step(|n: u32, _ctx| async move { Ok(n + 1) })
//!     .name("increment")
//!     .retry(3, Duration::from_millis(50))
//!     .step(|n: u32, _ctx| async move { Ok(n * 2) })
//!     .timeout(Duration::from_secs(5));
//!
//! assert_eq!(flow.run(1).await?, 4);
//!
//! let outputs = flow
//!     .run_many(vec![1, 2, 3], BatchOptions::new().with_concurrency(2))
//!     .await?;
//! assert_eq!(outputs, vec![4, 6, 8]);
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod context;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{sleep_or_cancel, with_timeout, CancellationToken};
    pub use crate::context::ExecutionContext;
    pub use crate::errors::{FlowError, Result};
    pub use crate::observability::{init_json_tracing, init_tracing};
    pub use crate::pipeline::{
        execute_step, BatchOptions, Flow, FlowDefaults, FlowValue, RetryPolicy, RunOptions,
        Step, StepPolicy,
    };
    pub use crate::stages::{from_fn, FnTransform, SharedTransform, Transform};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[tokio::test]
    async fn prelude_covers_common_usage() {
        let flow = Flow::new()
            .step(|n: u32, _ctx| async move { Ok(n + 1) })
            .step(|n: u32, _ctx| async move { Ok(n * 2) });

        assert_eq!(flow.run(1).await, Ok(4));
        let outputs = flow
            .run_many(vec![1, 2, 3], BatchOptions::new().with_concurrency(2))
            .await;
        assert_eq!(outputs, Ok(vec![4, 6, 8]));
    }
}
