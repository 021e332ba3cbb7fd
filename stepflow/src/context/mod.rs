//! Execution context for flow runs.

mod execution;

pub use execution::ExecutionContext;
