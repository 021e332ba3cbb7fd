//! Transform trait and implementations.
//!
//! A transform is the unit of work a flow step invokes. Closures are adapted
//! with [`from_fn`]; stateful or reusable transforms implement [`Transform`]
//! directly.

use crate::context::ExecutionContext;
use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

/// Trait for flow transforms.
///
/// The engine treats a transform as a capability it invokes, possibly several
/// times for the same input when retries are configured.
#[async_trait]
pub trait Transform<I: Send + 'static, O>: Send + Sync {
    /// Applies the transform to one input.
    ///
    /// # Arguments
    ///
    /// * `input` - The output of the previous step (or the flow input)
    /// * `ctx` - Snapshot of the run context for this attempt
    async fn apply(&self, input: I, ctx: ExecutionContext) -> anyhow::Result<O>;
}

/// A shared, type-erased transform.
pub type SharedTransform<I, O> = Arc<dyn Transform<I, O>>;

/// An async function-based transform.
pub struct FnTransform<F> {
    func: F,
}

impl<F> FnTransform<F> {
    /// Creates a new function-based transform.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnTransform<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTransform").finish_non_exhaustive()
    }
}

#[async_trait]
impl<I, O, F, Fut> Transform<I, O> for FnTransform<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
{
    async fn apply(&self, input: I, ctx: ExecutionContext) -> anyhow::Result<O> {
        (self.func)(input, ctx).await
    }
}

/// Wraps an async closure as a shared transform.
///
/// Useful for building the member list of a group, whose closures would
/// otherwise all need the same concrete type.
pub fn from_fn<I, O, F, Fut>(func: F) -> SharedTransform<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
{
    Arc::new(FnTransform::new(func))
}
