//! Step values stored in a flow.
//!
//! Steps are type-erased so that a flow can hold an ordered list of them
//! regardless of each step's input and output types. Type compatibility is
//! enforced by the generic `Flow` builder before a step is ever erased.

use super::RetryPolicy;
use crate::context::ExecutionContext;
use crate::errors::{FlowError, Result};
use crate::stages::SharedTransform;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::{type_name, Any};
use std::sync::Arc;
use std::time::Duration;

/// Values flowing between steps.
pub(crate) type Value = Arc<dyn Any + Send + Sync>;

/// A type-erased step function.
pub(crate) type ErasedFn =
    Arc<dyn Fn(Value, ExecutionContext) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Turns the ordered member results of a group into the group's output.
pub(crate) type Collector = Arc<dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync>;

/// Marker for types that can flow through a pipeline.
///
/// Step inputs are cloned for every attempt and every group member, so they
/// must be `Clone`; they cross task boundaries, so they must be `Send + Sync`.
pub trait FlowValue: Clone + Send + Sync + 'static {}

impl<T> FlowValue for T where T: Clone + Send + Sync + 'static {}

/// Per-step execution policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepPolicy {
    /// Label used in diagnostics and exposed through the execution context.
    pub name: Option<String>,
    /// Retry policy set on this step; falls back to the flow default.
    pub retry: Option<RetryPolicy>,
    /// Step-specific timeout; takes precedence over the flow default.
    pub timeout: Option<Duration>,
}

#[derive(Clone)]
pub(crate) enum StepBody {
    Single(ErasedFn),
    Group { members: Arc<[ErasedFn]>, collect: Collector },
}

/// One unit of flow work: a single function, or a group of functions run
/// concurrently on the same input.
#[derive(Clone)]
pub struct Step {
    pub(crate) body: StepBody,
    pub(crate) policy: StepPolicy,
}

impl Step {
    pub(crate) fn single<T, U>(transform: SharedTransform<T, U>) -> Self
    where
        T: FlowValue,
        U: FlowValue,
    {
        Self {
            body: StepBody::Single(erase(transform)),
            policy: StepPolicy::default(),
        }
    }

    pub(crate) fn group<T, U>(transforms: Vec<SharedTransform<T, U>>) -> Self
    where
        T: FlowValue,
        U: FlowValue,
    {
        let members: Vec<ErasedFn> = transforms.into_iter().map(erase).collect();
        let collect: Collector = Arc::new(|values: Vec<Value>| {
            let items = values
                .into_iter()
                .map(unwrap_value::<U>)
                .collect::<Result<Vec<U>>>()?;
            Ok(Arc::new(items) as Value)
        });

        Self {
            body: StepBody::Group {
                members: members.into(),
                collect,
            },
            policy: StepPolicy::default(),
        }
    }

    /// Returns the step's policy.
    #[must_use]
    pub fn policy(&self) -> &StepPolicy {
        &self.policy
    }

    /// Returns the step's name, if set.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.policy.name.as_deref()
    }

    /// Returns true for a group step.
    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self.body, StepBody::Group { .. })
    }

    /// Returns the number of functions this step runs.
    #[must_use]
    pub fn width(&self) -> usize {
        match &self.body {
            StepBody::Single(_) => 1,
            StepBody::Group { members, .. } => members.len(),
        }
    }

    pub(crate) fn with_policy(&self, policy: StepPolicy) -> Self {
        Self {
            body: self.body.clone(),
            policy,
        }
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("group", &self.is_group())
            .field("width", &self.width())
            .field("policy", &self.policy)
            .finish()
    }
}

fn erase<T, U>(transform: SharedTransform<T, U>) -> ErasedFn
where
    T: FlowValue,
    U: FlowValue,
{
    Arc::new(move |value: Value, ctx: ExecutionContext| {
        let transform = Arc::clone(&transform);
        async move {
            let input = value
                .downcast_ref::<T>()
                .cloned()
                .ok_or_else(|| type_mismatch::<T>())?;
            let output = transform
                .apply(input, ctx)
                .await
                .map_err(FlowError::from_step_error)?;
            Ok(Arc::new(output) as Value)
        }
        .boxed()
    })
}

/// Recovers a typed value, cloning only when the value is still shared.
pub(crate) fn unwrap_value<T: FlowValue>(value: Value) -> Result<T> {
    let typed = value.downcast::<T>().map_err(|_| type_mismatch::<T>())?;
    Ok(Arc::try_unwrap(typed).unwrap_or_else(|shared| (*shared).clone()))
}

fn type_mismatch<T>() -> FlowError {
    FlowError::Internal(format!("step value is not a {}", type_name::<T>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::stages::from_fn;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(CancellationToken::new())
    }

    #[tokio::test]
    async fn test_single_step_round_trip() {
        let step = Step::single(from_fn(|n: u32, _ctx| async move { Ok(n * 10) }));
        let StepBody::Single(func) = &step.body else {
            panic!("expected single step");
        };

        let out = func(Arc::new(4u32), ctx()).await.unwrap();
        assert_eq!(unwrap_value::<u32>(out).unwrap(), 40);
        assert_eq!(step.width(), 1);
        assert!(!step.is_group());
    }

    #[tokio::test]
    async fn test_wrong_input_type_is_internal_error() {
        let step = Step::single(from_fn(|n: u32, _ctx| async move { Ok(n) }));
        let StepBody::Single(func) = &step.body else {
            panic!("expected single step");
        };

        let err = func(Arc::new("text"), ctx()).await.unwrap_err();
        assert!(matches!(err, FlowError::Internal(_)));
    }

    #[test]
    fn test_group_collector_keeps_order() {
        let step = Step::group(vec![
            from_fn(|n: u32, _ctx| async move { Ok(n) }),
            from_fn(|n: u32, _ctx| async move { Ok(n + 1) }),
        ]);
        let StepBody::Group { members, collect } = &step.body else {
            panic!("expected group step");
        };
        assert_eq!(members.len(), 2);

        let values: Vec<Value> = vec![Arc::new(5u32) as Value, Arc::new(6u32) as Value];
        let out = collect(values).unwrap();
        assert_eq!(unwrap_value::<Vec<u32>>(out).unwrap(), vec![5, 6]);
    }

    #[test]
    fn test_with_policy_leaves_original_untouched() {
        let step = Step::single(from_fn(|n: u32, _ctx| async move { Ok(n) }));
        let named = step.with_policy(StepPolicy {
            name: Some("renamed".to_string()),
            ..StepPolicy::default()
        });

        assert_eq!(step.name(), None);
        assert_eq!(named.name(), Some("renamed"));
    }

    #[test]
    fn test_unwrap_shared_value_clones() {
        let value: Value = Arc::new(String::from("shared"));
        let keep = Arc::clone(&value);
        assert_eq!(unwrap_value::<String>(value).unwrap(), "shared");
        assert_eq!(keep.downcast_ref::<String>().unwrap(), "shared");
    }
}
