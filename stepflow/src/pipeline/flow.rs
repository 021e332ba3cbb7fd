//! Persistent flow definitions.
//!
//! A [`Flow`] is an immutable, ordered list of steps plus flow-level
//! defaults. Every builder call returns a new flow that shares the untouched
//! prefix of steps with the flow it was called on, so a flow can be extended
//! or run from many call sites at once.

use super::step::{FlowValue, Step, StepPolicy};
use super::{FlowDefaults, RetryPolicy};
use crate::cancellation::CancellationToken;
use crate::context::ExecutionContext;
use crate::stages::{from_fn, SharedTransform};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A node of the persistent step list. Nodes point backwards so that
/// appending and replacing the last step never copy the prefix.
struct StepNode {
    step: Step,
    prev: Option<Arc<StepNode>>,
    len: usize,
}

/// An immutable pipeline from `I` to `O`.
///
/// Consecutive steps are type-checked at compile time: a step appended to a
/// `Flow<I, O>` must accept `O`.
pub struct Flow<I, O> {
    /// Flow name, used in tracing spans.
    name: Option<Arc<str>>,
    /// Last step of the persistent step list.
    tail: Option<Arc<StepNode>>,
    /// Timeout for steps that define none.
    default_timeout: Option<Duration>,
    /// Retry policy for steps that define none.
    default_retry: Option<RetryPolicy>,
    /// Token used by runs that supply none.
    default_token: Option<CancellationToken>,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> Clone for Flow<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tail: self.tail.clone(),
            default_timeout: self.default_timeout,
            default_retry: self.default_retry,
            default_token: self.default_token.clone(),
            _types: PhantomData,
        }
    }
}

impl<I: FlowValue> Flow<I, I> {
    /// Creates an empty flow; running it returns its input.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            tail: None,
            default_timeout: None,
            default_retry: None,
            default_token: None,
            _types: PhantomData,
        }
    }

    /// Creates an empty, named flow.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(Arc::from(name.into())),
            ..Self::new()
        }
    }
}

impl<I: FlowValue> Default for Flow<I, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: FlowValue, O: FlowValue> Flow<I, O> {
    /// Appends a single step running `func`.
    #[must_use]
    pub fn step<N, F, Fut>(&self, func: F) -> Flow<I, N>
    where
        N: FlowValue,
        F: Fn(O, ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<N>> + Send + 'static,
    {
        self.then(from_fn(func))
    }

    /// Appends a single step running a shared transform.
    #[must_use]
    pub fn then<N: FlowValue>(&self, transform: SharedTransform<O, N>) -> Flow<I, N> {
        self.push(Step::single(transform))
    }

    /// Appends a group step.
    ///
    /// Every member receives the same input; the output lists member results
    /// in member order.
    #[must_use]
    pub fn group<N: FlowValue>(&self, members: Vec<SharedTransform<O, N>>) -> Flow<I, Vec<N>> {
        self.push(Step::group(members))
    }

    /// Names the last step.
    #[must_use]
    pub fn name(&self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.map_last("name", |policy| policy.name = Some(label))
    }

    /// Sets the retry policy of the last step.
    #[must_use]
    pub fn retry(&self, retries: u32, delay: Duration) -> Self {
        self.retry_policy(RetryPolicy::new(retries).with_delay(delay))
    }

    /// Sets the retry policy of the last step from a policy value.
    #[must_use]
    pub fn retry_policy(&self, policy: RetryPolicy) -> Self {
        self.map_last("retry", |p| p.retry = Some(policy))
    }

    /// Sets a timeout for the last step, overriding the flow default.
    #[must_use]
    pub fn step_timeout(&self, limit: Duration) -> Self {
        self.map_last("step_timeout", |p| p.timeout = Some(limit))
    }

    /// Sets the flow-level default timeout.
    #[must_use]
    pub fn timeout(&self, limit: Duration) -> Self {
        Self {
            default_timeout: Some(limit),
            ..self.clone()
        }
    }

    /// Sets the flow-level default retry policy.
    #[must_use]
    pub fn default_retry(&self, policy: RetryPolicy) -> Self {
        Self {
            default_retry: Some(policy),
            ..self.clone()
        }
    }

    /// Binds a default cancellation token.
    #[must_use]
    pub fn with_token(&self, token: CancellationToken) -> Self {
        Self {
            default_token: Some(token),
            ..self.clone()
        }
    }

    /// Applies flow-level defaults loaded from configuration.
    ///
    /// Fields absent from `defaults` leave the current values in place.
    #[must_use]
    pub fn with_defaults(&self, defaults: &FlowDefaults) -> Self {
        Self {
            default_timeout: defaults.timeout().or(self.default_timeout),
            default_retry: defaults.retry.or(self.default_retry),
            ..self.clone()
        }
    }

    /// Returns the flow name.
    #[must_use]
    pub fn flow_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tail.as_ref().map_or(0, |node| node.len)
    }

    /// Returns true if the flow has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tail.is_none()
    }

    /// Returns the flow-level default timeout.
    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Returns the flow-level default token.
    #[must_use]
    pub fn default_token(&self) -> Option<&CancellationToken> {
        self.default_token.as_ref()
    }

    /// Returns the steps in execution order.
    #[must_use]
    pub fn steps(&self) -> Vec<Step> {
        let mut steps = Vec::with_capacity(self.len());
        let mut node = self.tail.as_deref();
        while let Some(current) = node {
            steps.push(current.step.clone());
            node = current.prev.as_deref();
        }
        steps.reverse();
        steps
    }

    /// Returns the step names in execution order.
    #[must_use]
    pub fn step_names(&self) -> Vec<Option<String>> {
        self.steps()
            .iter()
            .map(|step| step.name().map(str::to_string))
            .collect()
    }

    /// Resolves the policy a step actually runs with.
    pub(crate) fn effective_policy(&self, step: &Step) -> (RetryPolicy, Option<Duration>) {
        let retry = step
            .policy
            .retry
            .or(self.default_retry)
            .unwrap_or_default();
        let timeout = step.policy.timeout.or(self.default_timeout);
        (retry, timeout)
    }

    fn push<N>(&self, step: Step) -> Flow<I, N> {
        let len = self.len() + 1;
        Flow {
            name: self.name.clone(),
            tail: Some(Arc::new(StepNode {
                step,
                prev: self.tail.clone(),
                len,
            })),
            default_timeout: self.default_timeout,
            default_retry: self.default_retry,
            default_token: self.default_token.clone(),
            _types: PhantomData,
        }
    }

    fn map_last(&self, operation: &str, configure: impl FnOnce(&mut StepPolicy)) -> Self {
        let Some(last) = &self.tail else {
            warn!(operation, "Flow has no steps to configure; ignoring");
            return self.clone();
        };

        let mut policy = last.step.policy.clone();
        configure(&mut policy);

        Self {
            tail: Some(Arc::new(StepNode {
                step: last.step.with_policy(policy),
                prev: last.prev.clone(),
                len: last.len,
            })),
            ..self.clone()
        }
    }
}

impl<I, O> std::fmt::Debug for Flow<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name)
            .field("steps", &self.tail.as_ref().map_or(0, |node| node.len))
            .field("default_timeout", &self.default_timeout)
            .field("default_retry", &self.default_retry)
            .field("default_token", &self.default_token)
            .finish()
    }
}
