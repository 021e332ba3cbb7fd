//! Sequential execution of a flow over one input.

use super::execute_step;
use super::step::{unwrap_value, ErasedFn, FlowValue, Step, StepBody, Value};
use super::{Flow, RetryPolicy, RunOptions};
use crate::context::ExecutionContext;
use crate::errors::{FlowError, Result};
use crate::observability::{FlowSpanAttributes, SpanTimer};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, Instrument};

impl<I: FlowValue, O: FlowValue> Flow<I, O> {
    /// Runs the flow over one input with the flow's default token.
    pub async fn run(&self, input: I) -> Result<O> {
        self.run_with(input, RunOptions::new()).await
    }

    /// Runs the flow over one input.
    ///
    /// Steps run strictly in order. The token is polled before each step and
    /// before each retry attempt; a step that has started is never
    /// interrupted by cancellation.
    pub async fn run_with(&self, input: I, options: RunOptions) -> Result<O> {
        let token = options
            .token
            .or_else(|| self.default_token().cloned())
            .unwrap_or_default();
        let mut ctx = ExecutionContext::new(token);
        let steps = self.steps();
        let span = FlowSpanAttributes::new(ctx.run_id(), steps.len())
            .with_flow_name(self.flow_name())
            .span();

        async move {
            let timer = SpanTimer::start();
            let outcome = self
                .run_steps(&steps, Arc::new(input) as Value, &mut ctx)
                .await
                .and_then(unwrap_value::<O>);
            match &outcome {
                Ok(_) => debug!(duration_ms = timer.elapsed_ms(), "Flow run completed"),
                Err(err) => {
                    debug!(duration_ms = timer.elapsed_ms(), error = %err, "Flow run failed");
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_steps(
        &self,
        steps: &[Step],
        input: Value,
        ctx: &mut ExecutionContext,
    ) -> Result<Value> {
        let mut current = input;

        for (index, step) in steps.iter().enumerate() {
            ctx.token().check()?;
            ctx.enter_step(index, step.policy.name.clone());
            trace!(step_index = index, step = ?step.name(), "Entering step");

            current = match &step.body {
                StepBody::Single(func) => self.run_single(step, func, current, ctx).await?,
                StepBody::Group { members, collect } => {
                    let results = self.run_group(step, members, current, ctx).await?;
                    collect(results)?
                }
            };
        }

        Ok(current)
    }

    async fn run_single(
        &self,
        step: &Step,
        func: &ErasedFn,
        input: Value,
        ctx: &mut ExecutionContext,
    ) -> Result<Value> {
        let (retry, timeout) = self.effective_policy(step);
        execute_step(
            |attempt_ctx| func(Arc::clone(&input), attempt_ctx),
            ctx,
            retry,
            timeout,
            step.name(),
        )
        .await
    }

    /// Runs every member on the same input concurrently.
    ///
    /// Fails as soon as one member fails. Members still running at that
    /// point are detached: they finish in the background and their results
    /// are dropped.
    async fn run_group(
        &self,
        step: &Step,
        members: &[ErasedFn],
        input: Value,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Value>> {
        let (retry, timeout) = self.effective_policy(step);

        let mut running: FuturesUnordered<_> = members
            .iter()
            .enumerate()
            .map(|(position, func)| {
                let func = Arc::clone(func);
                let input = Arc::clone(&input);
                let mut member_ctx = ctx.clone();
                let name = step.policy.name.clone();
                tokio::spawn(
                    async move {
                        let outcome = run_member(
                            &func,
                            &input,
                            &mut member_ctx,
                            retry,
                            timeout,
                            name.as_deref(),
                        )
                        .await;
                        (position, outcome)
                    }
                    .in_current_span(),
                )
            })
            .collect();

        let mut slots: Vec<Option<Value>> = vec![None; members.len()];
        while let Some(joined) = running.next().await {
            let (position, outcome) = joined.map_err(|e| FlowError::from_join_error(&e))?;
            slots[position] = Some(outcome?);
        }

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| FlowError::Internal("group member produced no result".to_string()))
    }
}

async fn run_member(
    func: &ErasedFn,
    input: &Value,
    ctx: &mut ExecutionContext,
    retry: RetryPolicy,
    timeout: Option<Duration>,
    name: Option<&str>,
) -> Result<Value> {
    execute_step(
        |attempt_ctx| func(Arc::clone(input), attempt_ctx),
        ctx,
        retry,
        timeout,
        name,
    )
    .await
}
