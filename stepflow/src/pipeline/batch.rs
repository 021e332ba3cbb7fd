//! Bounded-concurrency execution of a flow over many inputs.

use super::step::FlowValue;
use super::{BatchOptions, Flow, RunOptions};
use crate::cancellation::CancellationToken;
use crate::errors::{FlowError, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, Instrument};

/// A shared cursor over `[0, end)`.
///
/// Each index is handed out to exactly one caller, however many workers
/// claim concurrently.
#[derive(Debug)]
pub struct WorkCursor {
    next: AtomicUsize,
    end: usize,
}

impl WorkCursor {
    /// Creates a cursor over `[0, end)`.
    #[must_use]
    pub fn new(end: usize) -> Self {
        Self {
            next: AtomicUsize::new(0),
            end,
        }
    }

    /// Claims the next unclaimed index, or `None` once the range is spent.
    pub fn claim(&self) -> Option<usize> {
        let index = self.next.fetch_add(1, Ordering::AcqRel);
        (index < self.end).then_some(index)
    }
}

/// State shared by the workers of one batch.
struct BatchState<I, O> {
    cursor: WorkCursor,
    inputs: Mutex<Vec<Option<I>>>,
    results: Mutex<Vec<Option<O>>>,
    failed: AtomicBool,
}

impl<I, O> BatchState<I, O> {
    fn take_input(&self, index: usize) -> Result<I> {
        self.inputs
            .lock()
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| FlowError::Internal(format!("batch index {index} claimed twice")))
    }
}

impl<I: FlowValue, O: FlowValue> Flow<I, O> {
    /// Runs the flow once per input and returns outputs aligned with `inputs`.
    ///
    /// At most `options.concurrency` runs are in flight at any time (see
    /// [`BatchOptions::worker_count`]). The first run that fails decides the
    /// outcome of the whole batch; runs already in flight are left to finish
    /// in the background and no new runs are started.
    pub async fn run_many(&self, inputs: Vec<I>, options: BatchOptions) -> Result<Vec<O>> {
        let total = inputs.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let token = options
            .token
            .clone()
            .or_else(|| self.default_token().cloned())
            .unwrap_or_default();
        let workers = options.worker_count(total);
        debug!(flow = ?self.flow_name(), total, workers, "Starting batch");

        if workers == total {
            self.run_unbounded(inputs, token).await
        } else {
            self.run_pool(inputs, token, workers).await
        }
    }

    /// Launches one run per input, all at once.
    async fn run_unbounded(&self, inputs: Vec<I>, token: CancellationToken) -> Result<Vec<O>> {
        let total = inputs.len();
        let mut running: FuturesUnordered<_> = inputs
            .into_iter()
            .enumerate()
            .map(|(index, input)| {
                let flow = self.clone();
                let options = RunOptions::new().with_token(token.clone());
                tokio::spawn(
                    async move { (index, flow.run_with(input, options).await) }.in_current_span(),
                )
            })
            .collect();

        let mut slots: Vec<Option<O>> = (0..total).map(|_| None).collect();
        while let Some(joined) = running.next().await {
            let (index, outcome) = joined.map_err(|e| FlowError::from_join_error(&e))?;
            slots[index] = Some(outcome?);
        }

        collect_slots(slots)
    }

    /// Drains the inputs with a fixed number of workers sharing one cursor.
    async fn run_pool(
        &self,
        inputs: Vec<I>,
        token: CancellationToken,
        workers: usize,
    ) -> Result<Vec<O>> {
        let total = inputs.len();
        let state = Arc::new(BatchState {
            cursor: WorkCursor::new(total),
            inputs: Mutex::new(inputs.into_iter().map(Some).collect()),
            results: Mutex::new((0..total).map(|_| None).collect()),
            failed: AtomicBool::new(false),
        });

        let mut running: FuturesUnordered<_> = (0..workers)
            .map(|worker| {
                let flow = self.clone();
                let state = Arc::clone(&state);
                let token = token.clone();
                tokio::spawn(
                    async move { flow.drain(worker, &state, &token).await }.in_current_span(),
                )
            })
            .collect();

        while let Some(joined) = running.next().await {
            joined.map_err(|e| FlowError::from_join_error(&e))??;
        }

        let slots = std::mem::take(&mut *state.results.lock());
        collect_slots(slots)
    }

    async fn drain(
        &self,
        worker: usize,
        state: &BatchState<I, O>,
        token: &CancellationToken,
    ) -> Result<()> {
        let mut processed = 0usize;

        while !state.failed.load(Ordering::Acquire) {
            let Some(index) = state.cursor.claim() else {
                break;
            };
            let input = state.take_input(index)?;
            let options = RunOptions::new().with_token(token.clone());

            match self.run_with(input, options).await {
                Ok(output) => {
                    state.results.lock()[index] = Some(output);
                    processed += 1;
                }
                Err(err) => {
                    state.failed.store(true, Ordering::Release);
                    debug!(worker, index, error = %err, "Batch entry failed");
                    return Err(err);
                }
            }
        }

        debug!(worker, processed, "Batch worker finished");
        Ok(())
    }
}

fn collect_slots<O>(slots: Vec<Option<O>>) -> Result<Vec<O>> {
    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| FlowError::Internal("batch finished with missing results".to_string()))
}
