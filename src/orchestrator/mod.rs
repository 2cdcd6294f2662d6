//! Plan execution.
//!
//! The orchestrator drives every operation of an [`ExecutionPlan`] through
//! an [`OperationDispatcher`] in the plan's mode and folds the per-operation
//! results into one [`AggregateResult`]. A failing operation never aborts its
//! siblings; only cancellation stops dispatch early.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::errors::{MegaverseError, MegaverseResult};
use crate::types::{
    AggregateResult, CreateOperation, ExecutionMode, ExecutionPlan, DEFAULT_CONCURRENCY,
};

/// Performs one create operation end to end, retries included.
#[async_trait]
pub trait OperationDispatcher: Send + Sync {
    /// Places the object described by `operation`.
    async fn dispatch(
        &self,
        operation: &CreateOperation,
        cancel: &CancellationToken,
    ) -> MegaverseResult<()>;
}

/// Validates an operation and, if it is well formed, dispatches it on its own
/// task so that a panicking dispatcher fails only this operation.
async fn process(
    dispatcher: &Arc<dyn OperationDispatcher>,
    operation: CreateOperation,
    cancel: &CancellationToken,
) -> MegaverseResult<()> {
    operation.validate()?;

    let dispatcher = Arc::clone(dispatcher);
    let cancel = cancel.clone();
    match tokio::spawn(async move { dispatcher.dispatch(&operation, &cancel).await }).await {
        Ok(outcome) => outcome,
        Err(err) if err.is_panic() => Err(MegaverseError::internal(format!(
            "dispatch of {} panicked",
            operation
        ))),
        Err(_) => Err(MegaverseError::internal(format!(
            "dispatch of {} was aborted",
            operation
        ))),
    }
}

/// Runs execution plans.
#[derive(Clone)]
pub struct Orchestrator {
    dispatcher: Arc<dyn OperationDispatcher>,
    concurrency: usize,
}

impl Orchestrator {
    /// Creates an orchestrator using [`DEFAULT_CONCURRENCY`] parallel workers.
    pub fn new(dispatcher: Arc<dyn OperationDispatcher>) -> Self {
        Self::with_concurrency(dispatcher, DEFAULT_CONCURRENCY)
    }

    /// Creates an orchestrator with `concurrency` parallel workers (at least one).
    pub fn with_concurrency(dispatcher: Arc<dyn OperationDispatcher>, concurrency: usize) -> Self {
        Self {
            dispatcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Worker count for bounded-parallel plans.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs every operation of `plan` and summarizes the outcome.
    #[instrument(skip_all, fields(mode = ?plan.mode(), operations = plan.len()))]
    pub async fn run(&self, plan: &ExecutionPlan, cancel: &CancellationToken) -> AggregateResult {
        tracing::info!("Executing plan with {} operations", plan.len());

        let mut result = match plan.mode() {
            ExecutionMode::Sequential => self.run_sequential(plan.operations(), cancel).await,
            ExecutionMode::BoundedParallel => self.run_parallel(plan.operations(), cancel).await,
            ExecutionMode::Batched => {
                self.run_batched(plan.operations(), plan.batch_size(), cancel)
                    .await
            }
        };

        result.sort_failures();
        result.cancelled = cancel.is_cancelled()
            && (result.skipped > 0 || result.failures.iter().any(|f| f.error.is_cancellation()));

        if result.cancelled {
            tracing::warn!(
                attempted = result.attempted,
                skipped = result.skipped,
                "Execution cancelled"
            );
        } else if result.failures.is_empty() {
            tracing::info!(attempted = result.attempted, "All operations succeeded");
        } else {
            tracing::warn!(
                attempted = result.attempted,
                failed = result.failed(),
                "Execution finished with failures"
            );
        }

        result
    }

    async fn run_sequential(
        &self,
        operations: &[CreateOperation],
        cancel: &CancellationToken,
    ) -> AggregateResult {
        let mut result = AggregateResult::default();
        self.run_in_order(operations, 0, operations.len(), cancel, &mut result)
            .await;
        result
    }

    async fn run_batched(
        &self,
        operations: &[CreateOperation],
        batch_size: usize,
        cancel: &CancellationToken,
    ) -> AggregateResult {
        let total = operations.len();
        let mut result = AggregateResult::default();

        for (batch_index, batch) in operations.chunks(batch_size.max(1)).enumerate() {
            let offset = batch_index * batch_size.max(1);
            tracing::info!(
                "Processing batch {}-{} of {}",
                offset + 1,
                offset + batch.len(),
                total
            );
            if !self
                .run_in_order(batch, offset, total, cancel, &mut result)
                .await
            {
                break;
            }
        }

        result
    }

    /// Processes `operations` one at a time. Returns false if cancellation
    /// stopped dispatch before the slice was exhausted.
    async fn run_in_order(
        &self,
        operations: &[CreateOperation],
        offset: usize,
        total: usize,
        cancel: &CancellationToken,
        result: &mut AggregateResult,
    ) -> bool {
        for (i, operation) in operations.iter().enumerate() {
            let index = offset + i;
            if cancel.is_cancelled() {
                result.skipped = total - index;
                return false;
            }

            result.attempted += 1;
            tracing::info!("[{}/{}] Creating {}", index + 1, total, operation);

            if let Err(err) = process(&self.dispatcher, *operation, cancel).await {
                tracing::warn!(position = %operation.position(), error = %err, "Failed to create object");
                result.record_failure(index, *operation, err);
            }
        }
        true
    }

    async fn run_parallel(
        &self,
        operations: &[CreateOperation],
        cancel: &CancellationToken,
    ) -> AggregateResult {
        let queue: Arc<Mutex<VecDeque<(usize, CreateOperation)>>> = Arc::new(Mutex::new(
            operations.iter().copied().enumerate().collect(),
        ));
        let shared = Arc::new(Mutex::new(AggregateResult::default()));
        let workers = self.concurrency.min(operations.len().max(1));
        let mut tasks = JoinSet::new();

        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let shared = Arc::clone(&shared);
            let dispatcher = Arc::clone(&self.dispatcher);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let Some((index, operation)) = queue.lock().pop_front() else {
                        break;
                    };

                    shared.lock().attempted += 1;
                    tracing::info!(worker, "Creating {}", operation);

                    if let Err(err) = process(&dispatcher, operation, &cancel).await {
                        tracing::warn!(worker, position = %operation.position(), error = %err, "Failed to create object");
                        shared.lock().record_failure(index, operation, err);
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                tracing::error!(error = %err, "Worker terminated abnormally");
            }
        }

        let mut result = std::mem::take(&mut *shared.lock());
        result.skipped = queue.lock().len();
        result
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("concurrency", &self.concurrency)
            .finish()
    }
}
