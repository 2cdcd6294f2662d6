//! Megaverse API client.
//!
//! [`MegaverseClient`] wires the transport, the shared rate limiter, the
//! services and the orchestrator together.

mod executor;

pub use executor::RequestExecutor;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::{MegaverseConfig, MegaverseConfigBuilder};
use crate::errors::{MegaverseError, MegaverseResult};
use crate::observability::{DefaultMetricsCollector, MetricsCollector};
use crate::orchestrator::Orchestrator;
use crate::resilience::{RateLimiter, ResiliencePipeline, RetryConfig};
use crate::services::{MapService, ObjectService};
use crate::strategies::{CrossPattern, LogoPattern, PlanGenerator};
use crate::transport::{HttpTransport, HttpTransportImpl};
use crate::types::{AggregateResult, ExecutionPlan, Position, ValidationReport};

/// Outcome of a bulk clear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Cells visited.
    pub cells_checked: usize,
    /// Objects removed.
    pub removed: usize,
    /// True if cancellation stopped the sweep early.
    pub cancelled: bool,
}

/// The main megaverse client.
///
/// # Example
///
/// ```rust,no_run
/// use megaverse_client::{CrossPattern, MegaverseClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = MegaverseClient::builder()
///         .candidate_id("your-candidate-id")
///         .build()?;
///
///     let result = client.execute(&CrossPattern::new()).await?;
///     println!("placed {} objects", result.succeeded());
///     Ok(())
/// }
/// ```
pub struct MegaverseClient {
    config: MegaverseConfig,
    rate_limiter: Arc<RateLimiter>,
    objects: Arc<ObjectService>,
    map: Arc<MapService>,
    orchestrator: Orchestrator,
    metrics: Arc<dyn MetricsCollector>,
}

impl MegaverseClient {
    /// Creates a new client builder.
    pub fn builder() -> MegaverseClientBuilder {
        MegaverseClientBuilder::new()
    }

    /// Creates a client from `CROSSMINT_*` environment variables.
    pub fn from_env() -> MegaverseResult<Self> {
        MegaverseClientBuilder::new()
            .config(MegaverseConfig::from_env()?)
            .build()
    }

    /// The object service.
    pub fn objects(&self) -> &Arc<ObjectService> {
        &self.objects
    }

    /// The map service.
    pub fn map(&self) -> &Arc<MapService> {
        &self.map
    }

    /// The configuration.
    pub fn config(&self) -> &MegaverseConfig {
        &self.config
    }

    /// The metrics collector.
    pub fn metrics(&self) -> &Arc<dyn MetricsCollector> {
        &self.metrics
    }

    /// The rate limiter shared by every call this client makes.
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Generator for the phase-one cross.
    pub fn cross_pattern(&self) -> CrossPattern {
        CrossPattern::new()
    }

    /// Generator for the phase-two logo.
    pub fn logo_pattern(&self) -> LogoPattern {
        LogoPattern::new(Arc::clone(&self.map))
    }

    /// Changes the admission rate for all subsequent calls.
    pub fn configure_rate(&self, requests_per_second: f64) -> MegaverseResult<()> {
        self.rate_limiter.set_rate(requests_per_second)
    }

    /// Runs `plan` under the configured execution timeout.
    pub async fn run(&self, plan: &ExecutionPlan) -> AggregateResult {
        let cancel = CancellationToken::new();
        let deadline = spawn_deadline(cancel.clone(), self.config.execution_timeout);
        let result = self.run_with_cancel(plan, &cancel).await;
        deadline.abort();
        result
    }

    /// Runs `plan` until it completes or `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        plan: &ExecutionPlan,
        cancel: &CancellationToken,
    ) -> AggregateResult {
        self.orchestrator.run(plan, cancel).await
    }

    /// Generates a plan with `generator` and runs it.
    ///
    /// Returns an error if the plan could not be built, the run was
    /// cancelled, or any operation failed.
    pub async fn execute(&self, generator: &dyn PlanGenerator) -> MegaverseResult<AggregateResult> {
        let cancel = CancellationToken::new();
        let deadline = spawn_deadline(cancel.clone(), self.config.execution_timeout);
        let result = self.execute_with_cancel(generator, &cancel).await;
        deadline.abort();
        result
    }

    /// Like [`execute`](Self::execute), stopping when `cancel` fires.
    #[instrument(skip_all, fields(generator = generator.name()))]
    pub async fn execute_with_cancel(
        &self,
        generator: &dyn PlanGenerator,
        cancel: &CancellationToken,
    ) -> MegaverseResult<AggregateResult> {
        let plan = self.plan(generator).await?;
        self.run_with_cancel(&plan, cancel).await.into_result()
    }

    /// Builds a plan with `generator`. A plan without its own batch size
    /// takes the configured one.
    pub async fn plan(&self, generator: &dyn PlanGenerator) -> MegaverseResult<ExecutionPlan> {
        let plan = generator.generate_plan().await.map_err(|err| match err {
            MegaverseError::Plan { .. } => err,
            err if err.is_cancellation() => err,
            err => MegaverseError::plan(err.to_string()),
        })?;
        let plan = plan.or_batch_size(self.config.batch_size);

        tracing::info!(
            generator = generator.name(),
            operations = plan.len(),
            batch_size = plan.batch_size(),
            "Generated plan"
        );
        Ok(plan)
    }

    /// Removes every object from a `width` x `height` grid.
    ///
    /// Each cell gets a delete of each kind in turn until one is accepted.
    /// Every delete goes through the shared rate limiter and retry policy.
    #[instrument(skip(self, cancel))]
    pub async fn clear(
        &self,
        width: usize,
        height: usize,
        cancel: &CancellationToken,
    ) -> MegaverseResult<ClearReport> {
        let mut report = ClearReport::default();

        'rows: for row in 0..height {
            for column in 0..width {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'rows;
                }
                report.cells_checked += 1;

                let position = Position::new(row as i64, column as i64);
                match self.objects.delete_any(position, cancel).await {
                    Ok(Some(kind)) => {
                        report.removed += 1;
                        tracing::debug!(position = %position, kind = %kind, "Removed object");
                    }
                    Ok(None) => {}
                    Err(err) if err.is_cancellation() => {
                        report.cancelled = true;
                        break 'rows;
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        tracing::info!(
            cells_checked = report.cells_checked,
            removed = report.removed,
            "Clear complete"
        );
        Ok(report)
    }

    /// Compares `plan` against the current map.
    #[instrument(skip_all, fields(operations = plan.len()))]
    pub async fn validate(
        &self,
        plan: &ExecutionPlan,
        cancel: &CancellationToken,
    ) -> MegaverseResult<ValidationReport> {
        let megaverse = self.map.current(cancel).await?;
        let report = megaverse.validate_plan(plan);
        if report.is_valid() {
            tracing::info!(checked = report.checked, "Megaverse matches the plan");
        } else {
            tracing::warn!(
                checked = report.checked,
                mismatches = report.mismatches.len(),
                "Megaverse does not match the plan"
            );
        }
        Ok(report)
    }
}

impl std::fmt::Debug for MegaverseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MegaverseClient")
            .field("config", &self.config)
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}

/// Cancels `cancel` once `timeout` elapses.
fn spawn_deadline(cancel: CancellationToken, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(?timeout, "Execution deadline reached");
                cancel.cancel();
            }
        }
    })
}

/// Builder for [`MegaverseClient`].
pub struct MegaverseClientBuilder {
    config_builder: MegaverseConfigBuilder,
    config: Option<MegaverseConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    metrics: Option<Arc<dyn MetricsCollector>>,
}

impl MegaverseClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self {
            config_builder: MegaverseConfigBuilder::new(),
            config: None,
            transport: None,
            metrics: None,
        }
    }

    /// Uses a complete configuration; individual setters are then ignored.
    pub fn config(mut self, config: MegaverseConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the candidate id.
    pub fn candidate_id(mut self, candidate_id: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.candidate_id(candidate_id);
        self
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(base_url);
        self
    }

    /// Sets the admission rate.
    pub fn requests_per_second(mut self, rps: f64) -> Self {
        self.config_builder = self.config_builder.requests_per_second(rps);
        self
    }

    /// Sets the retry configuration.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config_builder = self.config_builder.retry(retry);
        self
    }

    /// Sets the batch size used by batched plans that do not pick their own.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config_builder = self.config_builder.batch_size(size);
        self
    }

    /// Sets the number of parallel workers.
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.config_builder = self.config_builder.max_workers(workers);
        self
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets a custom metrics collector.
    pub fn metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the client.
    pub fn build(self) -> MegaverseResult<MegaverseClient> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_builder.build()?,
        };

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransportImpl::new(&config.base_url, config.timeout)?),
        };
        let metrics: Arc<dyn MetricsCollector> = self
            .metrics
            .unwrap_or_else(|| Arc::new(DefaultMetricsCollector::new()));

        config.retry.validate()?;
        let rate_limiter = Arc::new(RateLimiter::new(config.requests_per_second)?);
        let pipeline =
            ResiliencePipeline::with_rate_limiter(config.retry.clone(), Arc::clone(&rate_limiter));
        let executor = Arc::new(RequestExecutor::new(
            transport,
            pipeline,
            Arc::clone(&metrics),
        ));

        let objects = Arc::new(ObjectService::new(
            Arc::clone(&executor),
            config.candidate_id.clone(),
        ));
        let map = Arc::new(MapService::new(executor, config.candidate_id.clone()));
        let orchestrator = Orchestrator::with_concurrency(objects.clone(), config.max_workers);

        tracing::debug!(
            candidate = %config.candidate_id_hint(),
            base_url = %config.base_url,
            "Megaverse client ready"
        );

        Ok(MegaverseClient {
            config,
            rate_limiter,
            objects,
            map,
            orchestrator,
            metrics,
        })
    }
}

impl Default for MegaverseClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
