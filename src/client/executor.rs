//! Request executor with resilience and error classification.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::{ApiErrorResponse, MegaverseError, MegaverseResult};
use crate::observability::MetricsCollector;
use crate::resilience::ResiliencePipeline;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use crate::types::CallOutcome;

/// Sends requests through the transport under the resilience pipeline.
///
/// This is the single place where raw transport results become
/// [`CallOutcome`]s:
/// - transport failures, 5xx and 429 are retryable
/// - any other non-2xx status is permanent
/// - 2xx is success
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    pipeline: ResiliencePipeline,
    metrics: Arc<dyn MetricsCollector>,
}

impl RequestExecutor {
    /// Creates a new request executor.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        pipeline: ResiliencePipeline,
        metrics: Arc<dyn MetricsCollector>,
    ) -> Self {
        Self {
            transport,
            pipeline,
            metrics,
        }
    }

    /// Classifies one attempt's raw result.
    pub fn classify(
        endpoint: &str,
        result: Result<HttpResponse, TransportError>,
    ) -> CallOutcome<HttpResponse> {
        let result = match result {
            Ok(response) if response.is_success() => Ok(response),
            Ok(response) => Err(MegaverseError::from_status(
                response.status,
                ApiErrorResponse::message_from_body(&response.body),
                endpoint,
            )),
            Err(err) => Err(MegaverseError::from(err)),
        };
        CallOutcome::classify(result)
    }

    /// Sends `request`, retrying transient failures.
    pub async fn execute(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> MegaverseResult<HttpResponse> {
        let endpoint = request.path.clone();
        let start = Instant::now();
        let mut attempts = 0u32;

        let result = self
            .pipeline
            .execute(cancel, || {
                attempts += 1;
                if attempts > 1 {
                    self.metrics.record_retry(&endpoint);
                }
                let transport = Arc::clone(&self.transport);
                let request = request.clone();
                let endpoint = endpoint.clone();
                async move { Self::classify(&endpoint, transport.send(request).await) }
            })
            .await;

        self.metrics
            .record_request(&endpoint, result.is_ok(), start.elapsed());
        if let Err(err) = &result {
            self.metrics.record_error(err.kind());
            tracing::debug!(endpoint = %endpoint, attempts, error = %err, "Request failed");
        }

        result
    }

    /// Sends `request` and decodes the JSON body of the response.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> MegaverseResult<T> {
        let response = self.execute(request, cancel).await?;
        Ok(response.json()?)
    }

    /// The resilience pipeline.
    pub fn pipeline(&self) -> &ResiliencePipeline {
        &self.pipeline
    }

    /// The metrics collector.
    pub fn metrics(&self) -> &Arc<dyn MetricsCollector> {
        &self.metrics
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
