//! Object placement service.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::client::RequestExecutor;
use crate::errors::MegaverseResult;
use crate::orchestrator::OperationDispatcher;
use crate::transport::HttpRequest;
use crate::types::{ComethDirection, CreateOperation, ObjectKind, Position, SoloonColor};

/// Body of every create and delete call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ObjectRequest<'a> {
    row: i64,
    column: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<SoloonColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    direction: Option<ComethDirection>,
    candidate_id: &'a str,
}

/// Creates and deletes Polyanets, Soloons and Comeths.
pub struct ObjectService {
    executor: Arc<RequestExecutor>,
    candidate_id: SecretString,
}

impl ObjectService {
    /// Creates a new object service.
    pub fn new(executor: Arc<RequestExecutor>, candidate_id: SecretString) -> Self {
        Self {
            executor,
            candidate_id,
        }
    }

    fn body(&self, position: Position) -> ObjectRequest<'_> {
        ObjectRequest {
            row: position.row,
            column: position.column,
            color: None,
            direction: None,
            candidate_id: self.candidate_id.expose_secret(),
        }
    }

    fn create_request(&self, operation: &CreateOperation) -> MegaverseResult<HttpRequest> {
        let (kind, body) = match *operation {
            CreateOperation::Polyanet { position } => (ObjectKind::Polyanet, self.body(position)),
            CreateOperation::Soloon { position, color } => (
                ObjectKind::Soloon,
                ObjectRequest {
                    color: Some(color),
                    ..self.body(position)
                },
            ),
            CreateOperation::Cometh {
                position,
                direction,
            } => (
                ObjectKind::Cometh,
                ObjectRequest {
                    direction: Some(direction),
                    ..self.body(position)
                },
            ),
        };
        HttpRequest::post(kind.endpoint())
            .with_json(&body)
            .map_err(Into::into)
    }

    /// Places one object.
    #[instrument(skip_all, fields(operation = %operation))]
    pub async fn create(
        &self,
        operation: &CreateOperation,
        cancel: &CancellationToken,
    ) -> MegaverseResult<()> {
        operation.validate()?;
        let request = self.create_request(operation)?;
        self.executor.execute(request, cancel).await?;
        self.executor.metrics().record_created(operation.kind());
        tracing::debug!("Created {}", operation);
        Ok(())
    }

    /// Removes the object of `kind` at `position`.
    #[instrument(skip_all, fields(kind = %kind, position = %position))]
    pub async fn delete(
        &self,
        kind: ObjectKind,
        position: Position,
        cancel: &CancellationToken,
    ) -> MegaverseResult<()> {
        let request = HttpRequest::delete(kind.endpoint()).with_json(&self.body(position))?;
        self.executor.execute(request, cancel).await?;
        self.executor.metrics().record_deleted(kind);
        Ok(())
    }

    /// Tries to remove whatever occupies `position`, one kind at a time.
    ///
    /// Returns the kind that was removed, or `None` if every delete was
    /// rejected. Only cancellation is reported as an error.
    pub async fn delete_any(
        &self,
        position: Position,
        cancel: &CancellationToken,
    ) -> MegaverseResult<Option<ObjectKind>> {
        for kind in ObjectKind::ALL {
            match self.delete(kind, position, cancel).await {
                Ok(()) => return Ok(Some(kind)),
                Err(err) if err.is_cancellation() => return Err(err),
                Err(err) => {
                    tracing::debug!(kind = %kind, position = %position, error = %err, "Delete rejected");
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl OperationDispatcher for ObjectService {
    async fn dispatch(
        &self,
        operation: &CreateOperation,
        cancel: &CancellationToken,
    ) -> MegaverseResult<()> {
        self.create(operation, cancel).await
    }
}

impl std::fmt::Debug for ObjectService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectService")
            .field("candidate_id", &"[REDACTED]")
            .finish()
    }
}
