//! Goal-map and current-map retrieval.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::client::RequestExecutor;
use crate::errors::{MegaverseError, MegaverseResult};
use crate::transport::HttpRequest;
use crate::types::{CreateOperation, GoalMap, Megaverse, ObjectKind};

#[derive(Debug, Deserialize)]
struct CurrentMapResponse {
    map: CurrentMap,
}

#[derive(Debug, Deserialize)]
struct CurrentMap {
    #[serde(default)]
    content: Vec<Vec<Option<MapCell>>>,
}

#[derive(Debug, Deserialize)]
struct MapCell {
    #[serde(rename = "type")]
    kind: Option<u8>,
    color: Option<String>,
    direction: Option<String>,
}

impl MapCell {
    fn to_object(&self, row: i64, column: i64) -> MegaverseResult<Option<CreateOperation>> {
        let Some(kind) = self.kind.and_then(ObjectKind::from_code) else {
            return Ok(None);
        };
        let object = match kind {
            ObjectKind::Polyanet => CreateOperation::polyanet(row, column),
            ObjectKind::Soloon => {
                let color = self.color.as_deref().unwrap_or_default().parse()?;
                CreateOperation::soloon(row, column, color)
            }
            ObjectKind::Cometh => {
                let direction = self.direction.as_deref().unwrap_or_default().parse()?;
                CreateOperation::cometh(row, column, direction)
            }
        };
        Ok(Some(object))
    }
}

/// Reads the goal and the current state of the megaverse.
pub struct MapService {
    executor: Arc<RequestExecutor>,
    candidate_id: SecretString,
}

impl MapService {
    /// Creates a new map service.
    pub fn new(executor: Arc<RequestExecutor>, candidate_id: SecretString) -> Self {
        Self {
            executor,
            candidate_id,
        }
    }

    fn goal_path(&self) -> String {
        format!("/map/{}/goal", self.candidate_id.expose_secret())
    }

    fn current_path(&self) -> String {
        format!("/map/{}", self.candidate_id.expose_secret())
    }

    /// Fetches the goal map.
    #[instrument(skip_all)]
    pub async fn goal(&self, cancel: &CancellationToken) -> MegaverseResult<GoalMap> {
        let goal: GoalMap = self
            .executor
            .execute_json(HttpRequest::get(self.goal_path()), cancel)
            .await?;
        tracing::debug!(rows = goal.rows(), columns = goal.columns(), "Fetched goal map");
        Ok(goal)
    }

    /// Fetches the current grid.
    ///
    /// A 404 means the deployment does not expose the current map; it is
    /// reported as an API error saying so.
    #[instrument(skip_all)]
    pub async fn current(&self, cancel: &CancellationToken) -> MegaverseResult<Megaverse> {
        let response: CurrentMapResponse = match self
            .executor
            .execute_json(HttpRequest::get(self.current_path()), cancel)
            .await
        {
            Ok(response) => response,
            Err(err) if err.status_code() == Some(404) => {
                return Err(MegaverseError::Api {
                    status_code: 404,
                    message: "current map endpoint not available".to_string(),
                    endpoint: "/map/{candidateId}".to_string(),
                });
            }
            Err(err) => return Err(err),
        };

        let content = response.map.content;
        let height = content.len();
        let width = content.iter().map(Vec::len).max().unwrap_or(0);
        let mut megaverse = Megaverse::new(width, height);

        for (row, cells) in content.iter().enumerate() {
            for (column, cell) in cells.iter().enumerate() {
                let Some(cell) = cell else { continue };
                match cell.to_object(row as i64, column as i64) {
                    Ok(Some(object)) => megaverse.place(object)?,
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(row, column, error = %err, "Skipping unreadable map cell");
                    }
                }
            }
        }

        Ok(megaverse)
    }
}

impl std::fmt::Debug for MapService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapService")
            .field("candidate_id", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{fixtures, MockResponse, MockTransport};
    use crate::observability::NoopMetricsCollector;
    use crate::resilience::{ResilienceConfig, ResiliencePipeline, RetryConfig};
    use crate::types::{ComethDirection, Position, SoloonColor};
    use std::time::Duration;

    fn service(transport: Arc<MockTransport>) -> MapService {
        let pipeline = ResiliencePipeline::new(ResilienceConfig {
            retry: RetryConfig::new()
                .max_attempts(2)
                .initial_delay(Duration::from_millis(1))
                .max_delay(Duration::from_millis(1)),
            requests_per_second: 1000.0,
        })
        .unwrap();
        let executor = RequestExecutor::new(transport, pipeline, Arc::new(NoopMetricsCollector));
        MapService::new(Arc::new(executor), SecretString::new("cand-9".to_string()))
    }

    #[tokio::test]
    async fn test_goal() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&fixtures::small_goal_map());
        let service = service(Arc::clone(&transport));

        let goal = service.goal(&CancellationToken::new()).await.unwrap();

        assert_eq!(goal.rows(), 3);
        assert_eq!(goal.goal[1][1], "BLUE_SOLOON");
        assert_eq!(transport.last_request().unwrap().path, "/map/cand-9/goal");
    }

    #[tokio::test]
    async fn test_current_decodes_cells() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&fixtures::current_map(
            4,
            3,
            &[
                (0, 0, fixtures::polyanet_cell()),
                (1, 2, fixtures::soloon_cell("white")),
                (2, 3, fixtures::cometh_cell("down")),
                (2, 0, fixtures::soloon_cell("green")),
            ],
        ));
        let service = service(Arc::clone(&transport));

        let megaverse = service.current(&CancellationToken::new()).await.unwrap();

        assert_eq!(megaverse.width(), 4);
        assert_eq!(megaverse.height(), 3);
        assert_eq!(megaverse.object_count(), 3);
        assert_eq!(
            megaverse.get(Position::new(1, 2)).unwrap(),
            Some(&CreateOperation::soloon(1, 2, SoloonColor::White))
        );
        assert_eq!(
            megaverse.get(Position::new(2, 3)).unwrap(),
            Some(&CreateOperation::cometh(2, 3, ComethDirection::Down))
        );
        assert_eq!(megaverse.get(Position::new(2, 0)).unwrap(), None);
        assert_eq!(transport.last_request().unwrap().path, "/map/cand-9");
    }

    #[tokio::test]
    async fn test_current_not_available() {
        let transport = Arc::new(MockTransport::new());
        transport.set_default(MockResponse::error(404, "Not Found"));
        let service = service(Arc::clone(&transport));

        let err = service.current(&CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.status_code(), Some(404));
        assert!(err.to_string().contains("not available"));
        assert_eq!(transport.request_count(), 1);
    }
}
