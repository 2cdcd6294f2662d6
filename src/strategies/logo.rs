//! The phase-two logo, read from the goal map.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::PlanGenerator;
use crate::errors::{MegaverseError, MegaverseResult};
use crate::services::MapService;
use crate::types::{ExecutionPlan, GoalCell, GoalMap};

/// Reproduces whatever the goal map asks for.
pub struct LogoPattern {
    map: Arc<MapService>,
    cancel: CancellationToken,
    grid: Mutex<Option<(usize, usize)>>,
}

impl LogoPattern {
    /// Creates a generator reading the goal through `map`.
    pub fn new(map: Arc<MapService>) -> Self {
        Self {
            map,
            cancel: CancellationToken::new(),
            grid: Mutex::new(None),
        }
    }

    /// Aborts the goal-map fetch when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Turns a goal map into a plan, row by row.
    pub fn plan_from_goal(goal: &GoalMap) -> MegaverseResult<ExecutionPlan> {
        if goal.is_empty() {
            return Err(MegaverseError::plan("goal map is empty"));
        }

        let mut operations = Vec::new();
        for (row, cells) in goal.goal.iter().enumerate() {
            for (column, label) in cells.iter().enumerate() {
                let cell = GoalCell::parse(label);
                if let GoalCell::Unknown(label) = &cell {
                    tracing::warn!(row, column, label = %label, "Skipping unknown goal cell");
                    continue;
                }
                if let Some(operation) = cell.to_operation(row as i64, column as i64) {
                    operations.push(operation);
                }
            }
        }

        Ok(ExecutionPlan::parallel(operations))
    }
}

impl std::fmt::Debug for LogoPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogoPattern")
            .field("grid", &*self.grid.lock())
            .finish()
    }
}

#[async_trait]
impl PlanGenerator for LogoPattern {
    fn name(&self) -> &str {
        "logo"
    }

    async fn generate_plan(&self) -> MegaverseResult<ExecutionPlan> {
        let goal = self.map.goal(&self.cancel).await.map_err(|err| {
            if err.is_cancellation() {
                err
            } else {
                MegaverseError::plan(format!("failed to fetch goal map: {}", err))
            }
        })?;

        *self.grid.lock() = Some((goal.columns(), goal.rows()));
        let plan = Self::plan_from_goal(&goal)?;
        tracing::info!(
            rows = goal.rows(),
            columns = goal.columns(),
            operations = plan.len(),
            "Generated logo plan"
        );
        Ok(plan)
    }

    /// Known once a plan has been generated.
    fn grid_size(&self) -> Option<(usize, usize)> {
        *self.grid.lock()
    }
}
