//! The phase-one X shape.

use async_trait::async_trait;

use super::PlanGenerator;
use crate::errors::{MegaverseError, MegaverseResult};
use crate::types::{CreateOperation, ExecutionPlan};

/// Polyanets along both diagonals of a square grid, between `start` and
/// `end` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossPattern {
    size: usize,
    start: usize,
    end: usize,
}

impl CrossPattern {
    /// The 11×11 phase-one cross spanning rows 2 to 8.
    pub fn new() -> Self {
        Self {
            size: 11,
            start: 2,
            end: 8,
        }
    }

    /// A cross with a custom grid size and span.
    pub fn with_bounds(size: usize, start: usize, end: usize) -> Self {
        Self { size, start, end }
    }

    fn check(&self) -> MegaverseResult<()> {
        if self.start > self.end {
            return Err(MegaverseError::plan(format!(
                "cross start {} is after end {}",
                self.start, self.end
            )));
        }
        if self.end >= self.size {
            return Err(MegaverseError::plan(format!(
                "cross end {} is outside a grid of size {}",
                self.end, self.size
            )));
        }
        Ok(())
    }

    /// Operations in row order, left diagonal cell first.
    fn operations(&self) -> Vec<CreateOperation> {
        let mut operations = Vec::with_capacity((self.end - self.start + 1) * 2);
        for i in self.start..=self.end {
            let row = i as i64;
            let mirrored = (self.size - 1 - i) as i64;
            operations.push(CreateOperation::polyanet(row, row));
            if mirrored != row {
                operations.push(CreateOperation::polyanet(row, mirrored));
            }
        }
        operations
    }
}

impl Default for CrossPattern {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanGenerator for CrossPattern {
    fn name(&self) -> &str {
        "cross"
    }

    async fn generate_plan(&self) -> MegaverseResult<ExecutionPlan> {
        self.check()?;
        let operations = self.operations();
        tracing::debug!(operations = operations.len(), "Generated cross plan");
        Ok(ExecutionPlan::parallel(operations))
    }

    fn grid_size(&self) -> Option<(usize, usize)> {
        Some((self.size, self.size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExecutionMode, Position};
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_default_cross_has_thirteen_polyanets() {
        let plan = CrossPattern::new().generate_plan().await.unwrap();

        assert_eq!(plan.len(), 13);
        assert_eq!(plan.mode(), ExecutionMode::BoundedParallel);

        let positions: HashSet<Position> =
            plan.operations().iter().map(|op| op.position()).collect();
        assert_eq!(positions.len(), 13);
        assert!(positions.contains(&Position::new(5, 5)));
        assert!(positions.contains(&Position::new(2, 2)));
        assert!(positions.contains(&Position::new(2, 8)));
        assert!(positions.contains(&Position::new(8, 2)));
        assert!(positions.contains(&Position::new(8, 8)));
        assert!(!positions.contains(&Position::new(1, 1)));
        assert!(plan
            .operations()
            .iter()
            .all(|op| matches!(op, CreateOperation::Polyanet { .. })));
    }

    #[tokio::test]
    async fn test_even_grid_has_no_shared_center() {
        let plan = CrossPattern::with_bounds(4, 0, 3)
            .generate_plan()
            .await
            .unwrap();
        assert_eq!(plan.len(), 8);
    }

    #[tokio::test]
    async fn test_invalid_bounds_are_plan_errors() {
        let err = CrossPattern::with_bounds(11, 8, 2)
            .generate_plan()
            .await
            .unwrap_err();
        assert!(matches!(err, MegaverseError::Plan { .. }));

        let err = CrossPattern::with_bounds(5, 0, 5)
            .generate_plan()
            .await
            .unwrap_err();
        assert!(matches!(err, MegaverseError::Plan { .. }));
    }

    #[test]
    fn test_grid_size_covers_plan() {
        let pattern = CrossPattern::new();
        assert_eq!(pattern.grid_size(), Some((11, 11)));
        assert_eq!(pattern.name(), "cross");

        let plan = tokio_test::block_on(pattern.generate_plan()).unwrap();
        assert!(plan
            .operations()
            .iter()
            .all(|op| op.position().row < 11 && op.position().column < 11));
    }
}
