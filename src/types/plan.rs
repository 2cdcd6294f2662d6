//! Execution plans.

use serde::{Deserialize, Serialize};

use super::objects::CreateOperation;

/// Batch size used when a batched plan does not specify a positive one.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Worker count used for bounded-parallel execution.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// How the operations of a plan are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One at a time, in plan order.
    #[default]
    Sequential,
    /// A fixed pool of workers drains a shared queue.
    BoundedParallel,
    /// Contiguous groups processed one after another, sequential within a group.
    Batched,
}

/// An ordered list of operations plus the mode to run them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    operations: Vec<CreateOperation>,
    mode: ExecutionMode,
    batch_size: Option<usize>,
}

impl ExecutionPlan {
    /// Creates a plan with the given mode.
    pub fn new(operations: Vec<CreateOperation>, mode: ExecutionMode) -> Self {
        Self {
            operations,
            mode,
            batch_size: None,
        }
    }

    /// Creates a sequential plan.
    pub fn sequential(operations: Vec<CreateOperation>) -> Self {
        Self::new(operations, ExecutionMode::Sequential)
    }

    /// Creates a bounded-parallel plan.
    pub fn parallel(operations: Vec<CreateOperation>) -> Self {
        Self::new(operations, ExecutionMode::BoundedParallel)
    }

    /// Creates a batched plan. A zero batch size falls back to the default.
    pub fn batched(operations: Vec<CreateOperation>, batch_size: usize) -> Self {
        Self::new(operations, ExecutionMode::Batched).with_batch_size(batch_size)
    }

    /// Sets the batch size. Zero clears it, so [`DEFAULT_BATCH_SIZE`] applies.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = (batch_size > 0).then_some(batch_size);
        self
    }

    /// Sets the batch size only if the plan does not carry one yet.
    pub fn or_batch_size(self, batch_size: usize) -> Self {
        if self.batch_size.is_some() {
            self
        } else {
            self.with_batch_size(batch_size)
        }
    }

    /// Operations in plan order.
    pub fn operations(&self) -> &[CreateOperation] {
        &self.operations
    }

    /// Execution mode.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Batch size, always positive.
    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    /// Returns true if the batch size was chosen explicitly.
    pub fn has_batch_size(&self) -> bool {
        self.batch_size.is_some()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if the plan has no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_defaults_when_zero() {
        let plan = ExecutionPlan::batched(vec![CreateOperation::polyanet(0, 0)], 0);
        assert_eq!(plan.batch_size(), DEFAULT_BATCH_SIZE);
        assert_eq!(plan.mode(), ExecutionMode::Batched);

        let plan = ExecutionPlan::batched(Vec::new(), 3);
        assert_eq!(plan.batch_size(), 3);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_default_mode_is_sequential() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::Sequential);
        let plan = ExecutionPlan::sequential(vec![CreateOperation::polyanet(1, 1)]);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.batch_size(), DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_fallback_batch_size_keeps_explicit_choice() {
        let chosen = ExecutionPlan::batched(Vec::new(), 2).or_batch_size(9);
        assert_eq!(chosen.batch_size(), 2);

        let unset = ExecutionPlan::new(Vec::new(), ExecutionMode::Batched);
        assert!(!unset.has_batch_size());
        let filled = unset.or_batch_size(9);
        assert!(filled.has_batch_size());
        assert_eq!(filled.batch_size(), 9);

        let zero = ExecutionPlan::batched(Vec::new(), 0).or_batch_size(0);
        assert!(!zero.has_batch_size());
        assert_eq!(zero.batch_size(), DEFAULT_BATCH_SIZE);
    }
}
