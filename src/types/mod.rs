//! Domain types shared by the services, the resilience layer and the orchestrator.

mod goal;
mod objects;
mod outcome;
mod plan;

pub use goal::{GoalCell, GoalMap, Megaverse, Mismatch, ValidationReport};
pub use objects::{ComethDirection, CreateOperation, ObjectKind, Position, SoloonColor};
pub use outcome::{AggregateResult, CallOutcome, OperationFailure};
pub use plan::{ExecutionMode, ExecutionPlan, DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY};
