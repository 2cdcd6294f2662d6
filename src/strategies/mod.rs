//! Plan generators.
//!
//! A [`PlanGenerator`] turns a target shape into an [`ExecutionPlan`] the
//! orchestrator can run.

mod cross;
mod logo;

pub use cross::CrossPattern;
pub use logo::LogoPattern;

use async_trait::async_trait;

use crate::errors::MegaverseResult;
use crate::types::ExecutionPlan;

/// Produces the operations needed to draw one target shape.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Builds the plan. Failures are reported as [`MegaverseError::Plan`].
    ///
    /// [`MegaverseError::Plan`]: crate::errors::MegaverseError::Plan
    async fn generate_plan(&self) -> MegaverseResult<ExecutionPlan>;

    /// Grid size as `(width, height)`, when known without a network call.
    fn grid_size(&self) -> Option<(usize, usize)>;
}
