//! Megaverse API client.
//!
//! Draws shapes on the Crossmint megaverse grid by placing Polyanets,
//! Soloons and Comeths through its HTTP API. Every outbound call passes
//! through a shared token-bucket rate limiter and a bounded exponential
//! retry policy, and plans run sequentially, in batches, or on a bounded
//! worker pool.
//!
//! # Features
//!
//! - **Rate limiting**: one limiter shared by every call, adjustable at runtime
//! - **Retries**: transient failures (network, timeouts, 429, 5xx) back off and retry
//! - **Orchestration**: sequential, batched and bounded-parallel execution
//! - **Cancellation**: one `CancellationToken` stops waits, backoff and dispatch
//! - **Observability**: `tracing` spans and events, in-process metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use megaverse_client::{CreateOperation, ExecutionPlan, MegaverseClient, SoloonColor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MegaverseClient::builder()
//!         .candidate_id("your-candidate-id")
//!         .requests_per_second(2.0)
//!         .build()?;
//!
//!     let plan = ExecutionPlan::sequential(vec![
//!         CreateOperation::polyanet(1, 1),
//!         CreateOperation::soloon(1, 2, SoloonColor::Blue),
//!     ]);
//!
//!     let result = client.run(&plan).await;
//!     println!("{} of {} succeeded", result.succeeded(), result.attempted);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod errors;
pub mod observability;
pub mod orchestrator;
pub mod resilience;
pub mod services;
pub mod strategies;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{ClearReport, MegaverseClient, MegaverseClientBuilder};
pub use config::MegaverseConfig;
pub use errors::{MegaverseError, MegaverseResult};
pub use orchestrator::{OperationDispatcher, Orchestrator};
pub use resilience::{RateLimiter, ResilienceConfig, ResiliencePipeline, RetryConfig, RetryPolicy};
pub use strategies::{CrossPattern, LogoPattern, PlanGenerator};
pub use tokio_util::sync::CancellationToken;

// Type re-exports
pub use types::{
    AggregateResult, CallOutcome, ComethDirection, CreateOperation, ExecutionMode, ExecutionPlan,
    GoalCell, GoalMap, Megaverse, Mismatch, ObjectKind, OperationFailure, Position, SoloonColor,
    ValidationReport,
};

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
