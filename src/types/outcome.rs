//! Call outcomes and aggregated execution results.

use crate::errors::{MegaverseError, MegaverseResult};

use super::objects::CreateOperation;

/// Result of one attempted remote call, as seen by the retry policy.
#[derive(Debug, Clone)]
pub enum CallOutcome<T> {
    /// The call succeeded.
    Success(T),
    /// The call failed but another attempt may succeed.
    Retryable(MegaverseError),
    /// The call failed and retrying will not help.
    Permanent(MegaverseError),
}

impl<T> CallOutcome<T> {
    /// Classifies a plain result with [`MegaverseError::is_retryable`].
    pub fn classify(result: MegaverseResult<T>) -> Self {
        Self::classify_with(result, MegaverseError::is_retryable)
    }

    /// Classifies a plain result with a caller-supplied predicate.
    pub fn classify_with<P>(result: MegaverseResult<T>, is_retryable: P) -> Self
    where
        P: Fn(&MegaverseError) -> bool,
    {
        match result {
            Ok(value) => CallOutcome::Success(value),
            Err(err) if is_retryable(&err) => CallOutcome::Retryable(err),
            Err(err) => CallOutcome::Permanent(err),
        }
    }

    /// Returns true for [`CallOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    /// Collapses the outcome into a plain result.
    pub fn into_result(self) -> MegaverseResult<T> {
        match self {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::Retryable(err) | CallOutcome::Permanent(err) => Err(err),
        }
    }
}

/// A failed operation together with its plan index.
#[derive(Debug, Clone)]
pub struct OperationFailure {
    /// Index of the operation in the plan.
    pub index: usize,
    /// The operation that failed.
    pub operation: CreateOperation,
    /// Final error after retries.
    pub error: MegaverseError,
}

/// Summary of one plan run.
#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    /// Operations that were dispatched (validation failures included).
    pub attempted: usize,
    /// Per-operation failures, ordered by plan index.
    pub failures: Vec<OperationFailure>,
    /// Operations never dispatched because cancellation was observed first.
    pub skipped: usize,
    /// True if the run stopped early because of cancellation.
    pub cancelled: bool,
}

impl AggregateResult {
    /// Number of failed operations.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Number of operations that succeeded.
    pub fn succeeded(&self) -> usize {
        self.attempted.saturating_sub(self.failures.len())
    }

    /// Returns true if every attempted operation succeeded and nothing was skipped.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    pub(crate) fn record_failure(
        &mut self,
        index: usize,
        operation: CreateOperation,
        error: MegaverseError,
    ) {
        self.failures.push(OperationFailure {
            index,
            operation,
            error,
        });
    }

    pub(crate) fn sort_failures(&mut self) {
        self.failures.sort_by_key(|f| f.index);
    }

    /// Converts the summary into an error if the run was not a full success.
    pub fn into_result(self) -> MegaverseResult<AggregateResult> {
        if self.cancelled {
            return Err(MegaverseError::cancelled(format!(
                "execution cancelled after {} operations ({} skipped)",
                self.attempted, self.skipped
            )));
        }
        if !self.failures.is_empty() {
            return Err(MegaverseError::Execution {
                attempted: self.attempted,
                failed: self.failures.len(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let ok: CallOutcome<u8> = CallOutcome::classify(Ok(1));
        assert!(ok.is_success());

        let retry: CallOutcome<u8> =
            CallOutcome::classify(Err(MegaverseError::from_status(502, "", "/x")));
        assert!(matches!(retry, CallOutcome::Retryable(_)));

        let permanent: CallOutcome<u8> =
            CallOutcome::classify(Err(MegaverseError::from_status(400, "", "/x")));
        assert!(matches!(permanent, CallOutcome::Permanent(_)));
    }

    #[test]
    fn test_classify_with_custom_predicate() {
        let outcome: CallOutcome<()> =
            CallOutcome::classify_with(Err(MegaverseError::from_status(404, "", "/x")), |e| {
                e.status_code() == Some(404)
            });
        assert!(matches!(outcome, CallOutcome::Retryable(_)));
    }

    #[test]
    fn test_aggregate_into_result() {
        let mut result = AggregateResult {
            attempted: 4,
            ..Default::default()
        };
        assert!(result.is_success());

        result.record_failure(
            2,
            CreateOperation::polyanet(1, 1),
            MegaverseError::from_status(400, "bad", "/polyanets"),
        );
        assert_eq!(result.failed(), 1);
        assert_eq!(result.succeeded(), 3);

        let err = result.into_result().unwrap_err();
        assert!(matches!(
            err,
            MegaverseError::Execution {
                attempted: 4,
                failed: 1
            }
        ));
    }

    #[test]
    fn test_cancelled_aggregate_is_error() {
        let result = AggregateResult {
            attempted: 2,
            skipped: 3,
            cancelled: true,
            ..Default::default()
        };
        assert!(result.into_result().unwrap_err().is_cancellation());
    }
}
