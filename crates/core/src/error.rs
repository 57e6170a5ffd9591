//! Error taxonomy for the risk desk.
//!
//! Pure-computation errors (`Config`, `Validation`, `StateTransition`,
//! `PreconditionFailed`) are contract violations and are never retried.
//! Collaborator errors are operational and are converted into typed
//! "no result" values by the callers that expect them.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the risk desk core and its collaborator boundary.
#[derive(Debug, Error)]
pub enum RiskError {
    /// Missing or malformed risk configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid entity construction or input, rejected before any external call.
    #[error("validation error: {0}")]
    Validation(String),

    /// An external call exceeded its time budget.
    #[error("collaborator timeout: {operation} exceeded {timeout:?}")]
    CollaboratorTimeout {
        /// Name of the timed-out operation.
        operation: String,
        /// Budget that was exceeded.
        timeout: Duration,
    },

    /// An external call failed or returned a malformed response.
    #[error("collaborator error during {operation}: {message}")]
    Collaborator {
        /// Name of the failed operation.
        operation: String,
        /// Error detail reported by the collaborator.
        message: String,
    },

    /// Attempted order or proposal transition not on the allow-list.
    #[error("illegal state transition: {from} -> {to}")]
    StateTransition {
        /// State the entity was in.
        from: String,
        /// State that was requested.
        to: String,
    },

    /// A mandatory precondition for an irreversible action was not met.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// A durable write or read failed.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl RiskError {
    /// Creates a collaborator error.
    pub fn collaborator(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a collaborator timeout error.
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::CollaboratorTimeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// Creates a state transition error from any displayable states.
    pub fn transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::StateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns true for I/O-boundary failures that may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::CollaboratorTimeout { .. } | Self::Collaborator { .. }
        )
    }

    /// Returns true for programmer-facing contract violations.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Validation(_)
                | Self::StateTransition { .. }
                | Self::PreconditionFailed(_)
        )
    }
}

impl From<serde_json::Error> for RiskError {
    fn from(err: serde_json::Error) -> Self {
        Self::collaborator("decode", err.to_string())
    }
}

/// Result type alias for risk desk operations.
pub type Result<T> = std::result::Result<T, RiskError>;

/// Runs `fut` under a time budget, mapping expiry to [`RiskError::CollaboratorTimeout`].
///
/// # Errors
/// Returns the inner error, or a timeout error if `timeout` elapses first.
pub async fn with_timeout<T, F>(operation: &str, timeout: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, ?timeout, "Collaborator call timed out");
            Err(RiskError::timeout(operation, timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_error_display() {
        let err = RiskError::transition("DRAFT", "FILLED");
        assert_eq!(err.to_string(), "illegal state transition: DRAFT -> FILLED");
        assert!(err.is_contract_violation());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_collaborator_errors_are_transient() {
        assert!(RiskError::collaborator("what_if", "HTTP 503").is_transient());
        assert!(RiskError::timeout("poll", Duration::from_secs(30)).is_transient());
        assert!(!RiskError::Persistence("disk full".to_string()).is_transient());
    }

    #[test]
    fn test_json_error_maps_to_collaborator() {
        let err: RiskError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, RiskError::Collaborator { .. }));
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: Result<()> = with_timeout("slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(
            result,
            Err(RiskError::CollaboratorTimeout { ref operation, .. }) if operation == "slow"
        ));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let result = with_timeout("fast", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
