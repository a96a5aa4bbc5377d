use thiserror::Error;

/// Error kinds for patient-flow operations.
///
/// `Conflict` is the only transient kind: the caller may retry it against
/// freshly queried data. Everything else is terminal for that request.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid state: {0}")]
    State(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FlowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the caller may retry the operation with fresh data.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Short machine-readable kind tag, used in logs and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::State(_) => "state",
            Self::Internal(_) => "internal",
        }
    }
}

/// Convenience result type for core operations
pub type FlowResult<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FlowError::not_found("bed", "b-123");
        assert_eq!(err.to_string(), "bed b-123 not found");

        let err = FlowError::conflict("bed b-123 is already occupied");
        assert_eq!(err.to_string(), "conflict: bed b-123 is already occupied");
    }

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(FlowError::conflict("contention").is_retryable());
        assert!(!FlowError::validation("bad input").is_retryable());
        assert!(!FlowError::not_found("ward", "w-1").is_retryable());
        assert!(!FlowError::state("already discharged").is_retryable());
        assert!(!FlowError::internal("store unavailable").is_retryable());
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(FlowError::validation("x").kind(), "validation");
        assert_eq!(FlowError::not_found("bed", "1").kind(), "not_found");
        assert_eq!(FlowError::conflict("x").kind(), "conflict");
        assert_eq!(FlowError::state("x").kind(), "state");
        assert_eq!(FlowError::internal("x").kind(), "internal");
    }
}
