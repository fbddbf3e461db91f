use thiserror::Error;

/// Failures reported by the engine. Nothing is retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    /// An input was rejected before any computation started.
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter {
        /// Name of the offending input.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
    /// A query was issued without a completed simulation run.
    #[error("no simulation run available; generate data first")]
    MissingRunState,
}

impl SimulationError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }

    /// Field name for `InvalidParameter`, `None` otherwise.
    #[must_use]
    pub const fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidParameter { field, .. } => Some(*field),
            Self::MissingRunState => None,
        }
    }
}

/// Result alias used throughout the engine.
pub type SimulationResult<T> = Result<T, SimulationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_field() {
        let err = SimulationError::invalid("sigma2", "must be non-negative, got -1");
        assert_eq!(
            err.to_string(),
            "invalid parameter `sigma2`: must be non-negative, got -1"
        );
        assert_eq!(err.field(), Some("sigma2"));
        assert_eq!(SimulationError::MissingRunState.field(), None);
    }
}
