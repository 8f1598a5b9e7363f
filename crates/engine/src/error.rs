use branchplan_core::ValidationErrors;
use branchplan_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("plan not found: {0}")]
    PlanNotFound(String),

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("plan {plan_id} was modified concurrently: expected version {expected}, found {found}")]
    Conflict {
        plan_id: String,
        expected: u64,
        found: u64,
    },

    #[error("storage error: {0}")]
    Storage(#[source] StorageError),

    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    /// Validation and conflict failures can be fixed by the caller
    /// (correct the input, or reload and retry).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Conflict { .. })
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for EngineError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::VersionMismatch {
                plan_id,
                expected,
                found,
            } => Self::Conflict {
                plan_id,
                expected,
                found,
            },
            StorageError::NotFound(plan_id) => Self::PlanNotFound(plan_id),
            other => Self::Storage(other),
        }
    }
}
