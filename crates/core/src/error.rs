use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("duplicate override for branch {branch_id}")]
    DuplicateOverride { branch_id: String },

    #[error("invalid data: {0}")]
    InvalidData(String),
}
