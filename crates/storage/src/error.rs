use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("version mismatch on plan {plan_id}: expected {expected}, found {found}")]
    VersionMismatch {
        plan_id: String,
        expected: u64,
        found: u64,
    },

    #[error("core error: {0}")]
    Core(#[from] branchplan_core::CoreError),
}
