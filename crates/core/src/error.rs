use crate::types::RecordId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No records selected")]
    EmptySelection,

    #[error("No bulk action selected")]
    NoActionSelected,

    #[error("Invalid record at position {position}: {reason}")]
    InvalidRecord { position: usize, reason: String },

    #[error("Duplicate record id {0}")]
    DuplicateId(RecordId),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias for fallible core operations.
pub type CoreResult<T> = Result<T, CoreError>;
