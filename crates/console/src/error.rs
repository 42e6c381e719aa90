use marketdesk_core::error::CoreError;

use crate::source::SourceError;

/// Error type for console operations.
///
/// Wraps [`CoreError`] for engine and configuration errors and adds the
/// runtime variants (fetch failures, concurrency guard, view state).
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// An engine-level error from `marketdesk_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The data source could not produce a snapshot.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// A bulk dispatch overlaps ids that are already being processed.
    #[error("A bulk operation is already in progress for {overlapping} of the selected records")]
    OperationInProgress { overlapping: usize },

    /// The operation needs a loaded snapshot.
    #[error("View is not ready (state: {state})")]
    NotReady { state: &'static str },

    /// The view was torn down before the operation finished.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Convenience alias for console return values.
pub type ConsoleResult<T> = Result<T, ConsoleError>;

impl From<SourceError> for ConsoleError {
    fn from(err: SourceError) -> Self {
        Self::Fetch(err.to_string())
    }
}

impl ConsoleError {
    /// Stable machine-readable code for the notice shown to the operator.
    pub fn code(&self) -> &'static str {
        match self {
            ConsoleError::Core(core) => match core {
                CoreError::UnknownField(_) => "UNKNOWN_FIELD",
                CoreError::Validation(_) => "VALIDATION_ERROR",
                CoreError::EmptySelection => "EMPTY_SELECTION",
                CoreError::NoActionSelected => "NO_ACTION_SELECTED",
                CoreError::InvalidRecord { .. } | CoreError::DuplicateId(_) => "INVALID_RECORD",
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    "INTERNAL_ERROR"
                }
            },
            ConsoleError::Fetch(_) => "FETCH_FAILED",
            ConsoleError::OperationInProgress { .. } => "OPERATION_IN_PROGRESS",
            ConsoleError::NotReady { .. } => "NOT_READY",
            ConsoleError::Cancelled => "CANCELLED",
        }
    }
}
