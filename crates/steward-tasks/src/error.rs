//! Error types for task execution.

use steward_db::SessionError;

/// Why a task did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The task reported a failure.
    #[error("task failed: {0}")]
    Failed(String),

    /// Opening, using or settling the task's session failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The task panicked.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task was cancelled before it finished.
    #[error("task was cancelled")]
    Cancelled,
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

// Task bodies run plain SQL through the session connection.
impl From<rusqlite::Error> for TaskError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Session(SessionError::Database(e))
    }
}
