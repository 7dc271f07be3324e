//! Completion hooks run after every task.

use serde_json::Value;
use uuid::Uuid;

use crate::error::TaskError;

/// Final state of a task invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Success,
    Failure,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

/// Everything a hook learns about a finished task.
#[derive(Debug)]
pub struct TaskCompletion<'a> {
    pub task_id: Uuid,
    pub task_name: &'static str,
    pub status: TaskStatus,
    /// Arguments the task was invoked with.
    pub args: &'a Value,
    /// Return value, on success.
    pub result: Option<&'a Value>,
    /// Failure, otherwise.
    pub failure: Option<&'a TaskError>,
}

/// Behaviour applied to every task an executor runs.
///
/// Hooks run after the task's session has been committed or rolled back, in
/// registration order.
pub trait TaskHook: Send + Sync {
    fn after_return(&self, completion: &TaskCompletion<'_>);
}
