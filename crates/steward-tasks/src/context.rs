//! Per-invocation task context.

use std::sync::Arc;

use steward_db::{Session, SessionError, SessionScope};
use uuid::Uuid;

/// The lazily-opened session of one task invocation.
#[derive(Clone, Debug)]
pub struct TaskSession {
    scope: Arc<SessionScope>,
}

impl TaskSession {
    pub(crate) fn new(scope: Arc<SessionScope>) -> Self {
        Self { scope }
    }

    /// Runs `f` with the task's session on a blocking thread, opening the
    /// session on first use.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or a `SessionError` (converted into `E`)
    /// if the session cannot be opened or the blocking worker fails.
    pub async fn run<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Session) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<SessionError> + Send + 'static,
    {
        let scope = Arc::clone(&self.scope);
        tokio::task::spawn_blocking(move || scope.with_session(f))
            .await
            .map_err(|e| E::from(SessionError::Worker(e.to_string())))?
    }

    /// Whether the task has opened its session.
    pub fn is_open(&self) -> bool {
        self.scope.is_open()
    }
}

/// What a running task knows about itself.
#[derive(Clone, Debug)]
pub struct TaskContext {
    task_id: Uuid,
    task_name: &'static str,
    session: TaskSession,
}

impl TaskContext {
    pub(crate) fn new(task_id: Uuid, task_name: &'static str, session: TaskSession) -> Self {
        Self {
            task_id,
            task_name,
            session,
        }
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub fn task_name(&self) -> &'static str {
        self.task_name
    }

    /// The task's database session.
    pub fn db(&self) -> &TaskSession {
        &self.session
    }
}
