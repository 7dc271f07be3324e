//! The task executor.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use steward_db::{
    DbSettings, LazySessionFactory, ScopeKind, ScopeOutcome, SessionError, SessionFactory,
    SessionScope,
};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::context::{TaskContext, TaskSession};
use crate::error::TaskError;
use crate::hook::{TaskCompletion, TaskHook, TaskStatus};

/// A unit of background work.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Name used in logs and completion reports.
    fn name(&self) -> &'static str;

    /// Runs the task. Returning `Err` rolls back the task's session.
    async fn run(&self, ctx: &TaskContext, args: Value) -> Result<Value, TaskError>;
}

/// Outcome of one task invocation.
#[derive(Debug)]
pub struct TaskReport {
    pub task_id: Uuid,
    pub result: Result<Value, TaskError>,
}

impl TaskReport {
    pub fn status(&self) -> TaskStatus {
        if self.result.is_ok() {
            TaskStatus::Success
        } else {
            TaskStatus::Failure
        }
    }
}

/// Builder for [`TaskExecutor`].
pub struct TaskExecutorBuilder {
    settings: DbSettings,
    hooks: Vec<Arc<dyn TaskHook>>,
}

impl TaskExecutorBuilder {
    /// Adds a hook applied to every task.
    pub fn hook(mut self, hook: Arc<dyn TaskHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> TaskExecutor {
        TaskExecutor {
            inner: Arc::new(Inner {
                sessions: Arc::new(LazySessionFactory::new(self.settings)),
                hooks: self.hooks,
            }),
        }
    }
}

struct Inner {
    sessions: Arc<LazySessionFactory>,
    hooks: Vec<Arc<dyn TaskHook>>,
}

/// Runs tasks, each with its own session scope.
///
/// Cloning is cheap; clones share the session factory and the hooks.
#[derive(Clone)]
pub struct TaskExecutor {
    inner: Arc<Inner>,
}

impl TaskExecutor {
    pub fn builder(settings: DbSettings) -> TaskExecutorBuilder {
        TaskExecutorBuilder {
            settings,
            hooks: Vec::new(),
        }
    }

    /// The session factory, if any task has needed it yet.
    pub fn session_factory(&self) -> Option<&SessionFactory> {
        self.inner.sessions.get()
    }

    /// Runs `task` to completion on the current runtime.
    pub async fn execute(&self, task: Arc<dyn Task>, args: Value) -> TaskReport {
        self.run(Uuid::new_v4(), task, args).await
    }

    /// Starts `task` in the background and returns its id right away.
    pub fn spawn(&self, task: Arc<dyn Task>, args: Value) -> (Uuid, JoinHandle<TaskReport>) {
        let task_id = Uuid::new_v4();
        let executor = self.clone();
        let handle = tokio::spawn(async move { executor.run(task_id, task, args).await });
        (task_id, handle)
    }

    async fn run(&self, task_id: Uuid, task: Arc<dyn Task>, args: Value) -> TaskReport {
        let task_name = task.name();
        let span = tracing::info_span!("task", %task_id, task = task_name);

        async move {
            let sessions: Arc<LazySessionFactory> = Arc::clone(&self.inner.sessions);
            let scope = Arc::new(SessionScope::new(ScopeKind::Task, sessions));
            let ctx = TaskContext::new(task_id, task_name, TaskSession::new(Arc::clone(&scope)));

            tracing::info!("task started");

            let body_args = args.clone();
            let joined = tokio::spawn(
                async move { task.run(&ctx, body_args).await }.in_current_span(),
            )
            .await;

            let mut result = match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(TaskError::Panicked(panic_message(e.into_panic()))),
                Err(_) => Err(TaskError::Cancelled),
            };

            let outcome = if result.is_ok() {
                ScopeOutcome::Commit
            } else {
                ScopeOutcome::Rollback
            };
            let finished = tokio::task::spawn_blocking(move || scope.finish(outcome))
                .await
                .map_err(|e| SessionError::Worker(e.to_string()))
                .and_then(|r| r);

            match finished {
                Ok(true) => tracing::debug!(outcome = outcome.as_str(), "task session settled"),
                Ok(false) => tracing::debug!("task did not use its session"),
                Err(e) => {
                    tracing::error!(outcome = outcome.as_str(), error = %e, "failed to settle task session");
                    if result.is_ok() {
                        result = Err(TaskError::Session(e));
                    }
                }
            }

            let report = TaskReport { task_id, result };
            let status = report.status();
            match &report.result {
                Ok(_) => tracing::info!(status = status.as_str(), "task finished"),
                Err(e) => tracing::warn!(status = status.as_str(), error = %e, "task finished"),
            }

            let completion = TaskCompletion {
                task_id,
                task_name,
                status,
                args: &args,
                result: report.result.as_ref().ok(),
                failure: report.result.as_ref().err(),
            };
            for hook in &self.inner.hooks {
                hook.after_return(&completion);
            }

            report
        }
        .instrument(span)
        .await
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
