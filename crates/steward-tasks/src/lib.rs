//! Background task execution with task-scoped database sessions.
//!
//! A [`TaskExecutor`] runs [`Task`]s. Each invocation gets a fresh
//! [`TaskContext`] whose session is opened only if the task asks for it.
//! When the task returns, the executor settles the session:
//!
//! | Task result | Session opened | Action |
//! |-------------|----------------|--------|
//! | `Ok`        | yes            | commit, close |
//! | `Err` / panic / cancellation | yes | roll back, close |
//! | any         | no             | nothing |
//!
//! The session factory is built lazily the first time any task of the
//! executor touches the database and is then shared by all of its tasks.
//! Sessions themselves are never shared between invocations.
//!
//! Hooks registered on the executor ([`TaskHook`]) run after every task,
//! once the session has been settled.

mod context;
mod error;
mod executor;
mod hook;

pub use context::{TaskContext, TaskSession};
pub use error::TaskError;
pub use executor::{Task, TaskExecutor, TaskExecutorBuilder, TaskReport};
pub use hook::{TaskCompletion, TaskHook, TaskStatus};
