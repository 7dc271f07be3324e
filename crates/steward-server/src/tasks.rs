//! Background tasks and their status ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use steward_model::Jsonable;
use steward_tasks::{Task, TaskCompletion, TaskContext, TaskError, TaskHook, TaskStatus};
use uuid::Uuid;

use crate::models::User;
use crate::users;

/// Imports a batch of users. All rows are written or none are.
///
/// Arguments: a JSON array of user objects. Result: `{"imported": n}`.
pub struct ImportUsers;

impl ImportUsers {
    pub const NAME: &'static str = "import_users";
}

#[async_trait]
impl Task for ImportUsers {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, ctx: &TaskContext, args: Value) -> Result<Value, TaskError> {
        let rows = parse_rows(args)?;
        let batch = User::from_json_list(rows).map_err(|e| TaskError::failed(e.to_string()))?;

        let imported = ctx
            .db()
            .run(move |session| {
                let conn = session.connection()?;
                for user in &batch {
                    users::insert_user(conn, user)?;
                }
                Ok::<_, TaskError>(batch.len())
            })
            .await?;

        tracing::info!(imported, "imported users");
        Ok(json!({ "imported": imported }))
    }
}

/// Checks that `args` is an array of objects.
pub fn parse_rows(args: Value) -> Result<Vec<Map<String, Value>>, TaskError> {
    let Value::Array(items) = args else {
        return Err(TaskError::failed("expected an array of user objects"));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(map),
            _ => Err(TaskError::failed(format!("element {index} is not an object"))),
        })
        .collect()
}

/// Lifecycle state of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Pending,
    Success,
    Failure,
}

/// What the ledger knows about one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    #[serde(rename = "taskId")]
    pub task_id: Uuid,
    pub task: &'static str,
    pub status: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the task completed; `None` while it is pending.
    #[serde(skip)]
    pub finished_at: Option<Instant>,
}

/// Records the status of every submitted task. Installed as a [`TaskHook`]
/// so completions land here as they happen.
///
/// Finished records are kept until [`TaskLedger::prune`] drops the ones older
/// than the ledger's TTL. Pending records are never pruned.
#[derive(Debug, Clone, Default)]
pub struct TaskLedger {
    records: Arc<Mutex<HashMap<Uuid, TaskRecord>>>,
    ttl: Option<Duration>,
}

impl TaskLedger {
    /// A ledger that keeps finished records forever.
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger whose finished records expire `ttl` after completion.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::default()
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops finished records older than the TTL and returns how many were
    /// dropped. Does nothing for a ledger without a TTL.
    pub fn prune(&self) -> usize {
        match self.ttl.and_then(|ttl| Instant::now().checked_sub(ttl)) {
            Some(cutoff) => self.prune_finished_before(cutoff),
            None => 0,
        }
    }

    /// Drops records that finished before `cutoff`.
    pub fn prune_finished_before(&self, cutoff: Instant) -> usize {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|_, record| record.finished_at.map_or(true, |at| at >= cutoff));
        before - records.len()
    }

    /// Marks `task_id` as pending unless it has already completed.
    pub fn submitted(&self, task_id: Uuid, task: &'static str) {
        self.lock().entry(task_id).or_insert(TaskRecord {
            task_id,
            task,
            status: TaskState::Pending,
            result: None,
            error: None,
            finished_at: None,
        });
    }

    pub fn get(&self, task_id: &Uuid) -> Option<TaskRecord> {
        self.lock().get(task_id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, TaskRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("task ledger lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl TaskHook for TaskLedger {
    fn after_return(&self, completion: &TaskCompletion<'_>) {
        let status = match completion.status {
            TaskStatus::Success => TaskState::Success,
            TaskStatus::Failure => TaskState::Failure,
        };
        self.lock().insert(
            completion.task_id,
            TaskRecord {
                task_id: completion.task_id,
                task: completion.task_name,
                status,
                result: completion.result.cloned(),
                error: completion.failure.map(ToString::to_string),
                finished_at: Some(Instant::now()),
            },
        );
    }
}
