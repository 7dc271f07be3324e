//! Steward server library logic.

pub mod api;
pub mod api_tasks;
pub mod background;
pub mod config;
pub mod models;
pub mod registry;
pub mod session;
pub mod tasks;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use steward_db::SettingsError;
use steward_tasks::TaskExecutor;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::registry::{AppRegistry, WiringError};
use crate::tasks::TaskLedger;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session factory, model registry and transaction policy.
    pub registry: AppRegistry,
    /// Executor for background tasks.
    pub tasks: TaskExecutor,
    /// Status of submitted tasks.
    pub ledger: TaskLedger,
}

/// Settings key for how long finished task records are kept, in seconds.
/// `0` keeps them forever.
pub const TASK_RESULT_TTL_KEY: &str = "tasks.result_ttl_seconds";

const DEFAULT_TASK_RESULT_TTL_SECONDS: u64 = 3600;

/// Wires the database, the models and the task executor from `config`.
///
/// # Errors
///
/// Returns `WiringError` if the `db.` settings or the task result TTL are
/// invalid, or the database cannot be opened.
pub fn build_state(config: &Config) -> Result<AppState, WiringError> {
    let registry = AppRegistry::configure(&config.settings, models::models())?;

    let ttl_seconds = match config.settings.get(TASK_RESULT_TTL_KEY) {
        None => DEFAULT_TASK_RESULT_TTL_SECONDS,
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| SettingsError::Invalid {
            key: TASK_RESULT_TTL_KEY.to_string(),
            value: raw.clone(),
        })?,
    };
    let ledger = if ttl_seconds == 0 {
        TaskLedger::new()
    } else {
        TaskLedger::with_ttl(Duration::from_secs(ttl_seconds))
    };
    let tasks = registry
        .task_executor()
        .hook(Arc::new(ledger.clone()))
        .build();
    Ok(AppState {
        registry,
        tasks,
        ledger,
    })
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let db_routes = Router::new()
        .route(
            "/api/users",
            get(api::list_users_handler).post(api::create_user_handler),
        )
        .route(
            "/api/users/{id}",
            get(api::get_user_handler).delete(api::delete_user_handler),
        );
    let db_routes = session::with_request_sessions(db_routes, state.registry.clone());

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/tasks/import-users",
            post(api_tasks::import_users_handler),
        )
        .route("/api/tasks/{taskId}", get(api_tasks::get_task_handler))
        .merge(db_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(Extension(Arc::new(state)))
        .layer(TraceLayer::new_for_http())
}
