//! Database layer for Steward.
//!
//! Provides the session machinery that request handlers and background tasks
//! share, and the schema manager that creates and drops model tables.
//!
//! # Pieces
//!
//! - [`DbSettings`]: connection settings read from a flat, prefix-scoped
//!   settings map (`db.url`, `db.pool_max_size`, ...).
//! - [`SessionFactory`]: an `r2d2` pool of SQLite connections. Shared,
//!   cheap to clone and read-only after construction.
//! - [`Session`]: one pooled connection plus its transaction state. A
//!   transaction begins on first use and ends with commit, rollback or close.
//! - [`SessionScope`]: binds at most one lazily-opened session to one unit of
//!   work and guarantees it is released exactly once, whatever way the unit of
//!   work ends.
//! - [`create_schema`] / [`drop_schema`]: DDL for every table in a
//!   [`steward_model::ModelRegistry`].
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode** keeps the store in-process; WAL lets concurrent
//!   readers proceed alongside the single writer.
//! - **Explicit scopes instead of callbacks**: whoever opens a scope finishes
//!   it with an outcome, and `Drop` rolls back anything left unfinished.

mod error;
mod pool;
mod schema;
mod scope;
mod session;
mod settings;

pub use error::{SchemaError, SessionError, SettingsError};
pub use pool::{create_pool, DbPool, PoolError};
pub use schema::{create_schema, create_table_sql, drop_schema};
pub use scope::{LazySessionFactory, ScopeKind, ScopeOutcome, SessionScope, SessionSource};
pub use session::{Session, SessionFactory, SessionStats};
pub use settings::{DbSettings, DEFAULT_PREFIX};
