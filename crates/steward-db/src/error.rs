//! Error types for the database layer.

use thiserror::Error;

use crate::pool::PoolError;

/// Errors that can occur when reading database settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A required key is absent or blank.
    #[error("missing required setting '{0}'")]
    Missing(String),

    /// A key is present but its value cannot be parsed.
    #[error("invalid value '{value}' for setting '{key}'")]
    Invalid { key: String, value: String },
}

/// Errors that can occur while opening, using or finishing a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session factory could not be built.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The connection pool could not be built.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// No connection could be acquired from the pool.
    #[error("failed to acquire database connection: {0}")]
    Connect(#[from] r2d2::Error),

    /// A statement, commit or rollback failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The scope has already been finished; its session is gone.
    #[error("session scope already finished")]
    ScopeFinished,

    /// The blocking worker running session work did not complete.
    #[error("session worker failed: {0}")]
    Worker(String),
}

/// Errors that can occur when creating or dropping the schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// No connection could be acquired from the pool.
    #[error("failed to acquire database connection: {0}")]
    Connect(#[from] r2d2::Error),

    /// A DDL statement failed.
    #[error("schema statement for table '{table}' failed: {source}")]
    Statement {
        table: String,
        source: rusqlite::Error,
    },

    /// Beginning or committing the schema transaction failed.
    #[error("schema transaction failed: {0}")]
    Transaction(rusqlite::Error),
}
