//! Configuration-time wiring of the database into the application.

use std::collections::BTreeMap;
use std::sync::Arc;

use steward_db::{
    create_schema, drop_schema, DbSettings, SchemaError, SessionError, SessionFactory,
    SettingsError, DEFAULT_PREFIX,
};
use steward_model::ModelRegistry;
use steward_tasks::{TaskExecutor, TaskExecutorBuilder};
use thiserror::Error;

/// Errors that can occur while wiring the application together.
#[derive(Debug, Error)]
pub enum WiringError {
    /// The database settings are missing or malformed.
    #[error("invalid database settings: {0}")]
    Settings(#[from] SettingsError),

    /// The shared session factory could not be built.
    #[error("failed to build session factory: {0}")]
    Session(#[from] SessionError),
}

/// Process-wide registry holding the shared session factory and the models.
///
/// Built once at startup by [`AppRegistry::configure`]; read-only afterwards.
#[derive(Clone, Debug)]
pub struct AppRegistry {
    factory: SessionFactory,
    models: Arc<ModelRegistry>,
    request_transactions: bool,
}

impl AppRegistry {
    /// Reads the `db.` settings, builds the session factory and stores the
    /// model registry.
    ///
    /// Request sessions are only closed after the response. Setting
    /// `db.request_transactions = true` makes them commit on success and roll
    /// back on error responses instead.
    ///
    /// # Errors
    ///
    /// Returns `WiringError::Settings` for bad settings and
    /// `WiringError::Session` if the database cannot be reached.
    pub fn configure(
        settings: &BTreeMap<String, String>,
        models: ModelRegistry,
    ) -> Result<Self, WiringError> {
        let db_settings = DbSettings::from_settings(settings, DEFAULT_PREFIX)?;

        let tx_key = format!("{DEFAULT_PREFIX}request_transactions");
        let request_transactions = match settings.get(&tx_key) {
            None => false,
            Some(raw) => raw.trim().parse::<bool>().map_err(|_| SettingsError::Invalid {
                key: tx_key.clone(),
                value: raw.clone(),
            })?,
        };

        let factory = SessionFactory::from_settings(&db_settings)?;
        tracing::info!(
            url = %db_settings.url,
            tables = models.len(),
            request_transactions,
            "configured database"
        );

        Ok(Self {
            factory,
            models: Arc::new(models),
            request_transactions,
        })
    }

    /// The shared session factory.
    pub fn factory(&self) -> &SessionFactory {
        &self.factory
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn request_transactions(&self) -> bool {
        self.request_transactions
    }

    /// Creates every registered table that is missing.
    ///
    /// # Errors
    ///
    /// See [`steward_db::create_schema`].
    pub fn create_schema(&self) -> Result<usize, SchemaError> {
        create_schema(&self.factory, &self.models)
    }

    /// Drops every registered table.
    ///
    /// # Errors
    ///
    /// See [`steward_db::drop_schema`].
    pub fn drop_schema(&self) -> Result<usize, SchemaError> {
        drop_schema(&self.factory, &self.models)
    }

    /// A task executor builder using the same database settings. The executor
    /// builds its own factory the first time one of its tasks needs it.
    pub fn task_executor(&self) -> TaskExecutorBuilder {
        TaskExecutor::builder(self.factory.settings().clone())
    }
}
