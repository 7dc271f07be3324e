//! Sessions and the factory that produces them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::error::SessionError;
use crate::pool::{create_pool, DbPool};
use crate::settings::DbSettings;

#[derive(Debug, Default)]
struct Counters {
    next_id: AtomicU64,
    opened: AtomicU64,
    closed: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

/// Snapshot of session lifecycle counters for one factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    /// Sessions handed out.
    pub opened: u64,
    /// Sessions closed (explicitly or on drop).
    pub closed: u64,
    /// Explicit commits.
    pub commits: u64,
    /// Explicit rollbacks.
    pub rollbacks: u64,
}

/// Produces [`Session`]s bound to one connection pool.
///
/// Cloning is cheap; clones share the pool and the counters.
#[derive(Clone)]
pub struct SessionFactory {
    pool: DbPool,
    settings: Arc<DbSettings>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("url", &self.settings.url)
            .field("stats", &self.stats())
            .finish()
    }
}

impl SessionFactory {
    /// Builds the pool described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Pool` if the pool cannot open its connections.
    pub fn from_settings(settings: &DbSettings) -> Result<Self, SessionError> {
        let pool = create_pool(settings)?;
        Ok(Self::with_pool(pool, settings.clone()))
    }

    /// Wraps an existing pool.
    pub fn with_pool(pool: DbPool, settings: DbSettings) -> Self {
        Self {
            pool,
            settings: Arc::new(settings),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Opens a new session on a pooled connection.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Connect` if no connection becomes available
    /// within the configured connection timeout.
    pub fn session(&self) -> Result<Session, SessionError> {
        let conn = self.pool.get()?;
        let id = self.counters.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.counters.opened.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(session_id = id, "opened session");
        Ok(Session {
            id,
            conn,
            in_transaction: false,
            closed: false,
            counters: Arc::clone(&self.counters),
        })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// The settings the pool was built from.
    pub fn settings(&self) -> &DbSettings {
        &self.settings
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            opened: self.counters.opened.load(Ordering::Relaxed),
            closed: self.counters.closed.load(Ordering::Relaxed),
            commits: self.counters.commits.load(Ordering::Relaxed),
            rollbacks: self.counters.rollbacks.load(Ordering::Relaxed),
        }
    }
}

/// A unit of work on one pooled connection.
///
/// A transaction begins on the first [`Session::connection`] call and stays
/// open until [`Session::commit`], [`Session::rollback`] or
/// [`Session::close`]. Dropping an unclosed session discards its transaction
/// and returns the connection to the pool.
pub struct Session {
    id: u64,
    conn: PooledConnection<SqliteConnectionManager>,
    in_transaction: bool,
    closed: bool,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl Session {
    /// Identifier unique within the factory that opened this session.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether a transaction is currently open.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// The session's connection, beginning a transaction if none is open.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Database` if `BEGIN` fails.
    pub fn connection(&mut self) -> Result<&Connection, SessionError> {
        if !self.in_transaction {
            self.conn.execute_batch("BEGIN")?;
            self.in_transaction = true;
        }
        Ok(&*self.conn)
    }

    /// Commits the open transaction, if any.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Database` if `COMMIT` fails; the transaction is
    /// then still open and should be rolled back.
    pub fn commit(&mut self) -> Result<(), SessionError> {
        self.counters.commits.fetch_add(1, Ordering::Relaxed);
        if self.in_transaction {
            self.conn.execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        tracing::debug!(session_id = self.id, "committed session");
        Ok(())
    }

    /// Rolls back the open transaction, if any.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Database` if `ROLLBACK` fails.
    pub fn rollback(&mut self) -> Result<(), SessionError> {
        self.counters.rollbacks.fetch_add(1, Ordering::Relaxed);
        self.discard()?;
        tracing::debug!(session_id = self.id, "rolled back session");
        Ok(())
    }

    /// Discards any open transaction and returns the connection to the pool.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Database` if discarding the transaction fails.
    /// The session counts as closed either way.
    pub fn close(mut self) -> Result<(), SessionError> {
        self.closed = true;
        self.counters.closed.fetch_add(1, Ordering::Relaxed);
        let result = self.discard();
        tracing::debug!(session_id = self.id, "closed session");
        result
    }

    fn discard(&mut self) -> Result<(), SessionError> {
        if self.in_transaction {
            // Leave the flag set on failure so a later close retries.
            self.conn.execute_batch("ROLLBACK")?;
            self.in_transaction = false;
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.counters.closed.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.discard() {
            tracing::warn!(session_id = self.id, error = %e, "failed to discard dropped session");
        } else {
            tracing::warn!(session_id = self.id, "session dropped without close");
        }
    }
}
