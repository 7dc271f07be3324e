//! Sessions bound to a single unit of work.
//!
//! A [`SessionScope`] is created when a request or task starts. The first
//! caller that needs the database opens the session; every later caller in
//! the same unit of work gets that same session. The owner ends the scope
//! with [`SessionScope::finish`], which runs the chosen outcome and closes
//! the session exactly once. A scope that is dropped unfinished (an error
//! unwound past it, a panic, or a cancelled future) rolls back and closes.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::OnceCell;

use crate::error::SessionError;
use crate::session::{Session, SessionFactory};
use crate::settings::DbSettings;

/// Anything that can open a new [`Session`].
pub trait SessionSource: Send + Sync {
    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Returns whatever error prevented the connection from being established.
    fn open_session(&self) -> Result<Session, SessionError>;
}

impl SessionSource for SessionFactory {
    fn open_session(&self) -> Result<Session, SessionError> {
        self.session()
    }
}

/// A factory built on first use from stored settings.
///
/// Background executors hold one of these so that the pool is only created
/// once a task actually touches the database, and then reused by every later
/// task of the same executor.
pub struct LazySessionFactory {
    settings: DbSettings,
    factory: OnceCell<SessionFactory>,
}

impl LazySessionFactory {
    pub fn new(settings: DbSettings) -> Self {
        Self {
            settings,
            factory: OnceCell::new(),
        }
    }

    /// The factory, building it if this is the first call.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Pool` if the pool cannot be built. A failed
    /// build is retried on the next call.
    pub fn factory(&self) -> Result<&SessionFactory, SessionError> {
        self.factory.get_or_try_init(|| {
            tracing::info!(url = %self.settings.url, "building lazy session factory");
            SessionFactory::from_settings(&self.settings)
        })
    }

    /// The factory if it has been built already.
    pub fn get(&self) -> Option<&SessionFactory> {
        self.factory.get()
    }

    pub fn settings(&self) -> &DbSettings {
        &self.settings
    }
}

impl SessionSource for LazySessionFactory {
    fn open_session(&self) -> Result<Session, SessionError> {
        self.factory()?.session()
    }
}

/// What kind of unit of work a scope belongs to. Used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Request,
    Task,
}

impl ScopeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Task => "task",
        }
    }
}

/// How a scope ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeOutcome {
    /// Commit, then close.
    Commit,
    /// Roll back, then close.
    Rollback,
    /// Close only; any open transaction is discarded without counting as a
    /// rollback.
    Close,
}

impl ScopeOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::Close => "close",
        }
    }
}

enum Slot {
    Idle,
    Open(Session),
    Finished,
}

/// At most one lazily-opened session for one unit of work.
pub struct SessionScope {
    kind: ScopeKind,
    source: Arc<dyn SessionSource>,
    slot: Mutex<Slot>,
}

impl fmt::Debug for SessionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.lock() {
            Slot::Idle => "idle",
            Slot::Open(_) => "open",
            Slot::Finished => "finished",
        };
        f.debug_struct("SessionScope")
            .field("kind", &self.kind)
            .field("state", &state)
            .finish()
    }
}

impl SessionScope {
    pub fn new(kind: ScopeKind, source: Arc<dyn SessionSource>) -> Self {
        Self {
            kind,
            source,
            slot: Mutex::new(Slot::Idle),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Runs `f` with the scope's session, opening it on first use.
    ///
    /// This blocks on the database; async callers should run it on a
    /// blocking thread.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ScopeFinished` (converted into `E`) after
    /// [`SessionScope::finish`], any error from opening the session, or
    /// whatever `f` returns.
    pub fn with_session<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Session) -> Result<T, E>,
        E: From<SessionError>,
    {
        let mut slot = self.lock();
        if let Slot::Idle = *slot {
            let session = self.source.open_session()?;
            tracing::debug!(
                scope = self.kind.as_str(),
                session_id = session.id(),
                "opened scoped session"
            );
            *slot = Slot::Open(session);
        }
        match &mut *slot {
            Slot::Open(session) => f(session),
            Slot::Idle | Slot::Finished => Err(SessionError::ScopeFinished.into()),
        }
    }

    /// Whether a session has been opened and not yet finished.
    pub fn is_open(&self) -> bool {
        matches!(*self.lock(), Slot::Open(_))
    }

    /// Whether [`SessionScope::finish`] has run.
    pub fn is_finished(&self) -> bool {
        matches!(*self.lock(), Slot::Finished)
    }

    /// Ends the scope with `outcome` and closes its session.
    ///
    /// Returns `Ok(false)` when no session was ever opened (nothing runs) or
    /// the scope was already finished, and `Ok(true)` when the outcome ran.
    /// The session is closed even when the outcome itself fails.
    ///
    /// # Errors
    ///
    /// Returns the first failure among the outcome and the close.
    pub fn finish(&self, outcome: ScopeOutcome) -> Result<bool, SessionError> {
        let previous = std::mem::replace(&mut *self.lock(), Slot::Finished);
        let mut session = match previous {
            Slot::Open(session) => session,
            Slot::Idle | Slot::Finished => return Ok(false),
        };

        let session_id = session.id();
        let result = match outcome {
            ScopeOutcome::Commit => session.commit(),
            ScopeOutcome::Rollback => session.rollback(),
            ScopeOutcome::Close => Ok(()),
        };
        let closed = session.close();

        match (&result, &closed) {
            (Ok(()), Ok(())) => tracing::debug!(
                scope = self.kind.as_str(),
                session_id,
                outcome = outcome.as_str(),
                "finished scoped session"
            ),
            _ => tracing::error!(
                scope = self.kind.as_str(),
                session_id,
                outcome = outcome.as_str(),
                "scoped session did not finish cleanly"
            ),
        }

        result.and(closed).map(|()| true)
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // A panic while holding the slot leaves a session that is
                // still safe to roll back and close.
                tracing::error!(scope = self.kind.as_str(), "session scope lock poisoned");
                poisoned.into_inner()
            }
        }
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        let open = match self.slot.get_mut() {
            Ok(slot) => matches!(slot, Slot::Open(_)),
            Err(poisoned) => matches!(poisoned.into_inner(), Slot::Open(_)),
        };
        if open {
            tracing::warn!(
                scope = self.kind.as_str(),
                "session scope dropped before finish, rolling back"
            );
            if let Err(e) = self.finish(ScopeOutcome::Rollback) {
                tracing::error!(scope = self.kind.as_str(), error = %e, "rollback on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::SessionStats;

    fn factory() -> (tempfile::TempDir, SessionFactory) {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("scope.db");
        let settings = DbSettings {
            pool_max_size: 2,
            ..DbSettings::new(path.to_string_lossy().into_owned())
        };
        let factory = SessionFactory::from_settings(&settings).expect("factory should build");
        (dir, factory)
    }

    #[test]
    fn repeated_access_reuses_one_session() {
        let (_dir, factory) = factory();
        let scope = SessionScope::new(ScopeKind::Request, Arc::new(factory.clone()));

        let first = scope
            .with_session(|s| Ok::<_, SessionError>(s.id()))
            .expect("first access");
        let second = scope
            .with_session(|s| Ok::<_, SessionError>(s.id()))
            .expect("second access");
        assert_eq!(first, second);

        assert!(scope.finish(ScopeOutcome::Close).expect("finish"));
        let stats = factory.stats();
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.closed, 1);
    }

    #[test]
    fn finish_without_access_does_nothing() {
        let (_dir, factory) = factory();
        let scope = SessionScope::new(ScopeKind::Task, Arc::new(factory.clone()));
        assert!(!scope.finish(ScopeOutcome::Commit).expect("finish"));
        assert_eq!(factory.stats(), SessionStats::default());
    }

    #[test]
    fn finish_runs_once() {
        let (_dir, factory) = factory();
        let scope = SessionScope::new(ScopeKind::Task, Arc::new(factory.clone()));
        scope
            .with_session(|s| s.connection().map(|_| ()))
            .expect("access");

        assert!(scope.finish(ScopeOutcome::Rollback).expect("first finish"));
        assert!(!scope.finish(ScopeOutcome::Commit).expect("second finish"));

        let stats = factory.stats();
        assert_eq!(stats.rollbacks, 1);
        assert_eq!(stats.commits, 0);
        assert_eq!(stats.closed, 1);
    }

    #[test]
    fn access_after_finish_fails() {
        let (_dir, factory) = factory();
        let scope = SessionScope::new(ScopeKind::Request, Arc::new(factory));
        scope.finish(ScopeOutcome::Close).expect("finish");
        let err = scope
            .with_session(|s| Ok::<_, SessionError>(s.id()))
            .expect_err("finished scope should refuse access");
        assert!(matches!(err, SessionError::ScopeFinished));
    }

    #[test]
    fn dropped_scope_rolls_back() {
        let (_dir, factory) = factory();
        {
            let scope = SessionScope::new(ScopeKind::Task, Arc::new(factory.clone()));
            scope
                .with_session(|s| s.connection().map(|_| ()))
                .expect("access");
        }
        let stats = factory.stats();
        assert_eq!(stats.rollbacks, 1);
        assert_eq!(stats.closed, 1);
    }

    struct CountingSource {
        factory: SessionFactory,
        calls: AtomicUsize,
    }

    impl SessionSource for CountingSource {
        fn open_session(&self) -> Result<Session, SessionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.factory.session()
        }
    }

    #[test]
    fn source_is_consulted_once_per_scope() {
        let (_dir, factory) = factory();
        let source = Arc::new(CountingSource {
            factory,
            calls: AtomicUsize::new(0),
        });
        let scope = SessionScope::new(ScopeKind::Request, source.clone());
        for _ in 0..3 {
            scope
                .with_session(|_| Ok::<_, SessionError>(()))
                .expect("access");
        }
        scope.finish(ScopeOutcome::Close).expect("finish");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lazy_factory_builds_once() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("lazy.db");
        let lazy = LazySessionFactory::new(DbSettings {
            pool_max_size: 1,
            ..DbSettings::new(path.to_string_lossy().into_owned())
        });
        assert!(lazy.get().is_none());

        let first = lazy.open_session().expect("first session");
        first.close().expect("close");
        let second = lazy.open_session().expect("second session");
        second.close().expect("close");

        let stats = lazy.get().expect("factory should exist").stats();
        assert_eq!(stats.opened, 2, "both sessions come from the same factory");
    }

    #[test]
    fn lazy_factory_propagates_connection_failure() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let missing = dir.path().join("missing").join("lazy.db");
        let lazy = LazySessionFactory::new(DbSettings {
            pool_max_size: 1,
            connection_timeout_ms: 200,
            ..DbSettings::new(missing.to_string_lossy().into_owned())
        });
        let err = lazy.open_session().expect_err("missing directory should fail");
        assert!(matches!(err, SessionError::Pool(_)));
        assert!(lazy.get().is_none());
    }
}
