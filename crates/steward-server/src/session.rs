//! Request-scoped database sessions.
//!
//! [`request_session_middleware`] gives every request one [`RequestSession`].
//! Handlers extract it as often as they like; the session itself is only
//! opened when a handler first runs something on it, and every extraction
//! sees the same session. When the handler has produced its response, the
//! middleware finishes the scope exactly once:
//!
//! - by default the session is only closed, discarding uncommitted work;
//! - with `db.request_transactions` enabled, a status below 400 commits and
//!   any other status rolls back.
//!
//! A sub-request that carries its parent's session (see
//! [`RequestSession::attach_to`]) reuses it and leaves finishing to the
//! parent.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json, Router,
};
use steward_db::{ScopeKind, ScopeOutcome, Session, SessionError, SessionScope};

use crate::registry::AppRegistry;

/// The database session of the current request.
#[derive(Clone, Debug)]
pub struct RequestSession {
    scope: Arc<SessionScope>,
}

impl RequestSession {
    fn new(registry: &AppRegistry) -> Self {
        let factory = Arc::new(registry.factory().clone());
        Self {
            scope: Arc::new(SessionScope::new(ScopeKind::Request, factory)),
        }
    }

    /// Runs `f` with the request's session on a blocking thread, opening the
    /// session on first use.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or a `SessionError` (converted into `E`)
    /// if the session cannot be opened, the request has already finished, or
    /// the blocking worker fails.
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

    /// Shares this session with a request dispatched from inside the current
    /// one. The sub-request's handlers see the same session, and only the
    /// outer request finishes it.
    pub fn attach_to<B>(&self, request: &mut axum::http::Request<B>) {
        request.extensions_mut().insert(self.clone());
    }

    /// Whether a handler has opened the session.
    pub fn is_open(&self) -> bool {
        self.scope.is_open()
    }

    async fn finish(&self, outcome: ScopeOutcome) -> Result<bool, SessionError> {
        let scope = Arc::clone(&self.scope);
        tokio::task::spawn_blocking(move || scope.finish(outcome))
            .await
            .map_err(|e| SessionError::Worker(e.to_string()))?
    }
}

/// Rejection used when a handler asks for a session on a route that is not
/// wrapped by [`request_session_middleware`].
#[derive(Debug)]
pub struct MissingSession;

impl IntoResponse for MissingSession {
    fn into_response(self) -> Response {
        tracing::error!("request session requested on a route without the session middleware");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "database session unavailable" })),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for RequestSession
where
    S: Send + Sync,
{
    type Rejection = MissingSession;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestSession>()
            .cloned()
            .ok_or(MissingSession)
    }
}

/// Installs a [`RequestSession`] for the request and finishes it after the
/// handler has responded.
pub async fn request_session_middleware(
    State(registry): State<AppRegistry>,
    mut req: Request,
    next: Next,
) -> Response {
    if req.extensions().get::<RequestSession>().is_some() {
        // Sub-request: the parent owns the session.
        return next.run(req).await;
    }

    let session = RequestSession::new(&registry);
    req.extensions_mut().insert(session.clone());

    let response = next.run(req).await;

    let outcome = if !registry.request_transactions() {
        ScopeOutcome::Close
    } else if response.status().as_u16() < 400 {
        ScopeOutcome::Commit
    } else {
        ScopeOutcome::Rollback
    };

    match session.finish(outcome).await {
        Ok(_) => response,
        Err(e) => {
            tracing::error!(
                outcome = outcome.as_str(),
                error = %e,
                "failed to finish request session"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "failed to finish database session" })),
            )
                .into_response()
        }
    }
}

/// Wraps every route of `router` with the request-session middleware.
pub fn with_request_sessions(router: Router, registry: AppRegistry) -> Router {
    router.layer(axum::middleware::from_fn_with_state(
        registry,
        request_session_middleware,
    ))
}
