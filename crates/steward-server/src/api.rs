//! API handlers for users.
//!
//! Writes commit their own work, so they persist whether or not request
//! transactions are enabled.

use axum::{
    extract::{Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use steward_db::SessionError;
use steward_model::{JsonError, JsonModel, Jsonable};
use thiserror::Error;

use crate::models::User;
use crate::session::RequestSession;
use crate::users;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) {
            return ApiError::Conflict(e.to_string());
        }
        tracing::error!(error = %e, "database error");
        ApiError::InternalServerError("database error".to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Database(e) => e.into(),
            other => {
                tracing::error!(error = %other, "session error");
                ApiError::InternalServerError("database unavailable".to_string())
            }
        }
    }
}

impl From<JsonError> for ApiError {
    fn from(e: JsonError) -> Self {
        ApiError::Unprocessable(e.to_string())
    }
}

/// Handler for `GET /api/users`.
pub async fn list_users_handler(
    db: RequestSession,
) -> Result<Json<Vec<JsonModel<User>>>, ApiError> {
    let users = db
        .run(|session| Ok::<_, ApiError>(users::list_users(session.connection()?)?))
        .await?;
    Ok(Json(users.into_iter().map(JsonModel).collect()))
}

/// Handler for `POST /api/users`.
pub async fn create_user_handler(
    db: RequestSession,
    Json(payload): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<JsonModel<User>>), ApiError> {
    let user = User::from_json(payload)?;
    let user = db
        .run(move |session| {
            users::insert_user(session.connection()?, &user)?;
            session.commit()?;
            Ok::<_, ApiError>(user)
        })
        .await?;

    tracing::info!(user_id = user.id, "created user");
    Ok((StatusCode::CREATED, Json(JsonModel(user))))
}

/// Handler for `GET /api/users/{id}`.
pub async fn get_user_handler(
    db: RequestSession,
    Path(id): Path<i64>,
) -> Result<Json<JsonModel<User>>, ApiError> {
    let user = db
        .run(move |session| Ok::<_, ApiError>(users::get_user(session.connection()?, id)?))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {id}")))?;
    Ok(Json(JsonModel(user)))
}

/// Handler for `DELETE /api/users/{id}`.
pub async fn delete_user_handler(
    db: RequestSession,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let removed = db
        .run(move |session| {
            let removed = users::delete_user(session.connection()?, id)?;
            session.commit()?;
            Ok::<_, ApiError>(removed)
        })
        .await?;
    if !removed {
        return Err(ApiError::NotFound(format!("user {id}")));
    }
    tracing::info!(user_id = id, "deleted user");
    Ok(StatusCode::NO_CONTENT)
}
