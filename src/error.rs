use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

/// AppError
///
/// The failure taxonomy shared by every handler. Infrastructure failures
/// (database, hashing, storage) collapse to a 500 with the detail kept in the
/// logs; the remaining variants map one-to-one onto client-visible outcomes.
#[derive(Debug, Error)]
pub enum AppError {
    /// A record addressed by id does not exist.
    #[error("not found")]
    NotFound,

    /// The operation needs an authenticated identity and none was resolved.
    #[error("login required")]
    Unauthenticated,

    /// Form input rejected by the validation layer. Field errors are
    /// serialized into the response body so clients can render them inline.
    #[error("invalid form input")]
    Validation(#[from] ValidationErrors),

    /// The request itself is malformed (e.g. an archive token with no
    /// extractable year/month groups).
    #[error("{0}")]
    BadRequest(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("password hashing failed")]
    PasswordHash,

    #[error("storage error: {0}")]
    Storage(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::PasswordHash | AppError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match &self {
            AppError::Validation(errors) => json!({
                "error": self.to_string(),
                "fields": errors,
            }),
            // Internal detail stays out of the response body.
            AppError::Database(e) => {
                tracing::error!("database error: {:?}", e);
                json!({ "error": "internal error" })
            }
            AppError::PasswordHash | AppError::Storage(_) => {
                tracing::error!("{}", self);
                json!({ "error": "internal error" })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
