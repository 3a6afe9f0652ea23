use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::pages;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Session encoding error: {0}")]
    SessionEncoding(#[from] serde_json::Error),

    #[error("Not found")]
    NotFound,

    #[error("CSRF token mismatch")]
    CsrfMismatch,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email address already in use")]
    DuplicateEmail,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                pages::client_error(StatusCode::NOT_FOUND),
            ),
            AppError::CsrfMismatch => (
                StatusCode::FORBIDDEN,
                pages::client_error(StatusCode::FORBIDDEN),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                pages::client_error(StatusCode::UNAUTHORIZED),
            ),
            AppError::DuplicateEmail => (
                StatusCode::UNPROCESSABLE_ENTITY,
                pages::client_error(StatusCode::UNPROCESSABLE_ENTITY),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, server_error_body(&self))
            }
            AppError::Hash(e) => {
                tracing::error!("Password hashing error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, server_error_body(&self))
            }
            AppError::SessionEncoding(e) => {
                tracing::error!("Session encoding error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, server_error_body(&self))
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, server_error_body(&self))
            }
        };

        (status, Html(body)).into_response()
    }
}

// Error detail is only rendered in debug builds; release builds always show
// the generic failure page.
fn server_error_body(err: &AppError) -> String {
    if cfg!(debug_assertions) {
        pages::server_error(Some(&err.to_string()))
    } else {
        pages::server_error(None)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
