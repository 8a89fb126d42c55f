// Error types shared by the repositories and the HTTP layer

use thiserror::Error;

/// Application error, mapped onto an HTTP status by the API layer
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    /// The credentials error every failed bearer check collapses to
    pub fn credentials() -> Self {
        AppError::Unauthorized("Could not validate credentials".to_string())
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Unauthorized(_) => 401,
            AppError::Forbidden(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::Validation(_) => 422,
            AppError::Database(_) | AppError::Internal(_) => 500,
        }
    }

    /// Message safe to return to a client
    pub fn detail(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{}: {}", field, msg),
                    None => format!("{}: invalid value", field),
                })
            })
            .collect();
        messages.sort();
        AppError::Validation(messages)
    }
}

#[cfg(feature = "server")]
mod http {
    use super::AppError;
    use axum::{
        http::{header, StatusCode},
        response::{IntoResponse, Response},
        Json,
    };
    use serde_json::json;

    impl IntoResponse for AppError {
        fn into_response(self) -> Response {
            let status =
                StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

            match &self {
                AppError::Database(e) => tracing::error!(error = %e, "database error"),
                AppError::Internal(e) => tracing::error!(error = ?e, "internal error"),
                AppError::Unauthorized(msg) => tracing::warn!(%msg, "unauthorized request"),
                _ => {}
            }

            let body = match &self {
                AppError::Validation(errors) => json!({ "detail": errors }),
                other => json!({ "detail": other.detail() }),
            };

            let mut response = (status, Json(body)).into_response();
            if status == StatusCode::UNAUTHORIZED {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static("Bearer"));
            }
            response
        }
    }
}
