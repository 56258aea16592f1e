use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::status::RideStatus;

const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Not found")]
    NotFound,
    #[error("Already exists")]
    Conflict,
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => RepositoryError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict,
            _ => RepositoryError::DatabaseError(e.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum UsecaseError {
    #[error("{0}")]
    Validation(String),

    #[error("cannot move ride from {current} to {requested}")]
    InvalidTransition {
        current: RideStatus,
        requested: RideStatus,
    },

    #[error("ride is already {current}, cannot move to {requested}")]
    TerminalState {
        current: RideStatus,
        requested: RideStatus,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl UsecaseError {
    pub fn kind(&self) -> &'static str {
        match self {
            UsecaseError::Validation(_) => "VALIDATION",
            UsecaseError::InvalidTransition { .. } => "INVALID_TRANSITION",
            UsecaseError::TerminalState { .. } => "TERMINAL_STATE",
            UsecaseError::NotFound(_) => "NOT_FOUND",
            UsecaseError::Conflict(_) => "CONFLICT",
            UsecaseError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            UsecaseError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            UsecaseError::Validation(_) => StatusCode::BAD_REQUEST,
            UsecaseError::InvalidTransition { .. } | UsecaseError::TerminalState { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            UsecaseError::NotFound(_) => StatusCode::NOT_FOUND,
            UsecaseError::Conflict(_) => StatusCode::CONFLICT,
            UsecaseError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            UsecaseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to a client.
    pub fn public_message(&self) -> String {
        match self {
            UsecaseError::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<RepositoryError> for UsecaseError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => UsecaseError::NotFound("Resource".to_string()),
            RepositoryError::Conflict => UsecaseError::Conflict("Resource already exists".to_string()),
            RepositoryError::DatabaseError(msg) => UsecaseError::Internal(msg),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub kind: &'static str,
    pub message: String,
}

impl IntoResponse for UsecaseError {
    fn into_response(self) -> axum::response::Response {
        match &self {
            UsecaseError::Internal(_) => {
                tracing::error!(error = %self, "internal error");
            }
            UsecaseError::Unavailable(_) => {
                tracing::warn!(error = %self, "dependency unavailable");
            }
            UsecaseError::NotFound(_) => {
                tracing::warn!(error = %self, "resource not found");
            }
            _ => {
                tracing::debug!(error = %self);
            }
        }

        let body = ErrorResponse {
            kind: self.kind(),
            message: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
