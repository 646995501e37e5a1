use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::validate::ValidationErrors;

/// Application error type. `Validation` and `Client` are the expected kinds
/// and carry their own HTTP status; everything else collapses to a generic
/// 500 in `into_response`, which is the single place responses are shaped.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid input")]
    Validation(ValidationErrors),
    #[error("{message}")]
    Client { status: StatusCode, message: String },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Template(#[from] askama::Error),
    #[error(transparent)]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error(transparent)]
    Mail(#[from] lettre::error::Error),
    #[error(transparent)]
    Address(#[from] lettre::address::AddressError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Client {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Client {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Client {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "statusCode": 400,
                    "error": "ValidationError",
                    "message": "Invalid input",
                    "details": errors,
                })),
            )
                .into_response(),
            AppError::Client { status, message } => (
                status,
                Json(json!({
                    "statusCode": status.as_u16(),
                    "error": "ClientError",
                    "message": message,
                })),
            )
                .into_response(),
            other => {
                error!("internal server error: {other:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "statusCode": 500,
                        "error": "InternalServerError",
                        "message": "Something went wrong on the server",
                    })),
                )
                    .into_response()
            }
        }
    }
}
