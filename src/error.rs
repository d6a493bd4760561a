//! Unified application error and its HTTP rendering.
//!
//! Every handler returns `Result<_, AppError>`; the [`IntoResponse`]
//! impl is the single place where an error becomes a JSON response.
//! Operational errors (bad input, missing documents, duplicates) keep
//! their message in production; everything else collapses to a generic
//! 500 there. In development the body also carries a debug `error`
//! field.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::Environment;

#[derive(Debug, Error)]
pub enum AppError {
    /// A path parameter could not be parsed as a document id.
    #[error("Invalid {path}: {value}")]
    Cast { path: String, value: String },

    #[error("No tour found with that ID")]
    TourNotFound,

    #[error("Duplicate fields: {0}. Please use another value")]
    DuplicateField(String),

    /// Per-field validation messages, joined for the response body.
    #[error("Invalid input data: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("{0}")]
    BadRequest(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(mongodb::error::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Cast { .. } | AppError::TourNotFound => StatusCode::NOT_FOUND,
            AppError::DuplicateField(_) | AppError::Validation(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Config(_) | AppError::Parse(_) | AppError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Expected, user-facing errors. Anything else is a bug or an
    /// infrastructure failure and gets masked in production.
    pub fn is_operational(&self) -> bool {
        !matches!(
            self,
            AppError::Config(_) | AppError::Parse(_) | AppError::Database(_)
        )
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};

        if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = err.kind.as_ref() {
            if write_error.code == 11000 {
                return AppError::DuplicateField(duplicate_value(&write_error.message));
            }
        }
        AppError::Database(err)
    }
}

/// Pull the offending key/value out of a duplicate-key error message, e.g.
/// `E11000 duplicate key error collection: tours.tours index: name_1
/// dup key: { name: "The Forest Hiker" }`.
fn duplicate_value(message: &str) -> String {
    message
        .split_once("dup key:")
        .map(|(_, rest)| {
            rest.trim()
                .trim_start_matches('{')
                .trim_end_matches('}')
                .trim()
                .to_string()
        })
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn status_label(status: StatusCode) -> &'static str {
    if status.is_client_error() {
        "Fail"
    } else {
        "Error"
    }
}

fn render(error: &AppError, development: bool) -> (StatusCode, Value) {
    let status = error.status_code();

    if development {
        let body = json!({
            "status": status_label(status),
            "message": error.to_string(),
            "error": format!("{:?}", error),
        });
        return (status, body);
    }

    if error.is_operational() {
        let body = json!({
            "status": status_label(status),
            "message": error.to_string(),
        });
        (status, body)
    } else {
        let body = json!({
            "status": "Error",
            "message": "Something is wrong!",
        });
        (StatusCode::INTERNAL_SERVER_ERROR, body)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if !self.is_operational() {
            tracing::error!("unexpected error: {:?}", self);
        }
        let (status, body) = render(&self, Environment::current().is_development());
        (status, Json(body)).into_response()
    }
}
