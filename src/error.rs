use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Failure while touching a record file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("storage task failed: {0}")]
    Task(String),
}

/// Why a profile submission was rejected.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Missing fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Session end year must be after start year.")]
    SessionOrder,
    #[error("Could not write CSV: {0}")]
    Storage(#[from] StoreError),
}

impl SubmitError {
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }

    pub fn status(&self) -> StatusCode {
        if self.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl IntoResponse for SubmitError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: "error",
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
