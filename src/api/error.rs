//! API error responses: `{ "error": ..., "details": ... }`.
//!
//! Only configuration and input problems become non-2xx responses.
//! "No consensus reached" is a normal INVALID result, never an error.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::types::ConsensusError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{error}")]
    BadRequest {
        error: String,
        details: Option<String>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ApiError {
    pub fn bad_request(error: impl Into<String>) -> Self {
        ApiError::BadRequest {
            error: error.into(),
            details: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<ConsensusError> for ApiError {
    fn from(e: ConsensusError) -> Self {
        match e {
            ConsensusError::Configuration(msg) => ApiError::Configuration(msg),
            ConsensusError::InvalidInput(msg) => ApiError::BadRequest {
                error: "Invalid request".into(),
                details: Some(msg),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest {
            error: "Malformed request body".into(),
            details: Some(rejection.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest { error, details } => {
                (StatusCode::BAD_REQUEST, ErrorBody { error, details })
            }
            ApiError::Configuration(msg) => {
                tracing::error!(error = %msg, "Resolution rejected: misconfiguration");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "Oracle misconfigured".into(),
                        details: Some(msg),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
