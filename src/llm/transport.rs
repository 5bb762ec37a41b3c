//! HTTP plumbing shared by the provider adapters.
//!
//! Sends a JSON request and maps every non-success outcome onto an
//! [`OracleErrorKind`] so that the fallback driver can decide whether
//! switching model, retrying, or giving up is appropriate.

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::types::OracleError;

/// Phrases providers use when a model id is unknown or retired.
const MODEL_UNAVAILABLE_MARKERS: &[&str] = &[
    "decommissioned",
    "deprecated",
    "does not exist",
    "not found",
    "no longer supported",
    "not supported",
    "unknown model",
    "invalid model",
    "model_not_found",
];

/// Longest slice of an error body kept in messages.
const MAX_ERROR_BODY: usize = 300;

/// Classify a non-success HTTP response.
pub fn classify_status(status: StatusCode, body: &str) -> OracleError {
    let detail = format!("HTTP {status}: {}", truncate(body.trim(), MAX_ERROR_BODY));

    match status.as_u16() {
        401 | 403 => OracleError::auth(detail),
        429 => OracleError::rate_limited(detail),
        404 => OracleError::model_unavailable(detail),
        400 | 422 if mentions_unavailable_model(body) => OracleError::model_unavailable(detail),
        408 | 504 => OracleError::timeout(detail),
        _ => OracleError::unknown(detail),
    }
}

/// Classify a transport-level failure (no HTTP status available).
pub fn classify_transport(err: &reqwest::Error) -> OracleError {
    if err.is_timeout() {
        OracleError::timeout(format!("Request timed out: {err}"))
    } else {
        OracleError::unknown(format!("Request error: {err}"))
    }
}

fn mentions_unavailable_model(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("model") && MODEL_UNAVAILABLE_MARKERS.iter().any(|m| lower.contains(m))
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Send a request and decode a JSON success body.
pub async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, OracleError> {
    let response = request.send().await.map_err(|e| classify_transport(&e))?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(status, &body));
    }

    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            classify_transport(&e)
        } else {
            OracleError::unknown(format!("Failed to parse provider response: {e}"))
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
