//! Model fallback and transient-retry drivers.
//!
//! Every provider walks its ordered model list the same way:
//! - `AuthError` stops immediately (another model will not fix a bad key),
//! - `ModelUnavailable` moves straight on to the next model,
//! - anything else is retried briefly on the same model, then the next
//!   model is tried, and the last error surfaces once the list is exhausted.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::prompt::{build_prompt, vote_from_text};
use super::ProviderSettings;
use crate::types::{MarketQuery, OracleError, OracleErrorKind, Vote};

/// Base delay for exponential backoff (ms).
pub const BASE_BACKOFF_MS: u64 = 500;

/// Run `call` against each model in order until one succeeds.
///
/// Returns the model that answered alongside its result.
pub async fn run_with_fallback<T, F, Fut>(
    provider: &str,
    models: &[String],
    mut call: F,
) -> Result<(String, T), OracleError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, OracleError>>,
{
    let mut last_error = None;

    for (idx, model) in models.iter().enumerate() {
        match call(model.clone()).await {
            Ok(value) => {
                if idx > 0 {
                    info!(provider, model = %model, attempt = idx + 1, "Fallback model answered");
                }
                return Ok((model.clone(), value));
            }
            Err(e) if e.kind == OracleErrorKind::AuthError => {
                warn!(
                    provider,
                    model = %model,
                    error = %e,
                    "Authentication failed, not trying other models"
                );
                return Err(e);
            }
            Err(e) => {
                warn!(
                    provider,
                    model = %model,
                    error = %e,
                    remaining = models.len() - idx - 1,
                    "Model failed, falling back"
                );
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        OracleError::model_unavailable(format!("{provider}: no models configured"))
    }))
}

/// Retry rate limits and unclassified errors on the same model with
/// exponential backoff. Timeouts are not retried; the engine's own
/// deadline would cut them short anyway.
pub async fn with_retries<T, F, Fut>(
    provider: &str,
    model: &str,
    max_retries: u32,
    mut attempt: F,
) -> Result<T, OracleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OracleError>>,
{
    let mut last_error = None;

    for n in 0..=max_retries {
        if n > 0 {
            let delay = BASE_BACKOFF_MS * 2u64.pow(n - 1);
            debug!(provider, model, attempt = n, delay_ms = delay, "Retrying provider call");
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                warn!(provider, model, attempt = n, error = %e, "Retryable provider error");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| OracleError::unknown("no attempts made")))
}

/// Ask a provider for a vote: build the prompt, walk the model list with
/// retries through `send_once(model, prompt)`, and parse the first answer.
pub async fn vote_with_fallback<F, Fut>(
    provider: &str,
    settings: &ProviderSettings,
    query: &MarketQuery,
    send_once: F,
) -> Result<Vote, OracleError>
where
    F: Fn(String, String) -> Fut,
    Fut: Future<Output = Result<String, OracleError>>,
{
    let prompt = build_prompt(query);
    let prompt = &prompt;
    let send_once = &send_once;

    let (model, text) = run_with_fallback(provider, &settings.models, |model| async move {
        with_retries(provider, &model, settings.max_retries, || {
            send_once(model.clone(), prompt.clone())
        })
        .await
    })
    .await?;

    debug!(provider, model = %model, answer = %text.trim(), "Provider answered");

    Ok(vote_from_text(
        format!("{provider}:{model}"),
        &text,
        settings.confidence,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
