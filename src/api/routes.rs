//! Resolution API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`.

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use crate::engine::ConsensusEngine;
use crate::types::{ConsensusResult, Outcome, ResolutionRequest, VoteRecord};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub engine: ConsensusEngine,
    /// Used when a request does not specify its own threshold.
    pub default_threshold: f64,
}

impl ApiState {
    pub fn new(engine: ConsensusEngine, default_threshold: f64) -> Self {
        Self {
            engine,
            default_threshold,
        }
    }
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    #[serde(default)]
    pub market_description: Option<String>,
    #[serde(default)]
    pub price_id: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub agreement_threshold: Option<f64>,
}

impl ResolveRequest {
    /// Validate and turn into an engine request.
    pub fn into_resolution(self, default_threshold: f64) -> Result<ResolutionRequest, ApiError> {
        let question = self
            .market_description
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing market description"))?;

        let context = self.context.filter(|c| !c.trim().is_empty()).or_else(|| {
            self.price_id
                .filter(|id| !id.trim().is_empty())
                .map(|id| format!("Price feed id: {}", id.trim()))
        });

        Ok(ResolutionRequest {
            question,
            context,
            agreement_threshold: self.agreement_threshold.unwrap_or(default_threshold),
        })
    }
}

/// Wire format consumed by the on-chain oracle fulfiller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    /// 1 = YES, 2 = NO, 3 = INVALID.
    pub outcome: u8,
    pub outcome_label: Outcome,
    pub confidence: u8,
    pub consensus_count: usize,
    pub total_models: usize,
    pub responded_models: usize,
    pub votes: Vec<VoteRecord>,
    /// Unix seconds.
    pub timestamp: i64,
}

impl ResolveResponse {
    pub fn from_result(result: ConsensusResult, timestamp: i64) -> Self {
        Self {
            outcome: result.outcome.code(),
            outcome_label: result.outcome,
            confidence: result.confidence,
            consensus_count: result.consensus_count,
            total_models: result.total_models,
            responded_models: result.responded_models(),
            votes: result.votes,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersResponse {
    pub providers: Vec<String>,
    pub total_models: usize,
    pub agreement_threshold: f64,
    pub provider_timeout_secs: u64,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// POST /api/resolve
pub async fn resolve(
    State(state): State<AppState>,
    payload: Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let Json(body) = payload?;
    let request = body.into_resolution(state.default_threshold)?;

    info!(
        question = %request.question,
        has_context = request.context.is_some(),
        threshold = request.agreement_threshold,
        "Resolution requested"
    );

    let result = state.engine.resolve(&request).await?;
    Ok(Json(ResolveResponse::from_result(
        result,
        chrono::Utc::now().timestamp(),
    )))
}

/// GET /api/providers
pub async fn get_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: state.engine.source_ids(),
        total_models: state.engine.total_models(),
        agreement_threshold: state.default_threshold,
        provider_timeout_secs: state.engine.provider_timeout().as_secs(),
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
