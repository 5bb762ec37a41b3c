//! Multi-model consensus engine.
//!
//! Fans a market question out to every configured oracle client at once,
//! waits for all of them (each under its own timeout), records failures as
//! data rather than errors, and applies the agreement threshold to the
//! votes that came back.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::tally::{decide, Tally};
use crate::config::ConsensusConfig;
use crate::llm::OracleClient;
use crate::types::{
    ConsensusError, ConsensusResult, MarketQuery, OracleErrorKind, Outcome, ResolutionRequest,
    VoteRecord,
};

pub struct ConsensusEngine {
    clients: Vec<Arc<dyn OracleClient>>,
    provider_timeout: Duration,
}

impl ConsensusEngine {
    /// Create an engine over a fixed set of clients. An empty set is
    /// accepted here and rejected per request.
    pub fn new(clients: Vec<Arc<dyn OracleClient>>, provider_timeout: Duration) -> Self {
        Self {
            clients,
            provider_timeout,
        }
    }

    pub fn from_config(clients: Vec<Arc<dyn OracleClient>>, cfg: &ConsensusConfig) -> Self {
        Self::new(clients, cfg.provider_timeout())
    }

    /// Number of configured providers; the agreement denominator.
    pub fn total_models(&self) -> usize {
        self.clients.len()
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.clients.iter().map(|c| c.source_id().to_string()).collect()
    }

    pub fn provider_timeout(&self) -> Duration {
        self.provider_timeout
    }

    /// Resolve a request. See [`ConsensusEngine::get_consensus`].
    pub async fn resolve(
        &self,
        request: &ResolutionRequest,
    ) -> Result<ConsensusResult, ConsensusError> {
        self.get_consensus(
            &request.question,
            request.context.as_deref(),
            request.agreement_threshold,
        )
        .await
    }

    /// Query every provider and decide an outcome.
    ///
    /// Only misconfiguration (no providers) and invalid input produce an
    /// error. Provider failures, including all of them failing, still yield
    /// a result, with outcome INVALID when agreement is insufficient.
    pub async fn get_consensus(
        &self,
        question: &str,
        context: Option<&str>,
        agreement_threshold: f64,
    ) -> Result<ConsensusResult, ConsensusError> {
        if self.clients.is_empty() {
            return Err(ConsensusError::Configuration(
                "no oracle providers configured".into(),
            ));
        }
        if question.trim().is_empty() {
            return Err(ConsensusError::InvalidInput("question must not be empty".into()));
        }
        if !(agreement_threshold > 0.0 && agreement_threshold <= 1.0) {
            return Err(ConsensusError::InvalidInput(format!(
                "agreement threshold must be in (0, 1], got {agreement_threshold}"
            )));
        }

        let request_id = Uuid::new_v4();
        let query = MarketQuery::new(question.trim(), context.map(str::to_string));
        let total_models = self.total_models();

        info!(
            %request_id,
            providers = total_models,
            threshold = agreement_threshold,
            "Requesting oracle consensus"
        );

        let votes = self.collect_votes(&query).await;
        let tally = Tally::from_votes(votes.iter().filter_map(VoteRecord::vote));
        let decision = decide(&tally, total_models, agreement_threshold);

        let result = ConsensusResult {
            outcome: decision.outcome,
            confidence: decision.confidence,
            consensus_count: decision.consensus_count,
            total_models,
            votes,
        };

        info!(
            %request_id,
            outcome = %result.outcome,
            confidence = result.confidence,
            consensus = result.consensus_count,
            responded = tally.responded(),
            total = total_models,
            yes = tally.count(Outcome::Yes),
            no = tally.count(Outcome::No),
            invalid = tally.count(Outcome::Invalid),
            "Consensus computed"
        );

        Ok(result)
    }

    /// Fan out to all clients and wait for every one to finish or fail.
    /// Records come back in configuration order.
    async fn collect_votes(&self, query: &MarketQuery) -> Vec<VoteRecord> {
        let timeout = self.provider_timeout;

        let calls = self.clients.iter().map(|client| async move {
            let source_id = client.source_id().to_string();

            match tokio::time::timeout(timeout, client.analyze_market(query)).await {
                Ok(Ok(vote)) => {
                    debug!(
                        provider = %source_id,
                        source = %vote.source_id,
                        outcome = %vote.outcome,
                        confidence = vote.confidence,
                        "Vote received"
                    );
                    VoteRecord::Succeeded(vote)
                }
                Ok(Err(e)) => {
                    warn!(
                        provider = %source_id,
                        kind = %e.kind,
                        error = %e.message,
                        "Oracle provider failed"
                    );
                    VoteRecord::Failed {
                        source_id,
                        error: e.kind,
                        message: e.message,
                    }
                }
                Err(_) => {
                    warn!(
                        provider = %source_id,
                        timeout_ms = timeout.as_millis() as u64,
                        "Oracle provider timed out"
                    );
                    VoteRecord::Failed {
                        source_id,
                        error: OracleErrorKind::Timeout,
                        message: format!("no response within {timeout:?}"),
                    }
                }
            }
        });

        join_all(calls).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
