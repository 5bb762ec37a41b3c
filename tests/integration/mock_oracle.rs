//! Scripted oracle client for integration testing.
//!
//! Deterministic `OracleClient` that answers with a fixed vote, raw text
//! or error, optionally after a delay, and records whether each call ran
//! to completion. No network access.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use oracle_consensus::llm::prompt::vote_from_text;
use oracle_consensus::llm::OracleClient;
use oracle_consensus::types::{MarketQuery, OracleError, Outcome, Vote};

#[derive(Debug, Clone)]
enum Script {
    Vote(Outcome, u8),
    Text(String, u8),
    Fail(OracleError),
    Hang,
}

pub struct ScriptedOracle {
    name: String,
    script: Script,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    completed: Arc<AtomicBool>,
}

impl ScriptedOracle {
    fn new(name: &str, script: Script) -> Self {
        Self {
            name: name.to_string(),
            script,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Always votes `outcome` with `confidence`.
    pub fn voting(name: &str, outcome: Outcome, confidence: u8) -> Self {
        Self::new(name, Script::Vote(outcome, confidence))
    }

    /// Answers with raw model text, parsed like a real provider.
    pub fn answering(name: &str, text: &str, confidence: u8) -> Self {
        Self::new(name, Script::Text(text.to_string(), confidence))
    }

    pub fn failing(name: &str, err: OracleError) -> Self {
        Self::new(name, Script::Fail(err))
    }

    /// Never answers.
    pub fn hanging(name: &str) -> Self {
        Self::new(name, Script::Hang)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared counter of calls started.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Shared flag set once a call returns.
    pub fn completed(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.completed)
    }

    pub fn boxed(self) -> Arc<dyn OracleClient> {
        Arc::new(self)
    }
}

#[async_trait]
impl OracleClient for ScriptedOracle {
    async fn analyze_market(&self, _query: &MarketQuery) -> Result<Vote, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = match &self.script {
            Script::Vote(outcome, confidence) => Ok(Vote {
                source_id: format!("{}:scripted", self.name),
                outcome: *outcome,
                confidence: *confidence,
                raw_text: outcome.to_string(),
            }),
            Script::Text(text, confidence) => Ok(vote_from_text(
                format!("{}:scripted", self.name),
                text,
                *confidence,
            )),
            Script::Fail(err) => Err(err.clone()),
            Script::Hang => std::future::pending().await,
        };

        self.completed.store(true, Ordering::SeqCst);
        result
    }

    fn source_id(&self) -> &str {
        &self.name
    }
}
