//! Shared types for the consensus oracle.
//!
//! These types form the data model used across all modules: what an
//! oracle client produces (`Vote`), what the engine records per provider
//! (`VoteRecord`), and what the engine hands back (`ConsensusResult`).

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// The semantic answer to a yes/no market question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
    Invalid,
}

impl Outcome {
    /// All outcomes, in tally order.
    pub const ALL: [Outcome; 3] = [Outcome::Yes, Outcome::No, Outcome::Invalid];

    /// Integer encoding expected by the on-chain oracle fulfiller.
    pub fn code(self) -> u8 {
        match self {
            Outcome::Yes => 1,
            Outcome::No => 2,
            Outcome::Invalid => 3,
        }
    }

    /// Whether this is a substantive YES/NO answer.
    pub fn is_decisive(self) -> bool {
        !matches!(self, Outcome::Invalid)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Yes => write!(f, "YES"),
            Outcome::No => write!(f, "NO"),
            Outcome::Invalid => write!(f, "INVALID"),
        }
    }
}

impl std::str::FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "YES" => Ok(Outcome::Yes),
            "NO" => Ok(Outcome::No),
            "INVALID" => Ok(Outcome::Invalid),
            other => anyhow::bail!("Unknown outcome: {other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

/// The question an oracle is asked to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketQuery {
    pub question: String,
    /// Extra context passed verbatim into the prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl MarketQuery {
    pub fn new(question: impl Into<String>, context: Option<String>) -> Self {
        Self {
            question: question.into(),
            context,
        }
    }
}

/// One oracle's opinion on a market question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    /// `provider:model` of the model that actually answered.
    pub source_id: String,
    pub outcome: Outcome,
    /// Static trust weight of the provider, 0–100.
    pub confidence: u8,
    /// Raw model output, kept for diagnostics only.
    pub raw_text: String,
}

/// What the engine recorded for one configured provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum VoteRecord {
    Succeeded(Vote),
    #[serde(rename_all = "camelCase")]
    Failed {
        source_id: String,
        error: OracleErrorKind,
        message: String,
    },
}

impl VoteRecord {
    pub fn source_id(&self) -> &str {
        match self {
            VoteRecord::Succeeded(vote) => &vote.source_id,
            VoteRecord::Failed { source_id, .. } => source_id,
        }
    }

    pub fn vote(&self) -> Option<&Vote> {
        match self {
            VoteRecord::Succeeded(vote) => Some(vote),
            VoteRecord::Failed { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Consensus
// ---------------------------------------------------------------------------

/// Input to a single consensus computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionRequest {
    pub question: String,
    pub context: Option<String>,
    /// Fraction of configured providers that must agree, in (0, 1].
    pub agreement_threshold: f64,
}

/// The engine's decision for one resolution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusResult {
    pub outcome: Outcome,
    /// Rounded mean confidence of the winning votes; 0 when no consensus.
    pub confidence: u8,
    pub consensus_count: usize,
    pub total_models: usize,
    /// One record per configured provider, in configuration order.
    pub votes: Vec<VoteRecord>,
}

impl ConsensusResult {
    /// Number of providers that returned a vote.
    pub fn responded_models(&self) -> usize {
        self.votes.iter().filter(|r| r.vote().is_some()).count()
    }
}

impl fmt::Display for ConsensusResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}% confidence, {}/{} agree, {} responded)",
            self.outcome,
            self.confidence,
            self.consensus_count,
            self.total_models,
            self.responded_models(),
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Classification of a single provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OracleErrorKind {
    AuthError,
    RateLimited,
    ModelUnavailable,
    Timeout,
    Unknown,
}

impl fmt::Display for OracleErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleErrorKind::AuthError => write!(f, "AuthError"),
            OracleErrorKind::RateLimited => write!(f, "RateLimited"),
            OracleErrorKind::ModelUnavailable => write!(f, "ModelUnavailable"),
            OracleErrorKind::Timeout => write!(f, "Timeout"),
            OracleErrorKind::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A failed call to one oracle provider. Never fatal to a consensus run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct OracleError {
    pub kind: OracleErrorKind,
    pub message: String,
}

impl OracleError {
    pub fn new(kind: OracleErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(OracleErrorKind::AuthError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(OracleErrorKind::RateLimited, message)
    }

    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::new(OracleErrorKind::ModelUnavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(OracleErrorKind::Timeout, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(OracleErrorKind::Unknown, message)
    }

    /// Whether the same model is worth asking again. Timeouts are not:
    /// a hung model moves on to the next in the fallback list instead.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, OracleErrorKind::RateLimited | OracleErrorKind::Unknown)
    }
}

/// Errors that cross the consensus core's boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsensusError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid request: {0}")]
    InvalidInput(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
