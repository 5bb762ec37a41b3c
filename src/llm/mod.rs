//! LLM oracle clients.
//!
//! Defines the `OracleClient` trait and provides implementations for the
//! three wire formats in use: OpenAI-compatible chat completions (Groq,
//! OpenAI, xAI, OpenRouter, CometAPI), Anthropic Messages and Gemini.

pub mod anthropic;
pub mod fallback;
pub mod gemini;
pub mod openai;
pub mod prompt;
pub mod transport;

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{AppConfig, ProviderConfig};
use crate::types::{MarketQuery, OracleError, Vote};

/// Abstraction over LLM oracle voters.
///
/// Implementors ask one provider's model (falling back through its model
/// list) to resolve a market question and translate the answer into a
/// [`Vote`]. Provider-specific response shapes never leak past this trait.
#[async_trait]
pub trait OracleClient: Send + Sync {
    /// Ask the provider to resolve `query` into a single vote.
    async fn analyze_market(&self, query: &MarketQuery) -> Result<Vote, OracleError>;

    /// Provider identifier used for failure records and logging.
    fn source_id(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Provider catalogue
// ---------------------------------------------------------------------------

/// Request/response format spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    OpenAiChat,
    AnthropicMessages,
    GeminiGenerate,
}

/// Supported oracle providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Groq,
    OpenAi,
    Anthropic,
    Xai,
    Gemini,
    OpenRouter,
    CometApi,
}

impl ProviderKind {
    pub const ALL: &'static [ProviderKind] = &[
        ProviderKind::Groq,
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Xai,
        ProviderKind::Gemini,
        ProviderKind::OpenRouter,
        ProviderKind::CometApi,
    ];

    pub fn api_format(self) -> ApiFormat {
        match self {
            ProviderKind::Anthropic => ApiFormat::AnthropicMessages,
            ProviderKind::Gemini => ApiFormat::GeminiGenerate,
            _ => ApiFormat::OpenAiChat,
        }
    }

    /// Endpoint used when the config does not override `base_url`.
    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::Groq => "https://api.groq.com/openai/v1/chat/completions",
            ProviderKind::OpenAi => "https://api.openai.com/v1/chat/completions",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1/messages",
            ProviderKind::Xai => "https://api.x.ai/v1/chat/completions",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
            ProviderKind::CometApi => "https://api.cometapi.com/v1/chat/completions",
        }
    }

    /// Ordered model fallback list, most preferred first.
    pub fn default_models(self) -> &'static [&'static str] {
        match self {
            ProviderKind::Groq => &["llama-3.3-70b-versatile", "llama-3.1-8b-instant"],
            ProviderKind::OpenAi => &["gpt-4o-mini", "gpt-4o"],
            ProviderKind::Anthropic => &["claude-sonnet-4-20250514", "claude-3-5-haiku-20241022"],
            ProviderKind::Xai => &["grok-3-mini", "grok-beta"],
            ProviderKind::Gemini => &["gemini-2.0-flash", "gemini-1.5-flash"],
            ProviderKind::OpenRouter => &["anthropic/claude-sonnet-4", "x-ai/grok-4.1-fast"],
            ProviderKind::CometApi => &["gpt-4o-mini"],
        }
    }

    /// Static trust weight given to successful votes from this provider.
    pub fn default_confidence(self) -> u8 {
        match self {
            ProviderKind::Groq => 80,
            ProviderKind::Gemini => 81,
            ProviderKind::Xai => 82,
            ProviderKind::OpenRouter => 80,
            ProviderKind::CometApi => 80,
            ProviderKind::OpenAi => 85,
            ProviderKind::Anthropic => 85,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::Groq => "groq",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Xai => "xai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::CometApi => "cometapi",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Resolved per-client settings
// ---------------------------------------------------------------------------

/// Answers are a single word.
pub const DEFAULT_MAX_TOKENS: u32 = 10;
pub const DEFAULT_TEMPERATURE: f32 = 0.0;
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Everything a concrete client needs, with config overrides applied.
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: SecretString,
    pub base_url: String,
    pub models: Vec<String>,
    pub confidence: u8,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_retries: u32,
    pub request_timeout: Duration,
}

/// Split a provider deadline evenly across its model list so a hung first
/// model still leaves time for the fallbacks.
pub fn per_attempt_timeout(provider_timeout: Duration, models: usize) -> Duration {
    let models = u32::try_from(models.max(1)).unwrap_or(u32::MAX);
    provider_timeout / models
}

impl ProviderSettings {
    /// Defaults for `kind` with the given key.
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: SecretString::new(api_key.into()),
            base_url: kind.default_base_url().to_string(),
            models: kind.default_models().iter().map(|m| m.to_string()).collect(),
            confidence: kind.default_confidence(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Apply config overrides. `provider_timeout` is the engine's deadline
    /// for the whole provider; each model attempt gets a share of it unless
    /// `request_timeout_secs` is set.
    pub fn from_config(cfg: &ProviderConfig, api_key: String, provider_timeout: Duration) -> Self {
        let mut settings = Self::new(cfg.kind, api_key);
        if let Some(models) = &cfg.models {
            settings.models = models.clone();
        }
        if let Some(base_url) = &cfg.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(confidence) = cfg.confidence {
            settings.confidence = confidence.min(100);
        }
        if let Some(max_tokens) = cfg.max_tokens {
            settings.max_tokens = max_tokens;
        }
        if let Some(temperature) = cfg.temperature {
            settings.temperature = temperature;
        }
        if let Some(max_retries) = cfg.max_retries {
            settings.max_retries = max_retries;
        }
        settings.request_timeout = match cfg.request_timeout_secs {
            Some(secs) => Duration::from_secs(secs),
            None => per_attempt_timeout(provider_timeout, settings.models.len()),
        };
        settings
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

// ---------------------------------------------------------------------------
// Client construction
// ---------------------------------------------------------------------------

/// Build a client for one provider.
pub fn build_client(settings: ProviderSettings) -> Result<Arc<dyn OracleClient>> {
    let client: Arc<dyn OracleClient> = match settings.kind.api_format() {
        ApiFormat::OpenAiChat => Arc::new(openai::OpenAiCompatClient::new(settings)?),
        ApiFormat::AnthropicMessages => Arc::new(anthropic::AnthropicClient::new(settings)?),
        ApiFormat::GeminiGenerate => Arc::new(gemini::GeminiClient::new(settings)?),
    };
    Ok(client)
}

/// Build every enabled provider whose API key is present in the environment.
pub fn build_clients(cfg: &AppConfig) -> Result<Vec<Arc<dyn OracleClient>>> {
    build_clients_with(cfg, |name| AppConfig::resolve_env(name).ok())
}

/// Like [`build_clients`] but with an injectable secret lookup.
pub fn build_clients_with<F>(cfg: &AppConfig, lookup: F) -> Result<Vec<Arc<dyn OracleClient>>>
where
    F: Fn(&str) -> Option<String>,
{
    let timeout = cfg.consensus.provider_timeout();
    let mut clients = Vec::new();

    for provider in &cfg.providers {
        if !provider.enabled {
            info!(provider = %provider.kind, "Provider disabled in config");
            continue;
        }

        let key = match lookup(&provider.api_key_env) {
            Some(k) if !k.trim().is_empty() => k,
            _ => {
                info!(
                    provider = %provider.kind,
                    env = %provider.api_key_env,
                    "No API key set, provider not configured"
                );
                continue;
            }
        };

        let settings = ProviderSettings::from_config(provider, key, timeout);
        info!(
            provider = %provider.kind,
            models = ?settings.models,
            confidence = settings.confidence,
            "Oracle provider configured"
        );
        clients.push(build_client(settings)?);
    }

    if clients.is_empty() {
        warn!("No oracle providers configured, resolution requests will be rejected");
    }

    Ok(clients)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
