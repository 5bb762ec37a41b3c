//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::llm::ProviderKind;

/// Default config file, overridable with `ORACLE_CONFIG`.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3001,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConsensusConfig {
    /// Fraction of configured providers that must agree, in (0, 1].
    #[serde(default = "default_agreement_threshold")]
    pub agreement_threshold: f64,
    /// Independent deadline for each provider call.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
}

impl ConsensusConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            agreement_threshold: default_agreement_threshold(),
            provider_timeout_secs: default_provider_timeout_secs(),
        }
    }
}

fn default_agreement_threshold() -> f64 {
    0.8
}

fn default_provider_timeout_secs() -> u64 {
    30
}

/// One oracle provider. Unset optional fields fall back to the
/// provider kind's defaults.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub api_key_env: String,
    /// Ordered model fallback list.
    #[serde(default)]
    pub models: Option<Vec<String>>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Static trust weight assigned to this provider's votes.
    #[serde(default)]
    pub confidence: Option<u8>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Retries per model on rate limits and server errors.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Deadline for one model attempt. Defaults to the provider timeout
    /// split evenly across the model list.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    /// Minimal config for a provider kind, everything else defaulted.
    pub fn for_kind(kind: ProviderKind, api_key_env: impl Into<String>) -> Self {
        Self {
            kind,
            enabled: true,
            api_key_env: api_key_env.into(),
            models: None,
            base_url: None,
            confidence: None,
            max_tokens: None,
            temperature: None,
            max_retries: None,
            request_timeout_secs: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.consensus.agreement_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            anyhow::bail!("consensus.agreement_threshold must be in (0, 1], got {threshold}");
        }
        if self.consensus.provider_timeout_secs == 0 {
            anyhow::bail!("consensus.provider_timeout_secs must be positive");
        }
        for provider in &self.providers {
            if let Some(confidence) = provider.confidence {
                if confidence > 100 {
                    anyhow::bail!(
                        "providers.{}: confidence must be 0-100, got {confidence}",
                        provider.kind
                    );
                }
            }
            if provider.request_timeout_secs == Some(0) {
                anyhow::bail!(
                    "providers.{}: request_timeout_secs must be positive",
                    provider.kind
                );
            }
            if matches!(&provider.models, Some(models) if models.is_empty()) {
                anyhow::bail!("providers.{}: models list is empty", provider.kind);
            }
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
