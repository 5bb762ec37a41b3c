//! Anthropic Claude oracle client.
//!
//! Implements the `OracleClient` trait using the Anthropic Messages API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use super::fallback::vote_with_fallback;
use super::prompt::system_prompt;
use super::transport::send_json;
use super::{OracleClient, ProviderSettings};
use crate::types::{MarketQuery, OracleError, Vote};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const ANTHROPIC_VERSION: &str = "2023-06-01";

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl MessagesResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct AnthropicClient {
    http: Client,
    settings: ProviderSettings,
    source_id: String,
    total_calls: AtomicU64,
}

impl AnthropicClient {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("Failed to build Anthropic HTTP client")?;

        Ok(Self {
            http,
            source_id: settings.kind.to_string(),
            settings,
            total_calls: AtomicU64::new(0),
        })
    }

    /// Number of successful API calls made.
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    async fn send_once(&self, model: &str, user_message: &str) -> Result<String, OracleError> {
        let request = MessagesRequest {
            model,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            messages: vec![Message {
                role: "user".to_string(),
                content: user_message.to_string(),
            }],
            system: Some(system_prompt().to_string()),
        };

        let builder = self
            .http
            .post(&self.settings.base_url)
            .header("x-api-key", self.settings.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request);

        let body: MessagesResponse = send_json(builder).await?;
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        Ok(body.text())
    }
}

// ---------------------------------------------------------------------------
// OracleClient implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl OracleClient for AnthropicClient {
    async fn analyze_market(&self, query: &MarketQuery) -> Result<Vote, OracleError> {
        vote_with_fallback(&self.source_id, &self.settings, query, |model, prompt| async move {
            self.send_once(&model, &prompt).await
        })
        .await
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
