//! OpenAI-compatible chat completions client.
//!
//! One implementation serves every provider that speaks the OpenAI Chat
//! Completions format: OpenAI itself, Groq, xAI, OpenRouter and CometAPI.
//! Only the endpoint, model list and trust weight differ between them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use super::fallback::vote_with_fallback;
use super::prompt::system_prompt;
use super::transport::send_json;
use super::{OracleClient, ProviderKind, ProviderSettings};
use crate::types::{MarketQuery, OracleError, Vote};

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenAiCompatClient {
    http: Client,
    settings: ProviderSettings,
    source_id: String,
    total_calls: AtomicU64,
}

impl OpenAiCompatClient {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .with_context(|| format!("Failed to build {} HTTP client", settings.kind))?;

        Ok(Self {
            http,
            source_id: settings.kind.to_string(),
            settings,
            total_calls: AtomicU64::new(0),
        })
    }

    /// Models tried, in order.
    pub fn models(&self) -> &[String] {
        &self.settings.models
    }

    /// Number of successful API calls made.
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    /// One request against one model.
    async fn send_once(&self, model: &str, user_message: &str) -> Result<String, OracleError> {
        let request = ChatRequest {
            model,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(system_prompt().to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(user_message.to_string()),
                },
            ],
        };

        let mut builder = self
            .http
            .post(&self.settings.base_url)
            .bearer_auth(self.settings.api_key.expose_secret())
            .header("Content-Type", "application/json");

        if self.settings.kind == ProviderKind::OpenRouter {
            builder = builder
                .header("HTTP-Referer", "https://oracle-consensus.local")
                .header("X-Title", "oracle-consensus");
        }

        let body: ChatResponse = send_json(builder.json(&request)).await?;
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// OracleClient implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl OracleClient for OpenAiCompatClient {
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
