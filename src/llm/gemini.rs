//! Google Gemini oracle client (generateContent API).

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
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

fn text_content(role: Option<&str>, text: &str) -> Content {
    Content {
        role: role.map(str::to_string),
        parts: vec![Part {
            text: Some(text.to_string()),
        }],
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct GeminiClient {
    http: Client,
    settings: ProviderSettings,
    source_id: String,
    total_calls: AtomicU64,
}

impl GeminiClient {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("Failed to build Gemini HTTP client")?;

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

    /// `{base}/models/{model}:generateContent`
    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            urlencoding::encode(model)
        )
    }

    async fn send_once(&self, model: &str, user_message: &str) -> Result<String, OracleError> {
        let request = GenerateRequest {
            contents: vec![text_content(Some("user"), user_message)],
            system_instruction: text_content(None, system_prompt()),
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
                max_output_tokens: self.settings.max_tokens,
            },
        };

        let builder = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", self.settings.api_key.expose_secret())
            .json(&request);

        let body: GenerateResponse = send_json(builder).await?;
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        Ok(body.text())
    }
}

// ---------------------------------------------------------------------------
// OracleClient implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl OracleClient for GeminiClient {
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
