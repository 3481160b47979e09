//! Tiered upstream stream opening.
//!
//! Opening a chat or search stream runs through the fallback orchestrator:
//! the primary tier asks for the requested (or configured main) model, and
//! on a degradable failure the secondary tier re-sends the identical input
//! against the fallback model. Whichever tier wins hands back the live
//! response; its byte stream then feeds the normalizer.

use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use aigate::fallback::{
    degradable_status, run_tiers, AttemptRecord, Strategy, Tier, TierError,
};

use crate::config::UpstreamConfig;
use crate::error::RelayError;

/// One chat turn, OpenAI message shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Inputs for a chat-mode stream.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatStreamRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Inputs for a search-mode stream.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchStreamRequest {
    pub query: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_max_results() -> u32 {
    10
}

/// A successfully opened upstream stream plus how it was won.
#[derive(Debug)]
pub struct OpenedStream {
    response: reqwest::Response,
    pub tier: Tier,
    pub attempts: Vec<AttemptRecord>,
}

impl OpenedStream {
    pub fn into_byte_stream(self) -> impl Stream<Item = Result<Bytes, reqwest::Error>> {
        self.response.bytes_stream()
    }
}

/// Client for the upstream token-generation/search provider.
///
/// Owns its pooled HTTP client; construct once at startup and share. Only
/// connect and stream-open are time-bounded — the streamed body must stay
/// open as long as the upstream keeps producing.
pub struct ChatUpstream {
    client: reqwest::Client,
    cfg: UpstreamConfig,
}

impl ChatUpstream {
    pub fn new(cfg: UpstreamConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(cfg.connect_timeout())
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| RelayError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, cfg })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.cfg
    }

    /// Open a chat-mode stream, degrading from the requested/main model to
    /// the fallback model on transient failure.
    pub async fn open_chat(&self, request: &ChatStreamRequest) -> Result<OpenedStream, RelayError> {
        let primary_model = request
            .model
            .clone()
            .unwrap_or_else(|| self.cfg.model_main.clone());
        let url = self.cfg.chat_url.clone();
        let primary_body = self.chat_body(request, &primary_model);
        let secondary_body = self.chat_body(request, &self.cfg.model_fallback);

        self.open_tiered(url, primary_body, secondary_body).await
    }

    /// Open a search-mode stream against the configured search endpoint.
    pub async fn open_search(
        &self,
        request: &SearchStreamRequest,
    ) -> Result<OpenedStream, RelayError> {
        let url = self
            .cfg
            .search_url
            .clone()
            .ok_or_else(|| RelayError::InvalidConfig("search_url is not configured".into()))?;
        let primary_model = request
            .model
            .clone()
            .unwrap_or_else(|| self.cfg.model_main.clone());
        let primary_body = self.search_body(request, &primary_model);
        let secondary_body = self.search_body(request, &self.cfg.model_fallback);

        self.open_tiered(url, primary_body, secondary_body).await
    }

    async fn open_tiered(
        &self,
        url: String,
        primary_body: Value,
        secondary_body: Value,
    ) -> Result<OpenedStream, RelayError> {
        let strategies = vec![
            Strategy::new(Tier::Primary, {
                let url = url.clone();
                move || self.send_stream(url, primary_body)
            }),
            Strategy::new(Tier::Secondary, move || {
                self.send_stream(url, secondary_body)
            }),
        ];

        let outcome = run_tiers(self.cfg.stream_open_timeout(), strategies).await?;
        if outcome.winner != Tier::Primary {
            tracing::info!(tier = %outcome.winner, "stream opened on fallback tier");
        }
        Ok(OpenedStream {
            response: outcome.value,
            tier: outcome.winner,
            attempts: outcome.attempts,
        })
    }

    async fn send_stream(&self, url: String, body: Value) -> Result<reqwest::Response, TierError> {
        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(key) = &self.cfg.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(referer) = &self.cfg.referer {
            request = request.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.cfg.app_title {
            request = request.header("X-Title", title);
        }

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| TierError::transient(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = format!("upstream returned {status}: {}", truncate(&body, 512));
            return Err(if degradable_status(status.as_u16()) {
                TierError::transient(reason)
            } else {
                TierError::rejected(reason)
            });
        }
        Ok(response)
    }

    fn chat_body(&self, request: &ChatStreamRequest, model: &str) -> Value {
        json!({
            "model": model,
            "messages": request.messages,
            "stream": true,
            "temperature": request.temperature.unwrap_or(self.cfg.default_temperature),
            "max_tokens": request.max_tokens.unwrap_or(self.cfg.default_max_tokens),
        })
    }

    fn search_body(&self, request: &SearchStreamRequest, model: &str) -> Value {
        json!({
            "query": request.query,
            "model": model,
            "chat_history": request.chat_history,
            "stream": true,
            "max_results": request.max_results,
            "temperature": request.temperature.unwrap_or(self.cfg.default_temperature),
            "max_tokens": request.max_tokens.unwrap_or(self.cfg.default_max_tokens),
        })
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
