use async_trait::async_trait;
use serde_json::json;

use aigate::fallback::{degradable_status, TierError};

use crate::error::EmbeddingError;
use crate::types::{CacheStatsWire, EmbedResponseWire, UsageWire};

/// One embedding backend tier. Primary and secondary share this contract,
/// which is what lets the orchestrator swap them transparently.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Stable name for logs and degradation signals.
    fn name(&self) -> &str;

    /// Embed a whole batch; the returned vectors are index-aligned with
    /// `texts`.
    async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<BackendBatch, TierError>;

    /// Embed one text.
    async fn embed_single(&self, model: &str, text: &str) -> Result<Vec<f32>, TierError>;
}

/// A backend's answer for one batch.
pub struct BackendBatch {
    pub vectors: Vec<Vec<f32>>,
    pub usage: Option<UsageWire>,
    /// Backend-side cache statistics, observational only.
    pub cache_stats: Option<CacheStatsWire>,
}

/// HTTP embedding backend speaking the `{texts, model}` contract.
pub struct HttpEmbeddingBackend {
    name: String,
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpEmbeddingBackend {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        api_key: Option<String>,
        connect_timeout: std::time::Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| EmbeddingError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            name: name.into(),
            client,
            url: url.into(),
            api_key,
        })
    }

    async fn post(&self, model: &str, texts: &[String]) -> Result<EmbedResponseWire, TierError> {
        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .json(&json!({ "texts": texts, "model": model }))
            .send()
            .await
            .map_err(|e| TierError::transient(format!("{}: request failed: {e}", self.name)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = format!("{}: HTTP {status}: {body}", self.name);
            return Err(if degradable_status(status.as_u16()) {
                TierError::transient(reason)
            } else {
                TierError::rejected(reason)
            });
        }

        // A body that does not parse is a primary-failure condition like any
        // other transient fault.
        response
            .json::<EmbedResponseWire>()
            .await
            .map_err(|e| TierError::transient(format!("{}: malformed response body: {e}", self.name)))
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbeddingBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<BackendBatch, TierError> {
        let wire = self.post(model, texts).await?;
        if wire.data.len() != texts.len() {
            return Err(TierError::transient(format!(
                "{}: returned {} embeddings for {} inputs",
                self.name,
                wire.data.len(),
                texts.len()
            )));
        }
        Ok(BackendBatch {
            vectors: wire.data.into_iter().map(|item| item.embedding).collect(),
            usage: wire.usage,
            cache_stats: wire.cache_stats,
        })
    }

    async fn embed_single(&self, model: &str, text: &str) -> Result<Vec<f32>, TierError> {
        let texts = [text.to_owned()];
        let wire = self.post(model, &texts).await?;
        wire.data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| {
                TierError::transient(format!("{}: response contained no embeddings", self.name))
            })
    }
}
