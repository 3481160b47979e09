use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upstream provider configuration. Built once at startup and passed into
/// [`ChatUpstream::new`](crate::upstream::ChatUpstream::new); nothing here
/// changes at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// Chat completions endpoint (token-generation provider).
    #[serde(default = "default_chat_url")]
    pub chat_url: String,
    /// Streaming search endpoint; search mode is unavailable without it.
    #[serde(default)]
    pub search_url: Option<String>,
    /// Bearer token for the upstream provider.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model used by the primary tier.
    #[serde(default = "default_model_main")]
    pub model_main: String,
    /// Model used by the secondary tier after a primary failure.
    #[serde(default = "default_model_fallback")]
    pub model_fallback: String,
    /// `HTTP-Referer` attribution header, when the provider wants one.
    #[serde(default)]
    pub referer: Option<String>,
    /// `X-Title` attribution header.
    #[serde(default)]
    pub app_title: Option<String>,
    /// Bound on opening a stream (connect + headers). The body itself is
    /// unbounded: a whole-request timeout would sever long streams.
    #[serde(default = "default_stream_open_timeout_secs")]
    pub stream_open_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            chat_url: default_chat_url(),
            search_url: None,
            api_key: None,
            model_main: default_model_main(),
            model_fallback: default_model_fallback(),
            referer: None,
            app_title: None,
            stream_open_timeout_secs: default_stream_open_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
        }
    }
}

impl UpstreamConfig {
    pub fn stream_open_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_open_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_chat_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_model_main() -> String {
    "deepseek/deepseek-chat-v3.1".to_string()
}

fn default_model_fallback() -> String {
    "deepseek/deepseek-chat".to_string()
}

fn default_stream_open_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}
