//! [`AnthropicBackend`]: a [`CompletionBackend`] over the Anthropic Messages
//! API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
  Error, Result,
  backend::{CompletionBackend, CompletionRequest},
};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";
pub const API_VERSION: &str = "2023-06-01";

/// Connection settings for [`AnthropicBackend`].
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
  pub api_key:         String,
  pub base_url:        String,
  pub model:           String,
  /// Transport-level ceiling; the client's raw-invocation timeout is
  /// normally shorter and wins.
  pub request_timeout: Duration,
}

impl AnthropicConfig {
  pub fn new(api_key: impl Into<String>) -> Self {
    Self {
      api_key:         api_key.into(),
      base_url:        DEFAULT_BASE_URL.to_owned(),
      model:           DEFAULT_MODEL.to_owned(),
      request_timeout: Duration::from_secs(60),
    }
  }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct MessagesRequest<'a> {
  model:      &'a str,
  max_tokens: u32,
  system:     &'a str,
  messages:   [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
  role:    &'static str,
  content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
  #[serde(default)]
  content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
  #[serde(rename = "type")]
  kind: String,
  #[serde(default)]
  text: Option<String>,
}

// ─── Backend ─────────────────────────────────────────────────────────────────

pub struct AnthropicBackend {
  client: Client,
  config: AnthropicConfig,
}

impl AnthropicBackend {
  pub fn new(config: AnthropicConfig) -> Result<Self> {
    let client = Client::builder().timeout(config.request_timeout).build()?;
    Ok(Self { client, config })
  }

  pub fn model(&self) -> &str { &self.config.model }
}

impl CompletionBackend for AnthropicBackend {
  #[instrument(skip_all, fields(model = %self.config.model))]
  async fn complete(&self, request: &CompletionRequest) -> Result<String> {
    let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
    let body = MessagesRequest {
      model:      &self.config.model,
      max_tokens: request.max_tokens,
      system:     &request.system,
      messages:   [Message { role: "user", content: &request.user }],
    };

    let response = self
      .client
      .post(&url)
      .header("x-api-key", &self.config.api_key)
      .header("anthropic-version", API_VERSION)
      .json(&body)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(Error::Backend { status: status.as_u16(), body });
    }

    let parsed: MessagesResponse = response.json().await?;
    let text: String = parsed
      .content
      .into_iter()
      .filter(|block| block.kind == "text")
      .filter_map(|block| block.text)
      .collect::<Vec<_>>()
      .join("");

    debug!(chars = text.len(), "completion received");
    Ok(text)
  }
}
