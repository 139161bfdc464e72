use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod anthropic;
mod openai;

pub use anthropic::AnthropicGateway;
pub use openai::OpenAiCompatibleGateway;

/// Per-call HTTP timeout. Long transcripts can take minutes to process.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Environment fallback when no API key is configured explicitly.
const API_KEY_ENV_VAR: &str = "STORYARC_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("missing API key for {provider} (set it in the provider config or {API_KEY_ENV_VAR})")]
    MissingApiKey { provider: String },

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid provider response: {reason}")]
    InvalidResponse { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Normalized OpenAI-style completion envelope.
///
/// Adapters for other providers translate into this shape before handing
/// results back to the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

/// The single capability the engine needs from a model provider.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<GenerateResponse, GatewayError>;
}

/// Caller-supplied provider selection, forwarded verbatim from the request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider tag, e.g. "openai", "deepseek", "anthropic". Anything that
    /// is not recognized as Anthropic gets the OpenAI-compatible adapter.
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Target output language; absent or "auto" means match the source.
    pub output_language: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAiCompatible,
    Anthropic,
}

impl ProviderKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_lowercase().as_str() {
            "anthropic" => ProviderKind::Anthropic,
            _ => ProviderKind::OpenAiCompatible,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAiCompatible => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
        }
    }
}

fn resolve_api_key(config: &ProviderConfig) -> Option<String> {
    config
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var(API_KEY_ENV_VAR).ok())
}

/// Resolve the provider tag into a concrete gateway, once per request.
///
/// A missing API key is not an error here; the adapters report it on the
/// first call, so a gateway can be built for key-less operations.
pub fn build_gateway(config: &ProviderConfig) -> Arc<dyn ModelGateway> {
    let tag = config.provider.as_deref().unwrap_or("openai");
    let kind = ProviderKind::from_tag(tag);
    let api_key = resolve_api_key(config);
    let base_url = config
        .base_url
        .clone()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| kind.default_base_url().to_string());

    match kind {
        ProviderKind::Anthropic => Arc::new(AnthropicGateway::new(api_key, base_url)),
        ProviderKind::OpenAiCompatible => Arc::new(OpenAiCompatibleGateway::new(
            api_key,
            base_url,
            tag.to_string(),
        )),
    }
}
