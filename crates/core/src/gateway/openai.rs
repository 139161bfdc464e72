use async_trait::async_trait;
use tracing::debug;

use super::{ChatMessage, GatewayError, GenerateResponse, ModelGateway, REQUEST_TIMEOUT};

/// Gateway for OpenAI and OpenAI-compatible back-ends (DeepSeek,
/// OpenRouter, local proxies). Expects a `/chat/completions` route under
/// the base URL.
pub struct OpenAiCompatibleGateway {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    provider_tag: String,
}

impl OpenAiCompatibleGateway {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>, provider_tag: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            provider_tag,
        }
    }
}

#[async_trait]
impl ModelGateway for OpenAiCompatibleGateway {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<GenerateResponse, GatewayError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            GatewayError::MissingApiKey {
                provider: self.provider_tag.clone(),
            }
        })?;

        let mut payload = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": 0.3,
            "max_tokens": 4096,
        });
        // Only strict OpenAI reliably supports json_object; compatible
        // proxies may reject the field outright.
        if self.provider_tag == "openai" {
            payload["response_format"] = serde_json::json!({"type": "json_object"});
        }

        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, model, "sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<GenerateResponse>().await?)
    }
}
