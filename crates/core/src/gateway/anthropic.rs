use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{
    ChatMessage, Choice, ChoiceMessage, GatewayError, GenerateResponse, ModelGateway,
    REQUEST_TIMEOUT,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Gateway for the Anthropic Messages API. Translates the response into
/// the normalized OpenAI-style envelope the engine consumes.
pub struct AnthropicGateway {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl AnthropicGateway {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ModelGateway for AnthropicGateway {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<GenerateResponse, GatewayError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            GatewayError::MissingApiKey {
                provider: "anthropic".to_string(),
            }
        })?;

        // The Messages API takes system text as a top-level parameter.
        let mut system_prompt = String::new();
        let mut chat_messages = Vec::new();
        for msg in messages {
            if msg.role == "system" {
                system_prompt.push_str(&msg.content);
                system_prompt.push('\n');
            } else {
                chat_messages.push(msg.clone());
            }
        }

        let payload = serde_json::json!({
            "model": model,
            "messages": chat_messages,
            "max_tokens": 4096,
            "temperature": 0.3,
            "system": system_prompt.trim(),
        });

        let url = format!("{}/messages", self.base_url);
        debug!(%url, model, "sending messages request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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

        let data = response.json::<MessagesResponse>().await?;
        let content = data
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| GatewayError::InvalidResponse {
                reason: "empty content array".to_string(),
            })?;

        // Normalize the truncation signal so the response normalizer sees
        // the same finish_reason regardless of provider.
        let finish_reason = data.stop_reason.map(|r| match r.as_str() {
            "max_tokens" => "length".to_string(),
            _ => r,
        });

        Ok(GenerateResponse {
            choices: vec![Choice {
                message: ChoiceMessage {
                    content: Some(content),
                },
                finish_reason,
            }],
        })
    }
}
