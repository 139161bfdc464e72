use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::{
    error::{AnalysisError, Result},
    gateway::{GatewayError, GenerateResponse},
};

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap());
static ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```\s*(.*?)\s*```").unwrap());

/// Extract the JSON body from raw model output.
///
/// Priority: a fenced block tagged `json`, then any fenced block, then the
/// substring from the first `{` to the last `}`, then the raw string
/// unchanged as a last resort.
pub fn extract_json(raw: &str) -> &str {
    if let Some(caps) = JSON_FENCE.captures(raw) {
        return caps.get(1).map_or(raw, |m| m.as_str());
    }
    if let Some(caps) = ANY_FENCE.captures(raw) {
        return caps.get(1).map_or(raw, |m| m.as_str());
    }
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}'))
        && end > start
    {
        return &raw[start..=end];
    }
    raw
}

/// Normalize a raw gateway response into a JSON value.
///
/// A length-limited response with no content is unsalvageable and fails
/// with `TruncatedOutput`. A truncation flag alongside non-empty content is
/// a soft condition: logged, then parsed as usual.
pub fn parse_model_response(response: &GenerateResponse) -> Result<Value> {
    let choice = response.choices.first().ok_or_else(|| {
        AnalysisError::Gateway(GatewayError::InvalidResponse {
            reason: "response contained no choices".to_string(),
        })
    })?;

    let content = choice.message.content.as_deref().unwrap_or_default();
    let truncated = choice.finish_reason.as_deref() == Some("length");

    if truncated && content.trim().is_empty() {
        return Err(AnalysisError::TruncatedOutput);
    }
    if truncated {
        warn!(
            content_len = content.len(),
            "model output truncated by token limit, parsing what we have"
        );
    }

    let extracted = extract_json(content);
    serde_json::from_str(extracted).map_err(|source| AnalysisError::MalformedModelOutput {
        raw: content.to_string(),
        source,
    })
}
