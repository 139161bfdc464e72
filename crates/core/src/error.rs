use thiserror::Error;

use crate::gateway::GatewayError;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("no transcript segments to analyze")]
    EmptyTranscript,

    #[error("model output was truncated and contained no usable content")]
    TruncatedOutput,

    #[error("model returned malformed JSON: {source}")]
    MalformedModelOutput {
        raw: String,
        source: serde_json::Error,
    },

    #[error("model gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("analysis cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
