//! Storyarc core library
//!
//! Turns long timestamped transcripts into structured narrative reports by
//! driving a macro pass (summary + narrative arc) and a windowed micro pass
//! (per-chunk learning moments) against a pluggable model gateway, as
//! asynchronous progress-reporting jobs with content-addressed caching.

pub mod cache;
pub mod chunker;
pub mod engine;
pub mod error;
pub mod format;
pub mod gateway;
pub mod jobs;
pub mod normalize;
pub mod prompt;
pub mod transcribe;
pub mod types;

// Re-export commonly used items at crate root
pub use cache::{CacheEntry, CacheStore};
pub use chunker::{Chunk, plan_chunks};
pub use engine::{AnalysisConfig, AnalysisEngine, AnalysisRequest, PhaseWeights, SubmitReceipt};
pub use error::{AnalysisError, Result};
pub use format::{format_analysis_readable, format_timestamp, render_segments};
pub use gateway::{
    ChatMessage, GatewayError, GenerateResponse, ModelGateway, ProviderConfig, build_gateway,
};
pub use jobs::{Job, JobStatus, JobStore};
pub use prompt::PromptTemplate;
pub use transcribe::{Transcriber, manual_transcript};
pub use types::{
    AnalysisResult, CachedAnalysis, HistoryEntry, TranscriptData, TranscriptSegment,
};
