use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One timestamped utterance from a transcription provider.
///
/// Segments are ordered by `start_seconds` (non-decreasing) and immutable
/// once handed to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    #[serde(default = "default_speaker")]
    pub speaker: String,
    /// Human-rendered timestamp, e.g. "12:05" or "1:02:41".
    pub time: String,
    pub start_seconds: f64,
    pub text: String,
}

fn default_speaker() -> String {
    "Speaker".to_string()
}

/// Full transcript as produced by a transcription provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptData {
    pub video_id: Option<String>,
    pub title: String,
    pub duration_seconds: f64,
    pub segments: Vec<TranscriptSegment>,
}

/// Merged output of the macro and micro passes.
///
/// `narrative_arc` and `learning_moments` are model-defined objects; the
/// engine only guarantees they parsed as JSON and that `learning_moments`
/// came from a JSON array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    #[serde(default)]
    pub narrative_arc: Vec<Value>,
    #[serde(default)]
    pub learning_moments: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMeta {
    pub video_id: Option<String>,
    pub title: String,
    pub duration_seconds: f64,
    /// URL or a label such as "Manual input".
    pub source: String,
}

/// The full cacheable artifact of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAnalysis {
    pub meta: AnalysisMeta,
    pub transcript: Vec<TranscriptSegment>,
    pub analysis: AnalysisResult,
}

/// One row of the history listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub key: String,
    pub title: String,
    pub source: String,
    pub model: String,
    pub timestamp: DateTime<Utc>,
}
