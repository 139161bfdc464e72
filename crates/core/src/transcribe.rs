use async_trait::async_trait;

use crate::{
    format::format_timestamp,
    types::{TranscriptData, TranscriptSegment},
};

/// Reading-pace estimate used to synthesize timestamps for pasted text.
const WORDS_PER_MINUTE: f64 = 150.0;

#[derive(Debug, thiserror::Error)]
pub enum TranscribeError {
    #[error("transcription failed: {reason}")]
    Failed { reason: String },
}

/// A transcription back-end (caption scraper, speech-to-text provider).
///
/// The engine never calls this itself; the front-end resolves a provider,
/// fetches the transcript, and aborts before any job is created if it
/// fails.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        language: Option<&str>,
    ) -> Result<TranscriptData, TranscribeError>;
}

/// Convert raw pasted text into the segment structure the engine expects.
///
/// Paragraphs become segments with timestamps estimated from word count at
/// a typical speaking pace; the speaker is unknown for manual text.
pub fn manual_transcript(text: &str) -> TranscriptData {
    let mut segments = Vec::new();
    let mut current_time = 0.0;

    for paragraph in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let word_count = paragraph.split_whitespace().count() as f64;
        let duration = word_count / WORDS_PER_MINUTE * 60.0;

        segments.push(TranscriptSegment {
            speaker: "Speaker".to_string(),
            time: format_timestamp(current_time),
            start_seconds: current_time,
            text: paragraph.to_string(),
        });

        current_time += duration;
    }

    TranscriptData {
        video_id: None,
        title: "Manual Transcript Analysis".to_string(),
        duration_seconds: current_time,
        segments,
    }
}
