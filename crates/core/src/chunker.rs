use crate::{
    error::{AnalysisError, Result},
    format::render_segments,
    types::TranscriptSegment,
};

/// Slack added past the last segment start so the final window is emitted
/// even when segments end exactly on a window edge.
const END_MARGIN_SECONDS: f64 = 10.0;

/// One bounded, possibly overlapping time-window of transcript text.
///
/// Chunks are created fresh per analysis run and discarded after their
/// single micro-pass call.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// Split transcript segments into ordered, overlapping time-windows.
///
/// Windows advance by `window_seconds - overlap_seconds`; if the overlap is
/// at least the window size, the step falls back to the full window so the
/// cursor always moves forward. Windows covering no segment starts are
/// skipped rather than emitted empty.
pub fn plan_chunks(
    segments: &[TranscriptSegment],
    window_seconds: u32,
    overlap_seconds: u32,
) -> Result<Vec<Chunk>> {
    let Some(last) = segments.last() else {
        return Err(AnalysisError::EmptyTranscript);
    };

    let window = f64::from(window_seconds);
    let step = if overlap_seconds >= window_seconds {
        window
    } else {
        f64::from(window_seconds - overlap_seconds)
    };

    let last_start = last.start_seconds;
    let total_duration = last_start + END_MARGIN_SECONDS;

    let mut chunks = Vec::new();
    let mut cursor = 0.0;

    while cursor < total_duration {
        let end = cursor + window;
        let covered: Vec<&TranscriptSegment> = segments
            .iter()
            .filter(|s| s.start_seconds >= cursor && s.start_seconds < end)
            .collect();

        let covered_last_start = covered.last().map(|s| s.start_seconds);
        if !covered.is_empty() {
            chunks.push(Chunk {
                index: chunks.len(),
                start_seconds: cursor,
                end_seconds: end,
                text: render_segments(covered.iter().copied()),
            });
        }

        cursor += step;

        // Stop once a window has covered the transcript's final segment.
        if covered_last_start.is_some_and(|s| s >= last_start) {
            break;
        }
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments_every(interval: f64, until: f64) -> Vec<TranscriptSegment> {
        let mut out = Vec::new();
        let mut t = 0.0;
        while t <= until {
            out.push(TranscriptSegment {
                speaker: "Host".to_string(),
                time: crate::format::format_timestamp(t),
                start_seconds: t,
                text: format!("segment at {t}"),
            });
            t += interval;
        }
        out
    }

    #[test]
    fn empty_transcript_is_rejected() {
        assert!(matches!(
            plan_chunks(&[], 300, 60),
            Err(AnalysisError::EmptyTranscript)
        ));
    }

    #[test]
    fn covers_450_seconds_in_two_overlapping_windows() {
        let segments = segments_every(30.0, 450.0);
        let chunks = plan_chunks(&segments, 300, 60).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].start_seconds, 0.0);
        assert_eq!(chunks[0].end_seconds, 300.0);
        assert_eq!(chunks[1].start_seconds, 240.0);
        assert_eq!(chunks[1].end_seconds, 540.0);
    }

    #[test]
    fn overlap_larger_than_window_still_terminates() {
        let segments = segments_every(30.0, 900.0);
        let chunks = plan_chunks(&segments, 300, 600).unwrap();

        // Step falls back to the window size: contiguous, non-overlapping.
        assert!(!chunks.is_empty());
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_seconds - pair[0].start_seconds, 300.0);
        }
        assert_eq!(chunks.last().unwrap().index, chunks.len() - 1);
    }

    #[test]
    fn silent_gaps_are_skipped_without_stalling_the_cursor() {
        let mut segments = segments_every(30.0, 90.0);
        segments.push(TranscriptSegment {
            speaker: "Host".to_string(),
            time: "16:40".to_string(),
            start_seconds: 1000.0,
            text: "after a long silence".to_string(),
        });

        let chunks = plan_chunks(&segments, 300, 0).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].start_seconds, 0.0);
        assert_eq!(chunks[1].start_seconds, 900.0);
        // Indices stay dense even though windows were skipped.
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn chunk_text_preserves_segment_order() {
        let segments = segments_every(100.0, 200.0);
        let chunks = plan_chunks(&segments, 300, 0).unwrap();
        assert_eq!(chunks.len(), 1);
        let lines: Vec<&str> = chunks[0].text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("segment at 0"));
        assert!(lines[2].contains("segment at 200"));
    }
}
