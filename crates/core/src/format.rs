use serde_json::Value;

use crate::types::{AnalysisResult, TranscriptSegment};

/// Format seconds as MM:SS, or H:MM:SS past the hour mark.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (hours, rem) = (total / 3600, total % 3600);
    let (mins, secs) = (rem / 60, rem % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

/// Render one segment as a transcript line: `[time] speaker: text`.
pub fn render_segment_line(segment: &TranscriptSegment) -> String {
    format!(
        "[{}] {}: {}",
        segment.time,
        segment.speaker,
        segment.text.trim()
    )
}

/// Render segments as newline-joined transcript lines.
pub fn render_segments<'a, I>(segments: I) -> String
where
    I: IntoIterator<Item = &'a TranscriptSegment>,
{
    segments
        .into_iter()
        .map(render_segment_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn value_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| value.get(k).and_then(Value::as_str))
}

pub fn format_analysis_readable(result: &AnalysisResult) -> String {
    let mut output = String::new();

    output.push_str("## Summary\n\n");
    output.push_str(&result.summary);
    output.push_str("\n\n");

    if !result.narrative_arc.is_empty() {
        output.push_str("## Narrative arc\n\n");
        for phase in &result.narrative_arc {
            let name = value_str(phase, &["phase", "name", "title"]).unwrap_or("Phase");
            let desc = value_str(phase, &["description", "summary", "analysis"]).unwrap_or("");
            output.push_str(&format!("### {}\n\n{}\n\n", name, desc));
        }
    }

    if !result.learning_moments.is_empty() {
        output.push_str("## Learning moments\n\n");
        for moment in &result.learning_moments {
            let start = value_str(moment, &["timestamp_start"]).unwrap_or("?");
            let end = value_str(moment, &["timestamp_end"]).unwrap_or("?");
            let name = value_str(moment, &["technique_name", "name"]).unwrap_or("Moment");
            output.push_str(&format!("### [{}–{}] {}\n\n", start, end, name));
            if let Some(category) = value_str(moment, &["category"]) {
                output.push_str(&format!("**Category:** {}\n\n", category));
            }
            if let Some(quote) = value_str(moment, &["quote"]) {
                output.push_str(&format!("> {}\n\n", quote));
            }
            if let Some(analysis) = value_str(moment, &["analysis"]) {
                output.push_str(&format!("{}\n\n", analysis));
            }
            if let Some(takeaway) = value_str(moment, &["takeaway"]) {
                output.push_str(&format!("**Takeaway:** {}\n\n", takeaway));
            }
        }
    }

    output
}
