use sha2::{Digest, Sha256};

/// Placeholder in the analysis template that receives the output-language
/// constraint block. If a custom template lacks it, the block is appended.
pub const LANGUAGE_PLACEHOLDER: &str = "{{LANGUAGE_CONSTRAINT}}";

/// Caller values meaning "match the transcript's dominant language".
const AUTO_LANGUAGE_SENTINELS: &[&str] = &["auto", "audio", "same as audio"];

static ANALYSIS_TEMPLATE: &str = r#"You are an expert storytelling coach analyzing a long-form conversation transcript.

You study how hosts and guests build narrative: how tension is set up and
released, which techniques keep listeners engaged, and what a student of
storytelling can copy from the exchange.

OUTPUT FORMAT: a single JSON object with exactly these keys:
{
  "summary": "2-4 sentence summary of the conversation",
  "narrative_arc": [
    {"phase": "Phase name", "timestamp_start": "MM:SS", "timestamp_end": "MM:SS", "description": "What happens narratively in this phase"}
  ],
  "learning_moments": []
}

LANGUAGE RULES:
{{LANGUAGE_CONSTRAINT}}
"#;

static MACRO_TASK: &str = "\n\nTASK: Focus ONLY on generating the 'summary' and 'narrative_arc'. Return an empty list for 'learning_moments'. You MUST output valid JSON ONLY. No introduction. No conclusion. If the transcript is short or incomplete, analyze what you have. DO NOT REFUSE. DO NOT ASK FOR MORE CONTEXT.";

static MICRO_TASK: &str = r#"

TASK: Find specific 'learning_moments' in this segment.
REQUIRED JSON STRUCTURE:
{
  "learning_moments": [
    {
      "timestamp_start": "MM:SS",
      "timestamp_end": "MM:SS",
      "category": "Host Technique" or "Guest Storytelling",
      "technique_name": "Name of technique",
      "quote": "Direct quote",
      "analysis": "Why it worked",
      "takeaway": "Actionable advice"
    }
  ]
}
You MUST output valid JSON ONLY. No introduction. No conclusion. DO NOT REFUSE."#;

/// The system-prompt template governing every analysis call.
///
/// The template text is hashed into cache keys, so editing it invalidates
/// prior cache entries without any migration step.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn builtin() -> Self {
        Self {
            text: ANALYSIS_TEMPLATE.to_string(),
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Hex sha256 of the raw template text.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Base system prompt with the language constraint substituted in.
    pub fn system_prompt(&self, output_language: Option<&str>) -> String {
        let constraint = language_constraint(output_language);
        if self.text.contains(LANGUAGE_PLACEHOLDER) {
            self.text.replace(LANGUAGE_PLACEHOLDER, &constraint)
        } else {
            format!("{}\n\n# Language Constraint\n{}", self.text, constraint)
        }
    }

    /// System prompt for the whole-transcript macro pass.
    pub fn macro_prompt(&self, output_language: Option<&str>) -> String {
        format!("{}{}", self.system_prompt(output_language), MACRO_TASK)
    }

    /// System prompt for a per-chunk micro pass.
    pub fn micro_prompt(&self, output_language: Option<&str>) -> String {
        format!("{}{}", self.system_prompt(output_language), MICRO_TASK)
    }
}

fn is_auto(language: &str) -> bool {
    let lowered = language.to_lowercase();
    AUTO_LANGUAGE_SENTINELS.contains(&lowered.as_str())
}

/// Build the output-language constraint block.
///
/// No language (or an "auto" sentinel) means matching the transcript's
/// dominant language; otherwise the caller's language is mandated. JSON
/// keys stay English either way so the output contract survives.
pub fn language_constraint(output_language: Option<&str>) -> String {
    match output_language {
        Some(lang) if !is_auto(lang) => format!(
            r#"- **CRITICAL**: You MUST write the content (summary, analysis, takeaways) in **{lang}**.
- **IMPORTANT**: The **JSON KEYS** (e.g., "narrative_arc", "learning_moments") MUST remain in **ENGLISH**. Do NOT translate the keys.
- **Recall**: Use Single Quotes (') or Chinese Quotes (「」) for internal text. NEVER use double quotes (") inside the values."#
        ),
        _ => r#"- **CRITICAL**: The output language for the *values* (summary, descriptions, quotes, analysis) MUST match the **majority language** spoken in the transcript.
- **IMPORTANT**: The **JSON KEYS** (e.g., "narrative_arc", "learning_moments") MUST remain in **ENGLISH**. Do NOT translate the keys.
- **Recall**: Use Single Quotes (') or Chinese Quotes (「」) for internal text. NEVER use double quotes (") inside the values.
- If the audio is mixed (e.g., Spanglish), write in the dominant language."#
            .to_string(),
    }
}
