use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    cache::CacheStore,
    chunker::plan_chunks,
    error::{AnalysisError, Result},
    format::render_segments,
    gateway::{ChatMessage, ModelGateway},
    jobs::{Job, JobStatus, JobStore},
    normalize::parse_model_response,
    prompt::PromptTemplate,
    types::{AnalysisMeta, AnalysisResult, CachedAnalysis, HistoryEntry, TranscriptData},
};

/// Progress percentages published at each phase boundary. Kept in one
/// struct so the phase → percent mapping has a single source of truth.
#[derive(Debug, Clone, Copy)]
pub struct PhaseWeights {
    /// Published when the macro pass starts.
    pub macro_pass: u8,
    /// Published when chunk planning starts; micro progress interpolates
    /// from here up to `micro_end`.
    pub chunking: u8,
    pub micro_end: u8,
    /// Published while merging, before the terminal 100.
    pub merging: u8,
}

impl Default for PhaseWeights {
    fn default() -> Self {
        Self {
            macro_pass: 10,
            chunking: 30,
            micro_end: 90,
            merging: 95,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Character ceiling for the macro-pass transcript text. A coarse
    /// stand-in for token counting that keeps the call inside the model's
    /// context window.
    pub macro_char_budget: usize,
    /// Character ceiling for a single chunk's text.
    pub chunk_char_budget: usize,
    /// Micro-pass window size. Kept well below the macro budget so each
    /// chunk call stays small.
    pub window_seconds: u32,
    pub overlap_seconds: u32,
    pub phase_weights: PhaseWeights,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            macro_char_budget: 150_000,
            chunk_char_budget: 30_000,
            window_seconds: 300,
            overlap_seconds: 60,
            phase_weights: PhaseWeights::default(),
        }
    }
}

/// One analysis request as handed to `submit`.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Human-readable origin, e.g. the URL or "Manual input".
    pub source: String,
    /// Cache key input: the URL when one exists, else the full pasted text.
    pub cache_input: String,
    pub transcript: TranscriptData,
    pub model: String,
    pub output_language: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct SubmitReceipt {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// The map-reduce driver: one macro call for summary and narrative arc,
/// then one micro call per overlapping transcript window for learning
/// moments, merged in chunk order.
///
/// Macro failure is fatal to the job; a failed micro chunk contributes an
/// empty moment list and the job completes with partial coverage.
pub struct AnalysisEngine {
    gateway: Arc<dyn ModelGateway>,
    jobs: JobStore,
    cache: CacheStore,
    template: PromptTemplate,
    config: AnalysisConfig,
}

impl AnalysisEngine {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        jobs: JobStore,
        cache: CacheStore,
        template: PromptTemplate,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            gateway,
            jobs,
            cache,
            template,
            config,
        }
    }

    /// Start an analysis. On a cache hit the returned job is already
    /// completed; otherwise a queued job is created and the work runs as a
    /// background task.
    pub fn submit(self: &Arc<Self>, request: AnalysisRequest) -> SubmitReceipt {
        if let Some(payload) = self.cache.lookup(&request.cache_input, &request.model) {
            let job_id = self.jobs.create();
            self.jobs.complete(job_id, payload);
            return SubmitReceipt {
                job_id,
                status: JobStatus::Completed,
            };
        }

        let job_id = self.jobs.create();
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_job(job_id, request).await;
        });

        SubmitReceipt {
            job_id,
            status: JobStatus::Queued,
        }
    }

    pub fn poll(&self, job_id: Uuid) -> Result<Job> {
        self.jobs
            .get(job_id)
            .ok_or_else(|| AnalysisError::NotFound(format!("job {job_id}")))
    }

    pub fn cancel(&self, job_id: Uuid) {
        self.jobs.cancel(job_id);
    }

    pub fn list_history(&self) -> Vec<HistoryEntry> {
        self.cache.list_entries()
    }

    pub fn get_history_item(&self, key: &str) -> Result<CachedAnalysis> {
        self.cache
            .get_by_key(key)
            .ok_or_else(|| AnalysisError::NotFound(format!("history item {key}")))
    }

    pub fn delete_history(&self, keys: &[String]) -> usize {
        self.cache.delete(keys)
    }

    async fn run_job(&self, job_id: Uuid, request: AnalysisRequest) {
        match self.analyze(job_id, &request).await {
            Ok(analysis) => {
                let artifact = CachedAnalysis {
                    meta: AnalysisMeta {
                        video_id: request.transcript.video_id.clone(),
                        title: request.transcript.title.clone(),
                        duration_seconds: request.transcript.duration_seconds,
                        source: request.source.clone(),
                    },
                    transcript: request.transcript.segments.clone(),
                    analysis,
                };
                if let Err(e) = self
                    .cache
                    .store(&request.cache_input, &request.model, &artifact)
                {
                    warn!(job = %job_id, error = %e, "failed to persist analysis to cache");
                }
                self.jobs.complete(job_id, artifact);
                info!(job = %job_id, "analysis complete");
            }
            Err(e) => {
                warn!(job = %job_id, error = %e, "analysis failed");
                self.jobs.fail(job_id, e.to_string());
            }
        }
    }

    async fn analyze(&self, job_id: Uuid, request: &AnalysisRequest) -> Result<AnalysisResult> {
        let segments = &request.transcript.segments;
        if segments.is_empty() {
            return Err(AnalysisError::EmptyTranscript);
        }

        let cancel = self.jobs.cancellation(job_id).unwrap_or_default();
        let lang = request.output_language.as_deref();
        let weights = self.config.phase_weights;

        // Macro pass: whole-transcript summary and narrative arc. Any
        // failure here aborts the job, since this anchors the artifact.
        self.jobs.update_progress(
            job_id,
            weights.macro_pass,
            "Analyzing narrative arc (macro pass)",
        );
        info!(job = %job_id, model = %request.model, "starting macro analysis");

        let full_text = truncate_to_budget(
            &render_segments(segments),
            self.config.macro_char_budget,
        );
        let macro_messages = vec![
            ChatMessage::system(self.template.macro_prompt(lang)),
            ChatMessage::user(format!(
                "Analyze the following full transcript to find the narrative arc:\n\n{full_text}"
            )),
        ];
        let macro_response = self.gateway.generate(&macro_messages, &request.model).await?;
        let macro_value = parse_model_response(&macro_response)?;

        let summary = macro_value
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or("Analysis produced no summary.")
            .to_string();
        let narrative_arc = macro_value
            .get("narrative_arc")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        self.jobs
            .update_progress(job_id, weights.chunking, "Chunking transcript");
        let chunks = plan_chunks(
            segments,
            self.config.window_seconds,
            self.config.overlap_seconds,
        )?;
        info!(job = %job_id, chunks = chunks.len(), "starting micro analysis");

        // Micro pass: chunks in index order, strictly sequential. A failed
        // chunk degrades coverage, never the job.
        let micro_prompt = self.template.micro_prompt(lang);
        let micro_span = u32::from(weights.micro_end - weights.chunking);
        let total = chunks.len();
        let mut learning_moments: Vec<Value> = Vec::new();

        for chunk in &chunks {
            if cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }

            let done = chunk.index + 1;
            let pct = weights.chunking + ((micro_span * done as u32) / total as u32) as u8;
            self.jobs
                .update_progress(job_id, pct, format!("Analyzing chunk {done}/{total}"));

            let chunk_text = truncate_to_budget(&chunk.text, self.config.chunk_char_budget);
            let messages = vec![
                ChatMessage::system(micro_prompt.clone()),
                ChatMessage::user(format!(
                    "Analyze this segment ({:.0}s to {:.0}s) for learning moments:\n\n{chunk_text}",
                    chunk.start_seconds, chunk.end_seconds
                )),
            ];

            let outcome = match self.gateway.generate(&messages, &request.model).await {
                Ok(response) => parse_model_response(&response),
                Err(e) => Err(e.into()),
            };

            match outcome {
                Ok(value) => {
                    if let Some(moments) = value.get("learning_moments").and_then(Value::as_array) {
                        learning_moments.extend(moments.iter().cloned());
                    }
                }
                Err(e) => {
                    warn!(
                        job = %job_id,
                        chunk = done,
                        error = %e,
                        "chunk analysis failed, contributing no moments"
                    );
                }
            }
        }

        self.jobs
            .update_progress(job_id, weights.merging, "Finalizing results");

        Ok(AnalysisResult {
            summary,
            narrative_arc,
            learning_moments: deduplicate_moments(learning_moments),
        })
    }
}

/// Merge-time deduplication of learning moments.
///
/// Deliberately a pass-through: overlapping windows can produce
/// near-duplicate moments, but no fuzzy-match policy has been specified,
/// and chunk order must be preserved either way.
fn deduplicate_moments(moments: Vec<Value>) -> Vec<Value> {
    moments
}

/// Cut `text` to at most `budget` bytes on a char boundary, marking the
/// cut. Returns the text unchanged when it fits.
fn truncate_to_budget(text: &str, budget: usize) -> String {
    if text.len() <= budget {
        return text.to_string();
    }
    let mut cut = budget;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    warn!(
        original_len = text.len(),
        budget, "truncating text to character budget"
    );
    format!("{}\n...(truncated)", &text[..cut])
}
