use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;
use uuid::Uuid;

use storyarc_core::{
    AnalysisConfig, AnalysisEngine, AnalysisRequest, CacheStore, ChatMessage, GatewayError,
    GenerateResponse, Job, JobStatus, JobStore, ModelGateway, PromptTemplate, TranscriptData,
    TranscriptSegment, format_timestamp,
};

/// Gateway fake that replays a fixed sequence of responses.
struct ScriptedGateway {
    script: Mutex<Vec<Result<String, GatewayError>>>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    fn new(script: Vec<Result<String, GatewayError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _model: &str,
    ) -> Result<GenerateResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().remove(0);
        next.map(|content| {
            serde_json::from_value(json!({
                "choices": [{
                    "message": {"content": content},
                    "finish_reason": "stop"
                }]
            }))
            .unwrap()
        })
    }
}

/// Gateway fake that pauses on one scripted call until released, so a
/// test can act while the job is mid-flight.
struct GatedGateway {
    script: Mutex<Vec<Result<String, GatewayError>>>,
    calls: AtomicUsize,
    gate_on_call: usize,
    reached: Notify,
    release: Notify,
}

impl GatedGateway {
    fn new(script: Vec<Result<String, GatewayError>>, gate_on_call: usize) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            gate_on_call,
            reached: Notify::new(),
            release: Notify::new(),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelGateway for GatedGateway {
    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _model: &str,
    ) -> Result<GenerateResponse, GatewayError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let next = self.script.lock().unwrap().remove(0);
        if call == self.gate_on_call {
            self.reached.notify_one();
            self.release.notified().await;
        }
        next.map(|content| {
            serde_json::from_value(json!({
                "choices": [{
                    "message": {"content": content},
                    "finish_reason": "stop"
                }]
            }))
            .unwrap()
        })
    }
}

fn segments_every_30s(until: f64) -> Vec<TranscriptSegment> {
    let mut out = Vec::new();
    let mut t = 0.0;
    while t <= until {
        out.push(TranscriptSegment {
            speaker: "Host".to_string(),
            time: format_timestamp(t),
            start_seconds: t,
            text: format!("spoken at {t}"),
        });
        t += 30.0;
    }
    out
}

fn request(segments: Vec<TranscriptSegment>) -> AnalysisRequest {
    let duration = segments.last().map(|s| s.start_seconds).unwrap_or(0.0);
    AnalysisRequest {
        source: "https://example.com/episode".to_string(),
        cache_input: "https://example.com/episode".to_string(),
        transcript: TranscriptData {
            video_id: Some("vid1".to_string()),
            title: "Test Episode".to_string(),
            duration_seconds: duration,
            segments,
        },
        model: "gpt-4o".to_string(),
        output_language: None,
    }
}

fn engine_with<G: ModelGateway + 'static>(
    gateway: Arc<G>,
    cache_dir: &std::path::Path,
) -> Arc<AnalysisEngine> {
    let template = PromptTemplate::builtin();
    let cache = CacheStore::new(cache_dir, template.hash()).unwrap();
    Arc::new(AnalysisEngine::new(
        gateway,
        JobStore::new(),
        cache,
        template,
        AnalysisConfig::default(),
    ))
}

async fn wait_terminal(engine: &AnalysisEngine, job_id: Uuid) -> Job {
    for _ in 0..500 {
        let job = engine.poll(job_id).unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

fn macro_content() -> String {
    json!({
        "summary": "A conversation about craft.",
        "narrative_arc": [{"phase": "Setup", "description": "Guest introduced"}],
        "learning_moments": []
    })
    .to_string()
}

fn moments_content(names: &[&str]) -> String {
    let moments: Vec<_> = names
        .iter()
        .map(|n| json!({"technique_name": n, "category": "Host Technique"}))
        .collect();
    json!({"learning_moments": moments}).to_string()
}

#[tokio::test]
async fn macro_failure_fails_the_job_and_writes_no_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let gateway = ScriptedGateway::new(vec![Ok("I will not produce JSON today.".to_string())]);
    let engine = engine_with(Arc::clone(&gateway), tmp.path());

    let receipt = engine.submit(request(segments_every_30s(450.0)));
    assert_eq!(receipt.status, JobStatus::Queued);

    let job = wait_terminal(&engine, receipt.job_id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().is_some_and(|e| !e.is_empty()));
    assert!(job.result.is_none());

    // Only the macro call was made, and nothing was cached.
    assert_eq!(gateway.calls(), 1);
    assert!(engine.list_history().is_empty());
}

#[tokio::test]
async fn malformed_micro_chunk_degrades_but_completes() {
    let tmp = tempfile::tempdir().unwrap();
    // Segments through 700s with 300s windows / 60s overlap plan three
    // chunks; the middle one returns garbage.
    let gateway = ScriptedGateway::new(vec![
        Ok(macro_content()),
        Ok(moments_content(&["Cold open", "Callback"])),
        Ok("```json\n{broken".to_string()),
        Ok(moments_content(&["Cliffhanger"])),
    ]);
    let engine = engine_with(Arc::clone(&gateway), tmp.path());

    let receipt = engine.submit(request(segments_every_30s(700.0)));
    let job = wait_terminal(&engine, receipt.job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(gateway.calls(), 4);

    let analysis = &job.result.as_ref().unwrap().analysis;
    assert_eq!(analysis.summary, "A conversation about craft.");
    assert_eq!(analysis.narrative_arc.len(), 1);

    // Chunk order survives the merge; the failed chunk contributes nothing.
    let names: Vec<&str> = analysis
        .learning_moments
        .iter()
        .map(|m| m["technique_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Cold open", "Callback", "Cliffhanger"]);
}

#[tokio::test]
async fn completed_analysis_is_cached_and_served_without_calls() {
    let tmp = tempfile::tempdir().unwrap();
    let gateway = ScriptedGateway::new(vec![
        Ok(macro_content()),
        Ok(moments_content(&["Hook"])),
        Ok(moments_content(&[])),
    ]);
    let engine = engine_with(Arc::clone(&gateway), tmp.path());

    let receipt = engine.submit(request(segments_every_30s(450.0)));
    let job = wait_terminal(&engine, receipt.job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    let calls_after_first = gateway.calls();

    let history = engine.list_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].title, "Test Episode");
    assert_eq!(history[0].model, "gpt-4o");

    // Identical request: synchronously completed job, no new model calls.
    let second = engine.submit(request(segments_every_30s(450.0)));
    assert_eq!(second.status, JobStatus::Completed);
    let cached_job = engine.poll(second.job_id).unwrap();
    assert_eq!(cached_job.status, JobStatus::Completed);
    assert_eq!(
        cached_job.result.unwrap().analysis.summary,
        "A conversation about craft."
    );
    assert_eq!(gateway.calls(), calls_after_first);
}

#[tokio::test]
async fn cancelling_a_running_job_fails_it_before_the_next_chunk() {
    let tmp = tempfile::tempdir().unwrap();
    // Two chunks planned; the gate pauses the first chunk call (call 2,
    // after the macro pass) so the job can be cancelled mid-flight.
    let gateway = GatedGateway::new(
        vec![
            Ok(macro_content()),
            Ok(moments_content(&["Hook"])),
            Ok(moments_content(&["Callback"])),
        ],
        2,
    );
    let engine = engine_with(Arc::clone(&gateway), tmp.path());

    let receipt = engine.submit(request(segments_every_30s(450.0)));
    gateway.reached.notified().await;
    engine.cancel(receipt.job_id);
    gateway.release.notify_one();

    let job = wait_terminal(&engine, receipt.job_id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("cancelled"));
    assert!(job.result.is_none());

    // The in-flight call was allowed to finish; the second chunk was
    // never sent, and nothing reached the cache.
    assert_eq!(gateway.calls(), 2);
    assert!(engine.list_history().is_empty());
}

#[tokio::test]
async fn empty_transcript_fails_before_any_model_call() {
    let tmp = tempfile::tempdir().unwrap();
    let gateway = ScriptedGateway::new(vec![]);
    let engine = engine_with(Arc::clone(&gateway), tmp.path());

    let receipt = engine.submit(request(Vec::new()));
    let job = wait_terminal(&engine, receipt.job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("no transcript"));
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn history_items_can_be_fetched_and_deleted_by_key() {
    let tmp = tempfile::tempdir().unwrap();
    let gateway = ScriptedGateway::new(vec![
        Ok(macro_content()),
        Ok(moments_content(&["Hook"])),
        Ok(moments_content(&[])),
    ]);
    let engine = engine_with(gateway, tmp.path());

    let receipt = engine.submit(request(segments_every_30s(450.0)));
    wait_terminal(&engine, receipt.job_id).await;

    let key = engine.list_history()[0].key.clone();
    let item = engine.get_history_item(&key).unwrap();
    assert_eq!(item.meta.title, "Test Episode");
    assert!(engine.get_history_item("feedface").is_err());

    assert_eq!(engine.delete_history(&[key.clone()]), 1);
    assert!(engine.list_history().is_empty());
    assert!(engine.get_history_item(&key).is_err());
}

#[tokio::test]
async fn polling_an_unknown_job_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = engine_with(ScriptedGateway::new(vec![]), tmp.path());
    assert!(engine.poll(Uuid::new_v4()).is_err());
}
