use async_trait::async_trait;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use supply_sentinel::analysis::{AnalysisOrchestrator, AnalysisSettings};
use supply_sentinel::cost::Micros;
use supply_sentinel::error::ProviderError;
use supply_sentinel::events::{self, RunOutcome};
use supply_sentinel::findings::{Finding, FindingProvider, SyntheticFindingProvider};
use supply_sentinel::introspection::event_schema;
use supply_sentinel::phase::ANALYSIS_PHASES;
use supply_sentinel::request::{AnalysisRequest, AnalysisSubject};

fn subject() -> AnalysisSubject {
    AnalysisRequest {
        vendor_id: Some("V002".into()),
        ..AnalysisRequest::default()
    }
    .validate()
    .unwrap()
}

fn settings() -> AnalysisSettings {
    AnalysisSettings {
        rng_seed: Some(7),
        ..AnalysisSettings::default()
    }
}

fn seeded() -> Arc<dyn FindingProvider> {
    Arc::new(SyntheticFindingProvider::default().with_seed(42))
}

/// Run to completion, collecting every frame as JSON.
async fn collect(
    settings: AnalysisSettings,
    provider: Arc<dyn FindingProvider>,
) -> (Vec<Value>, RunOutcome) {
    let (sink, mut rx) = events::channel(8);
    let orchestrator = AnalysisOrchestrator::new(settings, provider);
    let handle = tokio::spawn(async move { orchestrator.run(subject(), sink).await });

    let mut frames = Vec::new();
    while let Some(ev) = rx.recv().await {
        frames.push(serde_json::to_value(&ev).unwrap());
    }
    (frames, handle.await.unwrap())
}

fn types(frames: &[Value]) -> Vec<&str> {
    frames.iter().map(|f| f["type"].as_str().unwrap()).collect()
}

struct FailingProvider;

#[async_trait]
impl FindingProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn findings(
        &self,
        _subject: &AnalysisSubject,
        _count: usize,
    ) -> Result<Vec<Finding>, ProviderError> {
        Err(ProviderError {
            provider: "failing".into(),
            message: "inference backend unavailable".into(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn completed_run_reports_every_phase_in_order() {
    let (frames, outcome) = collect(settings(), seeded()).await;
    assert!(matches!(outcome, RunOutcome::Completed));

    let kinds = types(&frames);
    assert_eq!(kinds.first(), Some(&"status"));
    assert_eq!(&kinds[kinds.len() - 2..], &["analysis_complete", "end"]);

    let completed: Vec<&Value> = frames.iter().filter(|f| f["type"] == "step_complete").collect();
    assert_eq!(completed.len(), ANALYSIS_PHASES.len());
    for (frame, phase) in completed.iter().zip(ANALYSIS_PHASES.iter()) {
        assert_eq!(frame["step"], phase.name);
    }

    let progress: Vec<u64> = completed.iter().map(|f| f["progress"].as_u64().unwrap()).collect();
    assert!(progress.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(progress.last(), Some(&100));
}

#[tokio::test(start_paused = true)]
async fn running_total_matches_sum_of_unit_costs() {
    let (frames, _) = collect(settings(), seeded()).await;

    let mut expected = Micros::ZERO;
    for frame in frames.iter().filter(|f| f["type"] == "step_complete") {
        let phase = ANALYSIS_PHASES
            .iter()
            .find(|p| frame["step"] == p.name)
            .unwrap();
        expected = expected + phase.unit_cost;
        assert_eq!(frame["cost"].as_f64().unwrap(), phase.unit_cost.usd());
        assert_eq!(frame["total_cost"].as_f64().unwrap(), expected.usd());
    }

    let done = frames.iter().find(|f| f["type"] == "analysis_complete").unwrap();
    assert_eq!(done["results"]["total_cost"].as_f64().unwrap(), expected.usd());
}

#[tokio::test(start_paused = true)]
async fn findings_stream_inside_ai_processing() {
    let (frames, _) = collect(settings(), seeded()).await;
    let kinds = types(&frames);

    let start = frames
        .iter()
        .position(|f| f["type"] == "step_start" && f["step"] == "ai-processing")
        .unwrap();
    let end = frames
        .iter()
        .position(|f| f["type"] == "step_complete" && f["step"] == "ai-processing")
        .unwrap();
    let threats: Vec<usize> = kinds
        .iter()
        .enumerate()
        .filter(|(_, k)| **k == "threat-detected")
        .map(|(i, _)| i)
        .collect();

    assert!((3..=8).contains(&threats.len()));
    assert!(threats.iter().all(|i| *i > start && *i < end));
    assert_eq!(frames[end]["findings_count"], threats.len());

    let done = frames.iter().find(|f| f["type"] == "analysis_complete").unwrap();
    assert_eq!(done["results"]["findings_count"], threats.len());
}

#[tokio::test(start_paused = true)]
async fn budget_overrun_stops_with_single_error_frame() {
    let settings = AnalysisSettings {
        budget_limit: Micros::from_usd(0.02),
        ..settings()
    };
    let (frames, outcome) = collect(settings, seeded()).await;
    assert!(matches!(outcome, RunOutcome::Failed(_)));

    let kinds = types(&frames);
    assert_eq!(kinds.iter().filter(|k| **k == "error").count(), 1);
    assert_eq!(kinds.last(), Some(&"error"));
    assert!(!kinds.contains(&"end"));
    assert!(!kinds.contains(&"analysis_complete"));
    assert_eq!(frames.last().unwrap()["error"], "budget_exceeded");

    // The warning fires once before the overrun.
    let warnings = frames
        .iter()
        .filter(|f| f["type"] == "status" && f["step"] == "budget")
        .count();
    assert_eq!(warnings, 1);
}

#[tokio::test(start_paused = true)]
async fn provider_failure_is_reported_as_upstream() {
    let (frames, outcome) = collect(settings(), Arc::new(FailingProvider)).await;
    assert!(matches!(outcome, RunOutcome::Failed(_)));

    let last = frames.last().unwrap();
    assert_eq!(last["type"], "error");
    assert_eq!(last["error"], "upstream_failure");
    assert!(last["message"].as_str().unwrap().contains("unavailable"));
    assert!(!types(&frames).contains(&"threat-detected"));
}

#[tokio::test(start_paused = true)]
async fn run_past_time_limit_times_out() {
    let settings = AnalysisSettings {
        max_run: Duration::from_secs(2),
        ..settings()
    };
    let (frames, outcome) = collect(settings, seeded()).await;
    assert!(matches!(outcome, RunOutcome::Failed(_)));
    assert_eq!(frames.last().unwrap()["error"], "timeout");
    assert!(!types(&frames).contains(&"end"));
}

#[tokio::test(start_paused = true)]
async fn client_disconnect_stops_the_run_quietly() {
    let (sink, mut rx) = events::channel(8);
    let orchestrator = AnalysisOrchestrator::new(settings(), seeded());
    let handle = tokio::spawn(async move { orchestrator.run(subject(), sink).await });

    let first = rx.recv().await.unwrap();
    assert_eq!(first.kind(), "status");
    drop(rx);

    let outcome = handle.await.unwrap();
    assert!(matches!(outcome, RunOutcome::Disconnected));
}

#[tokio::test(start_paused = true)]
async fn quick_runs_finish_sooner() {
    let start = tokio::time::Instant::now();
    let _ = collect(settings(), seeded()).await;
    let full = start.elapsed();

    let (sink, mut rx) = events::channel(8);
    let orchestrator = AnalysisOrchestrator::new(settings(), seeded());
    let quick = AnalysisRequest {
        query: Some("log4j".into()),
        analysis_type: supply_sentinel::request::AnalysisType::Quick,
        ..AnalysisRequest::default()
    }
    .validate()
    .unwrap();
    let start = tokio::time::Instant::now();
    let handle = tokio::spawn(async move { orchestrator.run(quick, sink).await });
    while rx.recv().await.is_some() {}
    assert!(matches!(handle.await.unwrap(), RunOutcome::Completed));
    assert!(start.elapsed() < full);
}

#[tokio::test(start_paused = true)]
async fn every_frame_matches_event_schema() {
    let schema = jsonschema::JSONSchema::compile(&event_schema()).unwrap();
    let (frames, _) = collect(settings(), seeded()).await;
    for frame in &frames {
        assert!(schema.is_valid(frame), "frame failed schema: {frame}");
    }
}

struct PanickingProvider;

#[async_trait]
impl FindingProvider for PanickingProvider {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn findings(
        &self,
        _subject: &AnalysisSubject,
        _count: usize,
    ) -> Result<Vec<Finding>, ProviderError> {
        panic!("model crashed")
    }
}

#[tokio::test(start_paused = true)]
async fn provider_panic_still_sends_error_frame() {
    let (frames, outcome) = collect(settings(), Arc::new(PanickingProvider)).await;
    assert!(matches!(outcome, RunOutcome::Failed(_)));

    let kinds = types(&frames);
    assert_eq!(kinds.iter().filter(|k| **k == "error").count(), 1);
    assert!(!kinds.contains(&"end"));

    let last = frames.last().unwrap();
    assert_eq!(last["type"], "error");
    assert_eq!(last["error"], "upstream_failure");
    assert!(last["message"].as_str().unwrap().contains("model crashed"));
}
