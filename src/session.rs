use crate::config::AnalysisConfig;
use crate::cost::CostAccumulator;
use crate::error::RunError;
use crate::events::{self, timestamp, Event, EventSink, RunOutcome};
use crate::graph::{build_snapshot, visualization_config, GraphSnapshot};
use crate::phase::{progress, Phase, GRAPH_LIVE_PHASES};
use crate::request::AnalysisSubject;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub phases: Vec<Phase>,
    pub latency_scale: f64,
    pub max_run: Duration,
    pub rng_seed: Option<u64>,
}

impl GraphSettings {
    pub fn from_config(cfg: &AnalysisConfig) -> Self {
        Self {
            phases: GRAPH_LIVE_PHASES.to_vec(),
            latency_scale: cfg.latency_scale,
            max_run: cfg.max_run(),
            rng_seed: None,
        }
    }
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

/// Response body of a static graph request.
#[derive(Debug, Clone, Serialize)]
pub struct StaticGraph {
    #[serde(flatten)]
    pub snapshot: GraphSnapshot,
    pub visualization_config: Value,
}

pub struct GraphSessionDriver {
    settings: GraphSettings,
}

impl GraphSessionDriver {
    pub fn new(settings: GraphSettings) -> Self {
        Self { settings }
    }

    /// Single generation at seed 0.
    pub fn static_graph(&self, focus: Option<&str>) -> StaticGraph {
        StaticGraph {
            snapshot: build_snapshot(focus, 0, timestamp()),
            visualization_config: visualization_config(),
        }
    }

    /// Initial graph, one regenerated graph per live phase, then completion.
    pub async fn run_live(&self, subject: AnalysisSubject, sink: EventSink) -> RunOutcome {
        let run_id = uuid::Uuid::new_v4().to_string();
        info!(
            "graph session {} started for {} ({} updates)",
            run_id,
            subject.describe(),
            self.settings.phases.len()
        );

        let limit = self.settings.max_run;
        let result = events::supervise(limit, self.execute(&run_id, &subject, &sink)).await;
        events::conclude(&run_id, result, &sink).await
    }

    async fn execute(
        &self,
        run_id: &str,
        subject: &AnalysisSubject,
        sink: &EventSink,
    ) -> Result<(), RunError> {
        let focus = subject
            .vendor_id
            .as_deref()
            .or(subject.threat_id.as_deref());
        let mut rng = match self.settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut cost = CostAccumulator::new();
        let scale = self.settings.latency_scale * subject.analysis_type.latency_factor();
        let phases = &self.settings.phases;
        let total = phases.len();

        let mut current = build_snapshot(focus, 0, timestamp());
        sink.emit(Event::GraphInitial {
            timestamp: timestamp(),
            graph_data: Box::new(current.clone()),
        })
        .await?;

        for (idx, phase) in phases.iter().enumerate() {
            sink.pause(phase.scaled_duration(scale)).await?;

            let seed = (idx + 1) as u32;
            let next = build_snapshot(focus, seed, timestamp());
            cost.add_cost(phase.unit_cost);

            let before = current.risk_assessment.overall_risk_score as i64;
            let after = next.risk_assessment.overall_risk_score as i64;
            let changes = json!({
                "new_threats": rng.gen_range(0..=3u32),
                "updated_nodes": rng.gen_range(1..=6u32),
                "new_connections": next.metadata.new_edge_count,
                "risk_score_delta": after - before,
                "risk_level": next.risk_assessment.overall_risk_level,
            });

            debug!(
                "graph session {}: {} at variation {} (score {} -> {})",
                run_id, phase.name, seed, before, after
            );

            sink.emit(Event::GraphUpdate {
                timestamp: timestamp(),
                step: phase.name.to_string(),
                graph_data: Box::new(next.clone()),
                changes,
                progress: progress(idx + 1, total),
            })
            .await?;
            current = next;
        }

        let summary = json!({
            "run_id": run_id,
            "total_updates": total,
            "final_risk_score": current.risk_assessment.overall_risk_score,
            "final_risk_level": current.risk_assessment.overall_risk_level,
            "node_count": current.metadata.node_count,
            "edge_count": current.metadata.edge_count,
            "total_cost": cost.total(),
        });
        sink.emit(Event::GraphComplete {
            message: format!("Live network analysis complete for {}", subject.describe()),
            timestamp: timestamp(),
            summary,
            graph_data: Box::new(current),
        })
        .await?;
        sink.emit(Event::End).await
    }
}
