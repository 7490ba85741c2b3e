use crate::config::AnalysisConfig;
use crate::cost::{BudgetDecision, BudgetGuard, CostAccumulator, Micros};
use crate::error::RunError;
use crate::events::{self, timestamp, Event, EventSink, RunOutcome};
use crate::findings::{Finding, FindingProvider};
use crate::phase::{progress, Phase, AI_PROCESSING, ANALYSIS_PHASES, RISK_ASSESSMENT};
use crate::request::AnalysisSubject;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::{json, Map, Value};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const MODELS_USED: [&str; 3] = [
    "gemini-1.5-flash",
    "text-embedding-004",
    "supply-chain-risk-classifier",
];

const DATA_SOURCES: [&str; 3] = ["vendor_profiles", "threat_reports", "cve_feed"];

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub phases: Vec<Phase>,
    pub findings_min: usize,
    pub findings_max: usize,
    pub finding_pacing: Duration,
    pub latency_scale: f64,
    pub max_run: Duration,
    pub budget_limit: Micros,
    pub budget_warning_percent: f64,
    /// Fixed seed for per-run sampling (finding count, search stats).
    pub rng_seed: Option<u64>,
}

impl AnalysisSettings {
    pub fn from_config(cfg: &AnalysisConfig) -> Self {
        Self {
            phases: ANALYSIS_PHASES.to_vec(),
            findings_min: cfg.findings_min,
            findings_max: cfg.findings_max.max(cfg.findings_min),
            finding_pacing: cfg.finding_pacing(),
            latency_scale: cfg.latency_scale,
            max_run: cfg.max_run(),
            budget_limit: Micros::from_usd(cfg.max_run_cost_usd),
            budget_warning_percent: cfg.budget_warning_percent,
            rng_seed: None,
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

/// Per-run state, owned by the run for its whole duration.
struct AnalysisSession {
    run_id: String,
    subject: AnalysisSubject,
    cost: CostAccumulator,
    budget: BudgetGuard,
    rng: StdRng,
    findings: Vec<Finding>,
    started: Instant,
}

pub struct AnalysisOrchestrator {
    settings: AnalysisSettings,
    provider: Arc<dyn FindingProvider>,
}

impl AnalysisOrchestrator {
    pub fn new(settings: AnalysisSettings, provider: Arc<dyn FindingProvider>) -> Self {
        Self { settings, provider }
    }

    /// Run every phase for `subject`, pushing frames into `sink`.
    ///
    /// The sink is dropped on return, which closes the stream.
    pub async fn run(&self, subject: AnalysisSubject, sink: EventSink) -> RunOutcome {
        let mut session = AnalysisSession {
            run_id: uuid::Uuid::new_v4().to_string(),
            subject,
            cost: CostAccumulator::new(),
            budget: BudgetGuard::new(
                self.settings.budget_limit,
                self.settings.budget_warning_percent,
            ),
            rng: match self.settings.rng_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
            findings: Vec::new(),
            started: Instant::now(),
        };

        info!(
            "analysis {} started for {} ({} phases, provider={})",
            session.run_id,
            session.subject.describe(),
            self.settings.phases.len(),
            self.provider.name()
        );

        let limit = self.settings.max_run;
        let result = events::supervise(limit, self.execute(&mut session, &sink)).await;
        events::conclude(&session.run_id, result, &sink).await
    }

    async fn execute(&self, s: &mut AnalysisSession, sink: &EventSink) -> Result<(), RunError> {
        let phases = &self.settings.phases;
        let total = phases.len();
        let scale = self.settings.latency_scale * s.subject.analysis_type.latency_factor();

        sink.emit(Event::status(
            "init",
            format!("Starting supply-chain analysis for {}", s.subject.describe()),
        ))
        .await?;

        for (idx, phase) in phases.iter().enumerate() {
            sink.emit(Event::StepStart {
                step: phase.name.to_string(),
                message: phase.message.to_string(),
                timestamp: timestamp(),
                step_number: idx + 1,
                total_steps: total,
                progress: progress(idx, total),
            })
            .await?;

            let wait = phase.scaled_duration(scale);
            sink.pause(wait).await?;

            match s.budget.check(s.cost.total(), phase.unit_cost) {
                BudgetDecision::Block => {
                    return Err(RunError::BudgetExceeded {
                        spent: s.cost.total().usd(),
                        next: phase.unit_cost.usd(),
                        limit: s.budget.limit().usd(),
                    });
                }
                BudgetDecision::Warn(pct) => {
                    warn!(
                        "analysis {}: spend at {}% of {} budget",
                        s.run_id,
                        pct,
                        s.budget.limit()
                    );
                    sink.emit(Event::status(
                        "budget",
                        format!("Run spend at {}% of the {} budget", pct, s.budget.limit()),
                    ))
                    .await?;
                }
                BudgetDecision::Allow => {}
            }
            let total_cost = s.cost.add_cost(phase.unit_cost);

            let details = if phase.name == AI_PROCESSING {
                self.ai_processing(s, sink).await?
            } else {
                phase_details(phase.name, s)
            };

            debug!(
                "analysis {}: {} complete, total {}",
                s.run_id, phase.name, total_cost
            );

            sink.emit(Event::StepComplete {
                step: phase.name.to_string(),
                duration: wait.as_millis() as u64,
                cost: phase.unit_cost,
                total_cost,
                progress: progress(idx + 1, total),
                timestamp: timestamp(),
                details,
            })
            .await?;
        }

        sink.emit(Event::AnalysisComplete {
            message: format!("Analysis complete for {}", s.subject.describe()),
            timestamp: timestamp(),
            results: results(s),
        })
        .await?;
        sink.emit(Event::End).await
    }

    async fn ai_processing(
        &self,
        s: &mut AnalysisSession,
        sink: &EventSink,
    ) -> Result<Map<String, Value>, RunError> {
        let count = s
            .rng
            .gen_range(self.settings.findings_min..=self.settings.findings_max);
        let findings = self.provider.findings(&s.subject, count).await?;

        for (i, finding) in findings.into_iter().enumerate() {
            if i > 0 {
                sink.pause(self.settings.finding_pacing).await?;
            }
            sink.emit(Event::ThreatDetected {
                finding: finding.clone(),
                timestamp: timestamp(),
            })
            .await?;
            s.findings.push(finding);
        }

        let mut details = Map::new();
        details.insert("findings_count".into(), json!(s.findings.len()));
        details.insert("provider".into(), json!(self.provider.name()));
        Ok(details)
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Mean confidence per threat type, highest first.
fn threat_patterns(findings: &[Finding]) -> Vec<Value> {
    let mut by_type: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for f in findings {
        let e = by_type.entry(f.threat_type.as_str()).or_insert((0.0, 0));
        e.0 += f.confidence_score;
        e.1 += 1;
    }
    let mut patterns: Vec<(&str, f64, usize)> = by_type
        .into_iter()
        .map(|(t, (sum, n))| (t, round3(sum / n as f64), n))
        .collect();
    patterns.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    patterns
        .into_iter()
        .map(|(pattern, confidence, occurrences)| {
            json!({ "pattern": pattern, "confidence": confidence, "occurrences": occurrences })
        })
        .collect()
}

fn insights(findings: &[Finding]) -> Vec<String> {
    let mut out = Vec::new();
    if findings.is_empty() {
        out.push("No threats surfaced for this subject".to_string());
        return out;
    }

    let mut vendors: Vec<&str> = findings.iter().map(|f| f.vendor_name.as_str()).collect();
    vendors.sort_unstable();
    vendors.dedup();
    out.push(format!(
        "{} threat(s) detected across {} vendor(s)",
        findings.len(),
        vendors.len()
    ));

    if let Some(worst) = findings.iter().max_by_key(|f| f.severity) {
        out.push(format!(
            "Highest severity {} ({}) at {}",
            worst.severity, worst.threat_type, worst.vendor_name
        ));
    }

    let mut systems: BTreeMap<&str, usize> = BTreeMap::new();
    for f in findings {
        for sys in &f.affected_systems {
            *systems.entry(sys.as_str()).or_default() += 1;
        }
    }
    if let Some((sys, n)) = systems.iter().max_by_key(|(_, n)| **n) {
        out.push(format!("Most exposed system: {sys} ({n} finding(s))"));
    }
    out
}

fn phase_details(name: &str, s: &mut AnalysisSession) -> Map<String, Value> {
    let mut details = Map::new();
    match name {
        "data-preparation" => {
            details.insert("sources".into(), json!(DATA_SOURCES));
            details.insert("subject".into(), json!(s.subject));
        }
        "vector-search" => {
            let similar: u32 = s.rng.gen_range(3..=12);
            details.insert("similar_threats".into(), json!(similar));
            details.insert("embedding_model".into(), json!(MODELS_USED[1]));
            let window = if s.subject.include_historical { 365 } else { 90 };
            details.insert("window_days".into(), json!(window));
        }
        RISK_ASSESSMENT => {
            details.insert("threat_patterns".into(), json!(threat_patterns(&s.findings)));
        }
        "insights-generation" => {
            details.insert("insights".into(), json!(insights(&s.findings)));
        }
        _ => {}
    }
    details
}

/// Overall classification from the most severe finding.
pub fn overall_risk(findings: &[Finding]) -> &'static str {
    match findings.iter().map(|f| f.severity).max() {
        Some(s) if s >= 9 => "critical",
        Some(s) if s >= 7 => "high",
        Some(s) if s >= 4 => "medium",
        _ => "low",
    }
}

fn results(s: &AnalysisSession) -> Value {
    let confidence = if s.findings.is_empty() {
        0.0
    } else {
        round3(s.findings.iter().map(|f| f.confidence_score).sum::<f64>() / s.findings.len() as f64)
    };
    json!({
        "run_id": s.run_id,
        "findings_count": s.findings.len(),
        "overall_risk": overall_risk(&s.findings),
        "confidence": confidence,
        "total_cost": s.cost.total(),
        "elapsed_ms": s.started.elapsed().as_millis() as u64,
        "models_used": MODELS_USED,
    })
}
