use crate::cost::Micros;
use std::time::Duration;

/// One named step of a streamed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub name: &'static str,
    pub message: &'static str,
    /// Simulated processing time before the phase completes.
    pub duration_ms: u64,
    pub unit_cost: Micros,
}

impl Phase {
    /// Phase latency after applying a scale factor (0 disables waiting).
    pub fn scaled_duration(&self, scale: f64) -> Duration {
        if !scale.is_finite() || scale <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_millis((self.duration_ms as f64 * scale).round() as u64)
    }
}

pub const AI_PROCESSING: &str = "ai-processing";
pub const RISK_ASSESSMENT: &str = "risk-assessment";

pub const ANALYSIS_PHASES: [Phase; 5] = [
    Phase {
        name: "data-preparation",
        message: "Preparing vendor profiles and threat intelligence feeds",
        duration_ms: 1_000,
        unit_cost: Micros(2_500),
    },
    Phase {
        name: AI_PROCESSING,
        message: "Running AI threat classification over prepared records",
        duration_ms: 2_000,
        unit_cost: Micros(15_000),
    },
    Phase {
        name: "vector-search",
        message: "Searching embeddings for similar historical threats",
        duration_ms: 1_500,
        unit_cost: Micros(8_000),
    },
    Phase {
        name: RISK_ASSESSMENT,
        message: "Scoring supply-chain risk and threat patterns",
        duration_ms: 1_200,
        unit_cost: Micros(5_000),
    },
    Phase {
        name: "insights-generation",
        message: "Generating executive insights and recommendations",
        duration_ms: 1_000,
        unit_cost: Micros(3_500),
    },
];

pub const GRAPH_LIVE_PHASES: [Phase; 5] = [
    Phase {
        name: "threat-detection",
        message: "Detecting new threats across the vendor network",
        duration_ms: 2_000,
        unit_cost: Micros(4_000),
    },
    Phase {
        name: "risk-assessment",
        message: "Re-assessing node and connection risk",
        duration_ms: 1_500,
        unit_cost: Micros(3_000),
    },
    Phase {
        name: "graph-update",
        message: "Updating network relationships",
        duration_ms: 1_500,
        unit_cost: Micros(2_000),
    },
    Phase {
        name: "anomaly-detection",
        message: "Scanning for anomalous connection patterns",
        duration_ms: 2_000,
        unit_cost: Micros(4_000),
    },
    Phase {
        name: "final-update",
        message: "Finalizing network risk graph",
        duration_ms: 1_000,
        unit_cost: Micros(1_000),
    },
];

/// Progress percentage after `done` of `total` phases, 0..=100.
pub fn progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn phase_names_are_unique() {
        for list in [&ANALYSIS_PHASES, &GRAPH_LIVE_PHASES] {
            let names: HashSet<_> = list.iter().map(|p| p.name).collect();
            assert_eq!(names.len(), list.len());
        }
    }

    #[test]
    fn analysis_list_contains_designated_phases() {
        assert!(ANALYSIS_PHASES.iter().any(|p| p.name == AI_PROCESSING));
        assert!(ANALYSIS_PHASES.iter().any(|p| p.name == RISK_ASSESSMENT));
    }

    #[test]
    fn progress_reaches_exactly_100() {
        assert_eq!(progress(0, 5), 0);
        assert_eq!(progress(2, 5), 40);
        assert_eq!(progress(5, 5), 100);
        assert_eq!(progress(3, 0), 100);
    }

    #[test]
    fn scaled_duration_handles_zero_and_fractions() {
        let p = ANALYSIS_PHASES[0];
        assert_eq!(p.scaled_duration(0.0), Duration::ZERO);
        assert_eq!(p.scaled_duration(0.5), Duration::from_millis(500));
    }
}
