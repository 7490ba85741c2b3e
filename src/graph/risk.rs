use super::edges::NetworkEdge;
use super::nodes::{GraphNode, NodeDetail};
use super::{Level, SystemStatus};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBucket {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskBucket {
    /// Canonical bucket of a node classifier. Only a critical system lands in `Critical`.
    pub fn of(detail: &NodeDetail) -> Self {
        match *detail {
            NodeDetail::System { status, .. } => match status {
                SystemStatus::Operational => RiskBucket::Low,
                SystemStatus::Degraded => RiskBucket::Medium,
                SystemStatus::Critical => RiskBucket::Critical,
            },
            _ => match detail.level() {
                Level::Low => RiskBucket::Low,
                Level::Medium => RiskBucket::Medium,
                Level::High => RiskBucket::High,
            },
        }
    }

    pub fn from_score(score: u32) -> Self {
        match score {
            s if s > 50 => RiskBucket::Critical,
            s if s > 30 => RiskBucket::High,
            s if s > 15 => RiskBucket::Medium,
            _ => RiskBucket::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskDistribution {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
    pub critical: u32,
}

impl RiskDistribution {
    fn add(&mut self, bucket: RiskBucket) {
        match bucket {
            RiskBucket::Low => self.low += 1,
            RiskBucket::Medium => self.medium += 1,
            RiskBucket::High => self.high += 1,
            RiskBucket::Critical => self.critical += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub overall_risk_score: u32,
    pub overall_risk_level: RiskBucket,
    pub risk_distribution: RiskDistribution,
    pub high_risk_connections: usize,
    pub recommendations: Vec<String>,
}

fn node_weight(detail: &NodeDetail) -> u32 {
    match *detail {
        NodeDetail::Vendor { risk_level, .. } => 1 + risk_level.rank(),
        NodeDetail::Threat { severity, .. } => 2 + severity.rank(),
        NodeDetail::System { status, .. } => match status {
            SystemStatus::Operational => 1,
            SystemStatus::Degraded => 3,
            SystemStatus::Critical => 4,
        },
        NodeDetail::Dependency { criticality, .. } => 1 + criticality.rank(),
        NodeDetail::ThreatActor { sophistication, .. } => 2 + sophistication.rank(),
    }
}

fn recommendations(
    dist: &RiskDistribution,
    high_edges: usize,
    level: RiskBucket,
) -> Vec<String> {
    let mut out = Vec::new();
    if dist.critical > 0 {
        out.push(format!(
            "Activate incident response for {} critical system(s)",
            dist.critical
        ));
    }
    if dist.high >= 3 {
        out.push(format!(
            "Prioritize security reviews for {} high-risk entities",
            dist.high
        ));
    }
    if dist.medium >= 5 {
        out.push(format!(
            "Schedule follow-up assessments for {} medium-risk entities",
            dist.medium
        ));
    }
    if high_edges >= 5 {
        out.push(format!(
            "Segment network paths carrying {high_edges} high-risk connections"
        ));
    }
    if level == RiskBucket::Critical {
        out.push("Brief executive leadership on critical supply-chain exposure".to_string());
    }
    if out.is_empty() {
        out.push("Maintain continuous monitoring of the vendor network".to_string());
    }
    out
}

/// Aggregate one graph snapshot into a weighted score, level and recommendations.
///
/// An edge counts at the higher of its stored level and its endpoints' levels,
/// so a stale edge can never understate risk.
pub fn assess(nodes: &[GraphNode], edges: &[NetworkEdge]) -> RiskAssessment {
    let mut score: u32 = 0;
    let mut dist = RiskDistribution::default();
    let mut levels: HashMap<&str, Level> = HashMap::with_capacity(nodes.len());

    for node in nodes {
        score += node_weight(&node.detail);
        dist.add(RiskBucket::of(&node.detail));
        levels.insert(node.id.as_str(), node.detail.level());
    }

    let mut high_edges = 0;
    for e in edges {
        let level = [
            Some(e.risk_level),
            levels.get(e.source.as_str()).copied(),
            levels.get(e.target.as_str()).copied(),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(e.risk_level);

        score += level.rank();
        if level == Level::High {
            high_edges += 1;
        }
    }

    let level = RiskBucket::from_score(score);
    RiskAssessment {
        overall_risk_score: score,
        overall_risk_level: level,
        risk_distribution: dist,
        high_risk_connections: high_edges,
        recommendations: recommendations(&dist, high_edges, level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edges::generate_edges;
    use crate::graph::nodes::generate_nodes;

    fn snapshot(seed: u32) -> (Vec<GraphNode>, Vec<NetworkEdge>) {
        let c = generate_nodes(None, seed);
        let e = generate_edges(&c, seed);
        (c.into_nodes(), e)
    }

    #[test]
    fn thresholds() {
        assert_eq!(RiskBucket::from_score(0), RiskBucket::Low);
        assert_eq!(RiskBucket::from_score(15), RiskBucket::Low);
        assert_eq!(RiskBucket::from_score(16), RiskBucket::Medium);
        assert_eq!(RiskBucket::from_score(31), RiskBucket::High);
        assert_eq!(RiskBucket::from_score(51), RiskBucket::Critical);
    }

    #[test]
    fn empty_graph_is_low_with_fallback_recommendation() {
        let r = assess(&[], &[]);
        assert_eq!(r.overall_risk_score, 0);
        assert_eq!(r.overall_risk_level, RiskBucket::Low);
        assert_eq!(r.recommendations.len(), 1);
    }

    #[test]
    fn node_weights_at_seed_zero() {
        let (nodes, _) = snapshot(0);
        let total: u32 = nodes.iter().map(|n| node_weight(&n.detail)).sum();
        // ranks per type are 0,1,2,0,1: vendor 9, threat 14, system 12, dependency 9, actor 14.
        assert_eq!(total, 58);
    }

    #[test]
    fn distribution_counts_every_node_once() {
        let (nodes, edges) = snapshot(3);
        let r = assess(&nodes, &edges);
        let d = r.risk_distribution;
        assert_eq!((d.low + d.medium + d.high + d.critical) as usize, nodes.len());
        assert!(d.critical <= 5);
    }

    #[test]
    fn raising_a_classifier_never_lowers_the_score() {
        let (mut nodes, edges) = snapshot(0);
        let target = nodes.iter().position(|n| n.id == "V001").unwrap();
        let mut last = 0;
        for level in [Level::Low, Level::Medium, Level::High] {
            nodes[target].detail = NodeDetail::Vendor {
                risk_level: level,
                confidence: 0.9,
            };
            let score = assess(&nodes, &edges).overall_risk_score;
            assert!(score >= last, "{level:?}: {score} < {last}");
            last = score;
        }
    }

    #[test]
    fn assessment_is_deterministic() {
        let (n1, e1) = snapshot(2);
        let (n2, e2) = snapshot(2);
        assert_eq!(assess(&n1, &e1), assess(&n2, &e2));
    }
}
