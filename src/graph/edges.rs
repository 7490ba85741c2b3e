use super::nodes::{GraphNode, NodeCollections};
use super::Level;
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    DataFlow,
    AttackVector,
    TrustRelationship,
    Dependency,
    ThreatConnection,
}

impl EdgeType {
    pub fn label(self) -> &'static str {
        match self {
            EdgeType::DataFlow => "Data Flow",
            EdgeType::AttackVector => "Attack Vector",
            EdgeType::TrustRelationship => "Trust Relationship",
            EdgeType::Dependency => "Depends On",
            EdgeType::ThreatConnection => "Attributed To",
        }
    }

    /// Modulus of the inclusion rule for this pair type.
    pub fn modulus(self) -> usize {
        match self {
            EdgeType::DataFlow | EdgeType::TrustRelationship => 3,
            EdgeType::AttackVector | EdgeType::Dependency | EdgeType::ThreatConnection => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub label: String,
    pub properties: Map<String, Value>,
    pub risk_level: Level,
    pub color: String,
    pub width: u32,
    pub is_new: bool,
}

/// Pair `(a, b)` is connected for `seed` when `(a + b + seed) mod k == 0`.
pub fn includes(a: usize, b: usize, seed: u32, k: usize) -> bool {
    (a + b + seed as usize) % k == 0
}

/// Secondary rule flagging edges as newly discovered at this step.
pub fn is_new(a: usize, b: usize, seed: u32) -> bool {
    seed > 0 && (a + 2 * b + seed as usize) % 5 == 0
}

fn edge(
    source: &GraphNode,
    target: &GraphNode,
    a: usize,
    b: usize,
    seed: u32,
    edge_type: EdgeType,
) -> NetworkEdge {
    let risk = source.detail.level().max(target.detail.level());

    let mut properties = Map::new();
    properties.insert(
        "strength".to_string(),
        json!(0.5 + ((a * b + seed as usize) % 5) as f64 / 10.0),
    );
    properties.insert(
        "bidirectional".to_string(),
        json!(edge_type == EdgeType::TrustRelationship),
    );
    if edge_type == EdgeType::DataFlow {
        let protocol = ["https", "sftp", "grpc"][(a + b) % 3];
        properties.insert("protocol".to_string(), json!(protocol));
    }

    NetworkEdge {
        id: format!("{}-{}", source.id, target.id),
        source: source.id.clone(),
        target: target.id.clone(),
        edge_type,
        label: edge_type.label().to_string(),
        properties,
        risk_level: risk,
        color: risk.color().to_string(),
        width: 1 + risk.rank(),
        is_new: is_new(a, b, seed),
    }
}

fn connect(
    out: &mut Vec<NetworkEdge>,
    from: &[GraphNode],
    to: &[GraphNode],
    seed: u32,
    edge_type: EdgeType,
) {
    let k = edge_type.modulus();
    for (a, src) in from.iter().enumerate() {
        for (b, dst) in to.iter().enumerate() {
            if includes(a, b, seed, k) {
                out.push(edge(src, dst, a, b, seed, edge_type));
            }
        }
    }
}

/// Generate all edges for one variation seed.
pub fn generate_edges(nodes: &NodeCollections, seed: u32) -> Vec<NetworkEdge> {
    let mut out = Vec::new();
    connect(&mut out, &nodes.vendors, &nodes.systems, seed, EdgeType::DataFlow);
    connect(&mut out, &nodes.threats, &nodes.systems, seed, EdgeType::AttackVector);
    connect(&mut out, &nodes.actors, &nodes.threats, seed, EdgeType::ThreatConnection);
    connect(&mut out, &nodes.systems, &nodes.dependencies, seed, EdgeType::Dependency);

    // vendor <-> vendor: unordered pairs only, no self loops.
    let k = EdgeType::TrustRelationship.modulus();
    for (a, src) in nodes.vendors.iter().enumerate() {
        for (b, dst) in nodes.vendors.iter().enumerate().skip(a + 1) {
            if includes(a, b, seed, k) {
                out.push(edge(src, dst, a, b, seed, EdgeType::TrustRelationship));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::nodes::generate_nodes;
    use std::collections::HashMap;

    #[test]
    fn edge_risk_is_at_least_both_endpoints() {
        for seed in 0..8 {
            let collections = generate_nodes(None, seed);
            let edges = generate_edges(&collections, seed);
            let levels: HashMap<String, Level> = collections
                .into_nodes()
                .into_iter()
                .map(|n| (n.id.clone(), n.detail.level()))
                .collect();
            for e in &edges {
                assert!(e.risk_level >= levels[&e.source]);
                assert!(e.risk_level >= levels[&e.target]);
                assert_eq!(e.color, e.risk_level.color());
            }
        }
    }

    #[test]
    fn vendor_system_rule_at_seed_zero() {
        let collections = generate_nodes(None, 0);
        let edges = generate_edges(&collections, 0);
        let data_flows: Vec<_> = edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::DataFlow)
            .map(|e| e.id.as_str())
            .collect();
        // (i + j) % 3 == 0 over 5x5.
        assert_eq!(data_flows.len(), 8);
        assert!(data_flows.contains(&"V001-S001"));
        assert!(data_flows.contains(&"V002-S003"));
        assert!(!data_flows.contains(&"V001-S002"));
    }

    #[test]
    fn trust_edges_have_no_self_loops() {
        for seed in 0..3 {
            let edges = generate_edges(&generate_nodes(None, seed), seed);
            for e in edges.iter().filter(|e| e.edge_type == EdgeType::TrustRelationship) {
                assert_ne!(e.source, e.target);
            }
        }
    }

    #[test]
    fn nothing_is_new_at_seed_zero() {
        let edges = generate_edges(&generate_nodes(None, 0), 0);
        assert!(edges.iter().all(|e| !e.is_new));
        assert!(is_new(0, 0, 5));
        assert!(!is_new(0, 0, 4));
    }

    #[test]
    fn topology_changes_with_seed() {
        let ids = |seed| {
            generate_edges(&generate_nodes(None, seed), seed)
                .into_iter()
                .map(|e| e.id)
                .collect::<Vec<_>>()
        };
        assert_ne!(ids(0), ids(1));
        assert_eq!(ids(1), ids(1));
    }
}
