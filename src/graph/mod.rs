//! Network risk graph: typed nodes, modulo-rule edges and a weighted risk
//! assessment, all pure functions of a variation seed.

pub mod edges;
pub mod nodes;
pub mod risk;

use serde::Serialize;
use serde_json::{json, Map, Value};

pub use edges::{generate_edges, EdgeType, NetworkEdge};
pub use nodes::{generate_nodes, GraphNode, NodeCollections, NodeDetail, NodeType};
pub use risk::{assess, RiskAssessment, RiskBucket};

/// Three-level classifier shared by vendors, threats, dependencies and actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub fn from_rank(rank: usize) -> Self {
        match rank % 3 {
            0 => Level::Low,
            1 => Level::Medium,
            _ => Level::High,
        }
    }

    pub fn rank(self) -> u32 {
        match self {
            Level::Low => 0,
            Level::Medium => 1,
            Level::High => 2,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Level::Low => "#10b981",
            Level::Medium => "#f59e0b",
            Level::High => "#ef4444",
        }
    }
}

/// Operational state of an internal system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Operational,
    Degraded,
    Critical,
}

impl SystemStatus {
    pub fn from_rank(rank: usize) -> Self {
        match rank % 3 {
            0 => SystemStatus::Operational,
            1 => SystemStatus::Degraded,
            _ => SystemStatus::Critical,
        }
    }

    /// Equivalent position on the common low/medium/high scale.
    pub fn level(self) -> Level {
        match self {
            SystemStatus::Operational => Level::Low,
            SystemStatus::Degraded => Level::Medium,
            SystemStatus::Critical => Level::High,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            SystemStatus::Operational => "#10b981",
            SystemStatus::Degraded => "#f59e0b",
            SystemStatus::Critical => "#dc2626",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphMetadata {
    pub variation: u32,
    pub node_count: usize,
    pub edge_count: usize,
    pub node_counts: Map<String, Value>,
    pub new_edge_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    pub generated_at: String,
}

/// One full graph generation.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<NetworkEdge>,
    pub risk_assessment: RiskAssessment,
    pub metadata: GraphMetadata,
}

/// Build nodes, edges and the risk assessment for one variation seed.
///
/// `focus` only marks a matching node; it never filters the graph.
pub fn build_snapshot(focus: Option<&str>, seed: u32, generated_at: String) -> GraphSnapshot {
    let collections = generate_nodes(focus, seed);
    let edges = generate_edges(&collections, seed);
    let nodes = collections.into_nodes();
    let risk_assessment = assess(&nodes, &edges);

    let mut node_counts = Map::new();
    for kind in NodeType::ALL {
        let n = nodes.iter().filter(|n| n.detail.node_type() == kind).count();
        node_counts.insert(kind.as_str().to_string(), json!(n));
    }

    let metadata = GraphMetadata {
        variation: seed,
        node_count: nodes.len(),
        edge_count: edges.len(),
        node_counts,
        new_edge_count: edges.iter().filter(|e| e.is_new).count(),
        focus: focus.map(str::to_string),
        generated_at,
    };

    GraphSnapshot {
        nodes,
        edges,
        risk_assessment,
        metadata,
    }
}

/// Fixed presentation settings shipped alongside static graphs.
pub fn visualization_config() -> Value {
    json!({
        "layout": "radial",
        "animation": {
            "enabled": true,
            "duration_ms": 750,
            "easing": "ease-in-out",
            "highlight_new_edges": true
        },
        "colors": {
            "low": Level::Low.color(),
            "medium": Level::Medium.color(),
            "high": Level::High.color(),
            "critical": SystemStatus::Critical.color(),
            "background": "#0f172a"
        },
        "node_shapes": {
            "vendor": "circle",
            "threat": "triangle",
            "system": "square",
            "dependency": "diamond",
            "threat_actor": "star"
        },
        "physics": { "enabled": false }
    })
}
