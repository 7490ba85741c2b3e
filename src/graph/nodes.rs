use super::{Level, Position, SystemStatus};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Vendor,
    Threat,
    System,
    Dependency,
    ThreatActor,
}

impl NodeType {
    pub const ALL: [NodeType; 5] = [
        NodeType::Vendor,
        NodeType::Threat,
        NodeType::System,
        NodeType::Dependency,
        NodeType::ThreatActor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Vendor => "vendor",
            NodeType::Threat => "threat",
            NodeType::System => "system",
            NodeType::Dependency => "dependency",
            NodeType::ThreatActor => "threat_actor",
        }
    }

    /// Ring radius of the radial layout.
    pub fn radius(self) -> f64 {
        match self {
            NodeType::Vendor => 200.0,
            NodeType::Threat => 300.0,
            NodeType::System => 150.0,
            NodeType::Dependency => 250.0,
            NodeType::ThreatActor => 350.0,
        }
    }

    fn base_size(self) -> u32 {
        match self {
            NodeType::Vendor => 24,
            NodeType::Threat => 20,
            NodeType::System => 28,
            NodeType::Dependency => 16,
            NodeType::ThreatActor => 22,
        }
    }
}

/// Variant-specific classifier and scalar. Serialized inline with a `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeDetail {
    Vendor { risk_level: Level, confidence: f64 },
    Threat { severity: Level, confidence: f64 },
    System { status: SystemStatus, availability: f64 },
    Dependency { criticality: Level, health: f64 },
    ThreatActor { sophistication: Level, confidence: f64 },
}

impl NodeDetail {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeDetail::Vendor { .. } => NodeType::Vendor,
            NodeDetail::Threat { .. } => NodeType::Threat,
            NodeDetail::System { .. } => NodeType::System,
            NodeDetail::Dependency { .. } => NodeType::Dependency,
            NodeDetail::ThreatActor { .. } => NodeType::ThreatActor,
        }
    }

    /// Classifier projected onto low/medium/high.
    pub fn level(&self) -> Level {
        match *self {
            NodeDetail::Vendor { risk_level, .. } => risk_level,
            NodeDetail::Threat { severity, .. } => severity,
            NodeDetail::System { status, .. } => status.level(),
            NodeDetail::Dependency { criticality, .. } => criticality,
            NodeDetail::ThreatActor { sophistication, .. } => sophistication,
        }
    }

    pub fn color(&self) -> &'static str {
        match *self {
            NodeDetail::System { status, .. } => status.color(),
            _ => self.level().color(),
        }
    }

    pub fn size(&self) -> u32 {
        self.node_type().base_size() + 6 * self.level().rank()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub category: String,
    #[serde(flatten)]
    pub detail: NodeDetail,
    pub properties: Map<String, Value>,
    pub position: Position,
    pub size: u32,
    pub color: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub focused: bool,
}

/// The five node collections of one generation, in catalog order.
#[derive(Debug, Clone)]
pub struct NodeCollections {
    pub vendors: Vec<GraphNode>,
    pub threats: Vec<GraphNode>,
    pub systems: Vec<GraphNode>,
    pub dependencies: Vec<GraphNode>,
    pub actors: Vec<GraphNode>,
}

impl NodeCollections {
    pub fn into_nodes(self) -> Vec<GraphNode> {
        let mut out = Vec::with_capacity(
            self.vendors.len()
                + self.threats.len()
                + self.systems.len()
                + self.dependencies.len()
                + self.actors.len(),
        );
        out.extend(self.vendors);
        out.extend(self.threats);
        out.extend(self.systems);
        out.extend(self.dependencies);
        out.extend(self.actors);
        out
    }
}

struct CatalogEntry {
    id: &'static str,
    label: &'static str,
    category: &'static str,
    props: &'static [(&'static str, &'static str)],
}

const VENDORS: [CatalogEntry; 5] = [
    CatalogEntry {
        id: "V001",
        label: "TechCorp Solutions",
        category: "software",
        props: &[("country", "US"), ("service", "ERP hosting"), ("contract_tier", "strategic")],
    },
    CatalogEntry {
        id: "V002",
        label: "SecureNet Systems",
        category: "security",
        props: &[("country", "DE"), ("service", "managed firewall"), ("contract_tier", "core")],
    },
    CatalogEntry {
        id: "V003",
        label: "DataFlow Inc",
        category: "data_processing",
        props: &[("country", "IN"), ("service", "ETL pipelines"), ("contract_tier", "core")],
    },
    CatalogEntry {
        id: "V004",
        label: "CloudGuard Services",
        category: "cloud",
        props: &[("country", "US"), ("service", "cloud backup"), ("contract_tier", "strategic")],
    },
    CatalogEntry {
        id: "V005",
        label: "NetSecure Pro",
        category: "network",
        props: &[("country", "SG"), ("service", "SD-WAN"), ("contract_tier", "tactical")],
    },
];

const THREATS: [CatalogEntry; 5] = [
    CatalogEntry {
        id: "T001",
        label: "APT29 Supply Chain Campaign",
        category: "apt",
        props: &[("vector", "software update"), ("first_seen", "2024-03-11")],
    },
    CatalogEntry {
        id: "T002",
        label: "Build Pipeline Compromise",
        category: "supply_chain",
        props: &[("vector", "ci/cd"), ("first_seen", "2024-05-02")],
    },
    CatalogEntry {
        id: "T003",
        label: "Log4Shell Exploitation",
        category: "vulnerability",
        props: &[("vector", "jndi lookup"), ("cve", "CVE-2021-44228")],
    },
    CatalogEntry {
        id: "T004",
        label: "Ransomware-as-a-Service Wave",
        category: "ransomware",
        props: &[("vector", "remote access"), ("first_seen", "2024-07-19")],
    },
    CatalogEntry {
        id: "T005",
        label: "Vendor Credential Phishing",
        category: "phishing",
        props: &[("vector", "email"), ("first_seen", "2024-09-30")],
    },
];

const SYSTEMS: [CatalogEntry; 5] = [
    CatalogEntry {
        id: "S001",
        label: "Core Banking Platform",
        category: "financial",
        props: &[("environment", "production"), ("owner", "finance-it")],
    },
    CatalogEntry {
        id: "S002",
        label: "Customer Data Warehouse",
        category: "data",
        props: &[("environment", "production"), ("owner", "data-platform")],
    },
    CatalogEntry {
        id: "S003",
        label: "Identity Provider",
        category: "identity",
        props: &[("environment", "production"), ("owner", "iam")],
    },
    CatalogEntry {
        id: "S004",
        label: "Payment Gateway",
        category: "payments",
        props: &[("environment", "production"), ("owner", "payments")],
    },
    CatalogEntry {
        id: "S005",
        label: "Email Infrastructure",
        category: "communication",
        props: &[("environment", "production"), ("owner", "workplace-it")],
    },
];

const DEPENDENCIES: [CatalogEntry; 5] = [
    CatalogEntry {
        id: "D001",
        label: "OpenSSL",
        category: "library",
        props: &[("version", "3.0.13"), ("ecosystem", "c")],
    },
    CatalogEntry {
        id: "D002",
        label: "Apache Log4j",
        category: "library",
        props: &[("version", "2.17.1"), ("ecosystem", "maven")],
    },
    CatalogEntry {
        id: "D003",
        label: "Kubernetes",
        category: "platform",
        props: &[("version", "1.29"), ("ecosystem", "container")],
    },
    CatalogEntry {
        id: "D004",
        label: "PostgreSQL",
        category: "database",
        props: &[("version", "15.6"), ("ecosystem", "database")],
    },
    CatalogEntry {
        id: "D005",
        label: "Nginx",
        category: "web_server",
        props: &[("version", "1.25.4"), ("ecosystem", "web")],
    },
];

const ACTORS: [CatalogEntry; 5] = [
    CatalogEntry {
        id: "A001",
        label: "APT29 (Cozy Bear)",
        category: "nation_state",
        props: &[("origin", "RU"), ("motivation", "espionage")],
    },
    CatalogEntry {
        id: "A002",
        label: "Lazarus Group",
        category: "nation_state",
        props: &[("origin", "KP"), ("motivation", "financial")],
    },
    CatalogEntry {
        id: "A003",
        label: "FIN7",
        category: "cybercrime",
        props: &[("origin", "unknown"), ("motivation", "financial")],
    },
    CatalogEntry {
        id: "A004",
        label: "APT41",
        category: "nation_state",
        props: &[("origin", "CN"), ("motivation", "espionage")],
    },
    CatalogEntry {
        id: "A005",
        label: "Sandworm",
        category: "nation_state",
        props: &[("origin", "RU"), ("motivation", "disruption")],
    },
];

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn position(kind: NodeType, index: usize, len: usize) -> Position {
    let angle = 2.0 * PI * index as f64 / len.max(1) as f64;
    let r = kind.radius();
    Position {
        x: round2(r * angle.cos()),
        y: round2(r * angle.sin()),
    }
}

/// Seed-perturbed scalar in [0.80, 0.96].
fn scalar(seed: u32, index: usize) -> f64 {
    round2(0.80 + ((seed as usize + index * 3) % 5) as f64 * 0.04)
}

fn build(
    kind: NodeType,
    catalog: &[CatalogEntry],
    focus: Option<&str>,
    seed: u32,
    detail: impl Fn(usize, f64) -> NodeDetail,
) -> Vec<GraphNode> {
    catalog
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let d = detail(seed as usize + i, scalar(seed, i));
            debug_assert_eq!(d.node_type(), kind);

            let mut properties: Map<String, Value> = entry
                .props
                .iter()
                .map(|(k, v)| (k.to_string(), json!(v)))
                .collect();
            properties.insert("catalog_index".to_string(), json!(i));

            GraphNode {
                id: entry.id.to_string(),
                label: entry.label.to_string(),
                category: entry.category.to_string(),
                detail: d,
                properties,
                position: position(kind, i, catalog.len()),
                size: d.size(),
                color: d.color().to_string(),
                focused: focus == Some(entry.id),
            }
        })
        .collect()
}

/// Generate all five node collections for a variation seed.
///
/// Classifier of catalog entry `i` is `(seed + i) mod 3` on the variant's scale;
/// positions depend on `i` only.
pub fn generate_nodes(focus: Option<&str>, seed: u32) -> NodeCollections {
    NodeCollections {
        vendors: build(NodeType::Vendor, &VENDORS, focus, seed, |rank, s| {
            NodeDetail::Vendor {
                risk_level: Level::from_rank(rank),
                confidence: s,
            }
        }),
        threats: build(NodeType::Threat, &THREATS, focus, seed, |rank, s| {
            NodeDetail::Threat {
                severity: Level::from_rank(rank),
                confidence: s,
            }
        }),
        systems: build(NodeType::System, &SYSTEMS, focus, seed, |rank, s| {
            NodeDetail::System {
                status: SystemStatus::from_rank(rank),
                availability: s,
            }
        }),
        dependencies: build(NodeType::Dependency, &DEPENDENCIES, focus, seed, |rank, s| {
            NodeDetail::Dependency {
                criticality: Level::from_rank(rank),
                health: s,
            }
        }),
        actors: build(NodeType::ThreatActor, &ACTORS, focus, seed, |rank, s| {
            NodeDetail::ThreatActor {
                sophistication: Level::from_rank(rank),
                confidence: s,
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn five_collections_of_five() {
        let c = generate_nodes(None, 0);
        for list in [&c.vendors, &c.threats, &c.systems, &c.dependencies, &c.actors] {
            assert_eq!(list.len(), 5);
        }
    }

    #[test]
    fn classifier_follows_seed_plus_index() {
        let c = generate_nodes(None, 1);
        assert_eq!(c.vendors[0].detail.level(), Level::Medium);
        assert_eq!(c.vendors[1].detail.level(), Level::High);
        assert_eq!(c.vendors[2].detail.level(), Level::Low);
        assert!(matches!(
            c.systems[1].detail,
            NodeDetail::System { status: SystemStatus::Critical, .. }
        ));
    }

    #[test]
    fn positions_do_not_depend_on_seed() {
        let a = generate_nodes(None, 0).into_nodes();
        let b = generate_nodes(None, 4).into_nodes();
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.position, y.position);
        }
        assert_eq!(a[0].position, Position { x: 200.0, y: 0.0 });
    }

    #[test]
    fn same_type_and_classifier_look_identical() {
        let mut seen: HashMap<(NodeType, Level), (u32, String)> = HashMap::new();
        for seed in 0..6 {
            for n in generate_nodes(None, seed).into_nodes() {
                let key = (n.detail.node_type(), n.detail.level());
                let visual = (n.size, n.color.clone());
                let prev = seen.entry(key).or_insert_with(|| visual.clone());
                assert_eq!(prev, &visual);
            }
        }
        assert_eq!(seen.len(), 15);
    }

    #[test]
    fn focus_marks_without_filtering() {
        let nodes = generate_nodes(Some("T003"), 0).into_nodes();
        assert_eq!(nodes.len(), 25);
        let focused: Vec<_> = nodes.iter().filter(|n| n.focused).map(|n| n.id.as_str()).collect();
        assert_eq!(focused, vec!["T003"]);
    }

    #[test]
    fn serializes_variant_fields_inline() {
        let node = &generate_nodes(None, 0).systems[0];
        let v = serde_json::to_value(node).unwrap();
        assert_eq!(v["type"], "system");
        assert_eq!(v["status"], "operational");
        assert!(v.get("availability").is_some());
        assert!(v.get("focused").is_none());
    }
}
