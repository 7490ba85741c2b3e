use crate::error::ProviderError;
use crate::request::AnalysisSubject;
use async_trait::async_trait;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::Serialize;

pub const DETECTION_METHOD: &str = "ai_pattern_recognition";
pub const MAX_RECOMMENDATIONS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub threat_type: String,
    pub severity: u8,
    pub description: String,
    #[serde(rename = "affectedSystems")]
    pub affected_systems: Vec<String>,
    #[serde(rename = "aiRiskScore")]
    pub ai_risk_score: f64,
    pub confidence_score: f64,
    pub threat_id: String,
    pub vendor_name: String,
    pub detection_method: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityTier {
    Low,
    Medium,
    High,
}

impl SeverityTier {
    pub fn of(severity: u8) -> Self {
        match severity {
            0..=3 => SeverityTier::Low,
            4..=6 => SeverityTier::Medium,
            _ => SeverityTier::High,
        }
    }

    fn index(self) -> usize {
        match self {
            SeverityTier::Low => 0,
            SeverityTier::Medium => 1,
            SeverityTier::High => 2,
        }
    }
}

/// One entry of the threat-type catalog.
#[derive(Debug, Clone)]
pub struct ThreatTemplate {
    pub threat_type: &'static str,
    /// Description pools indexed by severity tier (low, medium, high).
    /// `{vendor}` and `{system}` are substituted.
    pub descriptions: [&'static [&'static str]; 3],
    pub recommendations: &'static [&'static str],
}

#[derive(Debug, Clone)]
pub struct FindingCatalog {
    pub threats: Vec<ThreatTemplate>,
    pub systems: Vec<&'static str>,
    pub vendors: Vec<&'static str>,
}

const BASE_RECOMMENDATIONS: &[&str] = &[
    "Review vendor access permissions",
    "Increase monitoring on affected systems",
];

const ESCALATED_RECOMMENDATIONS: &[&str] = &[
    "Escalate to incident response team",
    "Isolate affected systems from the network",
    "Notify executive leadership",
];

impl Default for FindingCatalog {
    fn default() -> Self {
        Self {
            threats: vec![
                ThreatTemplate {
                    threat_type: "malware",
                    descriptions: [
                        &["Low-confidence malware signature observed near {system}"],
                        &[
                            "Malware beacon traced to {vendor} software update channel",
                            "Suspicious binary dropped on {system} after {vendor} patch",
                        ],
                        &["Active malware infection spreading from {vendor} tooling into {system}"],
                    ],
                    recommendations: &["Run full endpoint scans", "Block known malicious hashes"],
                },
                ThreatTemplate {
                    threat_type: "phishing",
                    descriptions: [
                        &["Generic phishing lure impersonating {vendor}"],
                        &["Targeted phishing campaign using {vendor} branding against {system} admins"],
                        &["Credential phishing kit harvesting {vendor} SSO sessions"],
                    ],
                    recommendations: &["Reset exposed credentials", "Run phishing awareness refresher"],
                },
                ThreatTemplate {
                    threat_type: "supply_chain_compromise",
                    descriptions: [
                        &["Unsigned dependency published under {vendor} namespace"],
                        &["Tampered build artifact from {vendor} reaching {system}"],
                        &[
                            "Compromised {vendor} release pipeline delivering backdoored packages",
                            "Trojanized {vendor} update deployed to {system}",
                        ],
                    ],
                    recommendations: &["Verify artifact signatures", "Pin dependency versions"],
                },
                ThreatTemplate {
                    threat_type: "ransomware",
                    descriptions: [
                        &["Ransomware precursor tooling referenced in {vendor} threat feed"],
                        &["Ransomware staging activity detected on {system}"],
                        &["Ransomware encryption attempt on {system} via {vendor} remote access"],
                    ],
                    recommendations: &["Verify offline backups", "Disable unused remote access"],
                },
                ThreatTemplate {
                    threat_type: "data_exfiltration",
                    descriptions: [
                        &["Unusual outbound volume from {system}"],
                        &["Data staged for transfer through {vendor} integration"],
                        &["Bulk exfiltration of {system} records over {vendor} API"],
                    ],
                    recommendations: &["Enable data loss prevention rules", "Audit outbound API tokens"],
                },
                ThreatTemplate {
                    threat_type: "insider_threat",
                    descriptions: [
                        &["Off-hours access by {vendor} contractor account"],
                        &["Privilege use by {vendor} staff outside contract scope on {system}"],
                        &["{vendor} insider copying {system} configuration and secrets"],
                    ],
                    recommendations: &["Review privileged access logs", "Enforce least privilege"],
                },
                ThreatTemplate {
                    threat_type: "zero_day_exploit",
                    descriptions: [
                        &["Exploit chatter referencing {vendor} product line"],
                        &["Unpatched {vendor} component on {system} matches new exploit pattern"],
                        &["In-the-wild zero-day exploitation of {vendor} appliance fronting {system}"],
                    ],
                    recommendations: &["Apply virtual patching", "Contact vendor for emergency fix"],
                },
                ThreatTemplate {
                    threat_type: "credential_theft",
                    descriptions: [
                        &["Stale {vendor} service credentials found in public paste"],
                        &["Credential stuffing against {system} using {vendor} accounts"],
                        &["Stolen {vendor} admin keys used against {system}"],
                    ],
                    recommendations: &["Rotate service account secrets", "Enforce MFA for vendor accounts"],
                },
            ],
            systems: vec![
                "web-server",
                "database",
                "email-server",
                "file-server",
                "domain-controller",
                "erp-system",
                "crm-platform",
                "payment-gateway",
            ],
            vendors: vec![
                "TechCorp Solutions",
                "SecureNet Systems",
                "DataFlow Inc",
                "CloudGuard Services",
                "NetSecure Pro",
            ],
        }
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn recommendations_for(template: &ThreatTemplate, severity: u8) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(MAX_RECOMMENDATIONS);
    let escalated: &[&str] = if severity >= 8 {
        ESCALATED_RECOMMENDATIONS
    } else if severity >= 6 {
        &ESCALATED_RECOMMENDATIONS[..1]
    } else {
        &[]
    };

    for rec in BASE_RECOMMENDATIONS
        .iter()
        .chain(template.recommendations)
        .chain(escalated)
    {
        if out.len() == MAX_RECOMMENDATIONS {
            break;
        }
        if !out.iter().any(|r| r == rec) {
            out.push(rec.to_string());
        }
    }
    out
}

/// Sample `count` findings from the catalog.
pub fn synthesize<R: Rng>(catalog: &FindingCatalog, count: usize, rng: &mut R) -> Vec<Finding> {
    if catalog.threats.is_empty() || catalog.systems.is_empty() || catalog.vendors.is_empty() {
        return Vec::new();
    }

    (0..count)
        .map(|_| {
            let template = catalog.threats.choose(rng).unwrap_or(&catalog.threats[0]);
            let severity: u8 = rng.gen_range(1..=10);
            let vendor = *catalog.vendors.choose(rng).unwrap_or(&catalog.vendors[0]);

            let n_systems = rng.gen_range(1..=4usize).min(catalog.systems.len());
            let affected: Vec<String> = catalog
                .systems
                .choose_multiple(rng, n_systems)
                .map(|s| s.to_string())
                .collect();

            let pool = template.descriptions[SeverityTier::of(severity).index()];
            let text = pool.choose(rng).copied().unwrap_or(template.threat_type);
            let description = text
                .replace("{vendor}", vendor)
                .replace("{system}", &affected[0]);

            Finding {
                threat_type: template.threat_type.to_string(),
                severity,
                description,
                affected_systems: affected,
                ai_risk_score: round3(rng.gen_range(0.70..=1.0)),
                confidence_score: round3(rng.gen_range(0.80..=1.0)),
                threat_id: format!("THR-{:06}", rng.gen_range(0..1_000_000u32)),
                vendor_name: vendor.to_string(),
                detection_method: DETECTION_METHOD.to_string(),
                recommendations: recommendations_for(template, severity),
            }
        })
        .collect()
}

/// Source of findings for the ai-processing phase.
#[async_trait]
pub trait FindingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn findings(
        &self,
        subject: &AnalysisSubject,
        count: usize,
    ) -> Result<Vec<Finding>, ProviderError>;
}

/// Catalog-backed provider. A fixed seed makes every call return the same findings.
#[derive(Debug, Clone, Default)]
pub struct SyntheticFindingProvider {
    catalog: FindingCatalog,
    seed: Option<u64>,
}

impl SyntheticFindingProvider {
    pub fn new(catalog: FindingCatalog) -> Self {
        Self { catalog, seed: None }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[async_trait]
impl FindingProvider for SyntheticFindingProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn findings(
        &self,
        _subject: &AnalysisSubject,
        count: usize,
    ) -> Result<Vec<Finding>, ProviderError> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(synthesize(&self.catalog, count, &mut rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn findings_respect_ranges() {
        let catalog = FindingCatalog::default();
        let mut rng = StdRng::seed_from_u64(7);
        let findings = synthesize(&catalog, 200, &mut rng);
        assert_eq!(findings.len(), 200);

        for f in &findings {
            assert!((1..=10).contains(&f.severity));
            assert!((0.70..=1.0).contains(&f.ai_risk_score), "{}", f.ai_risk_score);
            assert!((0.80..=1.0).contains(&f.confidence_score), "{}", f.confidence_score);
            assert!((1..=4).contains(&f.affected_systems.len()));
            let unique: HashSet<_> = f.affected_systems.iter().collect();
            assert_eq!(unique.len(), f.affected_systems.len());
            assert!(catalog.vendors.contains(&f.vendor_name.as_str()));
            assert_eq!(f.detection_method, DETECTION_METHOD);
            assert!(!f.recommendations.is_empty());
            assert!(f.recommendations.len() <= MAX_RECOMMENDATIONS);
            assert!(!f.description.contains('{'));
            assert!(f.threat_id.starts_with("THR-"));
        }
    }

    #[test]
    fn high_severity_escalates_recommendations() {
        let template = &FindingCatalog::default().threats[0];
        let low = recommendations_for(template, 2);
        let high = recommendations_for(template, 9);
        assert!(!low.iter().any(|r| r.contains("incident response")));
        assert!(high.iter().any(|r| r.contains("incident response")));
        assert_eq!(high.len(), MAX_RECOMMENDATIONS);
    }

    #[test]
    fn zero_count_yields_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(synthesize(&FindingCatalog::default(), 0, &mut rng).is_empty());
    }

    #[tokio::test]
    async fn seeded_provider_is_repeatable() {
        let subject = crate::request::AnalysisRequest {
            vendor_id: Some("V001".into()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        let provider = SyntheticFindingProvider::default().with_seed(42);
        let a = provider.findings(&subject, 5).await.unwrap();
        let b = provider.findings(&subject, 5).await.unwrap();
        assert_eq!(a, b);
    }
}
