use crate::error::ApiError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Quick,
    #[default]
    Comprehensive,
}

impl AnalysisType {
    /// Quick runs wait half as long in every phase.
    pub fn latency_factor(self) -> f64 {
        match self {
            AnalysisType::Quick => 0.5,
            AnalysisType::Comprehensive => 1.0,
        }
    }
}

/// Body accepted by both streaming endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub vendor_id: Option<String>,
    #[serde(alias = "reportId")]
    pub threat_id: Option<String>,
    pub query: Option<String>,
    pub asset_ids: Option<Vec<String>>,
    #[serde(default)]
    pub analysis_type: AnalysisType,
    #[serde(default)]
    pub include_historical: bool,
}

/// A validated request: at least one identifying field is present.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSubject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub asset_ids: Vec<String>,
    pub analysis_type: AnalysisType,
    pub include_historical: bool,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl AnalysisRequest {
    pub fn validate(self) -> Result<AnalysisSubject, ApiError> {
        let vendor_id = non_blank(self.vendor_id);
        let threat_id = non_blank(self.threat_id);
        let query = non_blank(self.query);
        let asset_ids: Vec<String> = self
            .asset_ids
            .unwrap_or_default()
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        if vendor_id.is_none() && threat_id.is_none() && query.is_none() && asset_ids.is_empty() {
            return Err(ApiError::InvalidArgument(
                "one of vendorId, threatId, query or assetIds is required".to_string(),
            ));
        }

        Ok(AnalysisSubject {
            vendor_id,
            threat_id,
            query,
            asset_ids,
            analysis_type: self.analysis_type,
            include_historical: self.include_historical,
        })
    }
}

impl AnalysisSubject {
    /// Short human label used in messages and logs.
    pub fn describe(&self) -> String {
        if let Some(v) = &self.vendor_id {
            return format!("vendor {v}");
        }
        if let Some(t) = &self.threat_id {
            return format!("report {t}");
        }
        if let Some(q) = &self.query {
            return format!("query \"{q}\"");
        }
        format!("{} asset(s)", self.asset_ids.len())
    }
}
