use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

/// Top-level TOML config. Every section is optional and defaulted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub analysis: AnalysisConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:18800".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub token_required: bool,
    /// Secret-store key holding the bearer token.
    pub token_env: String,
    /// Optional private `KEY=VALUE` file consulted before the process env.
    pub secrets_file: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_required: false,
            token_env: "SENTINEL_API_TOKEN".to_string(),
            secrets_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Wall-clock cap for one analysis run or live graph session.
    pub max_run_secs: u64,
    /// Per-run spend ceiling in USD; 0 disables the budget guard.
    pub max_run_cost_usd: f64,
    pub budget_warning_percent: f64,
    pub findings_min: usize,
    pub findings_max: usize,
    pub finding_pacing_ms: u64,
    /// Multiplier on simulated phase latency (0 = no waiting).
    pub latency_scale: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_run_secs: 120,
            max_run_cost_usd: 1.0,
            budget_warning_percent: 80.0,
            findings_min: 3,
            findings_max: 8,
            finding_pacing_ms: 300,
            latency_scale: 1.0,
        }
    }
}

impl AnalysisConfig {
    pub fn max_run(&self) -> Duration {
        Duration::from_secs(self.max_run_secs.max(1))
    }

    pub fn finding_pacing(&self) -> Duration {
        Duration::from_millis(self.finding_pacing_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamConfig {
    /// Bounded channel capacity between a run and its HTTP response.
    pub buffer: usize,
    pub keepalive_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer: 32,
            keepalive_secs: 15,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading config file: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw)
            .with_context(|| format!("failed parsing config file: {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        if a.findings_min == 0 || a.findings_min > a.findings_max {
            anyhow::bail!(
                "analysis.findings_min/findings_max must satisfy 1 <= min <= max (got {}..={})",
                a.findings_min,
                a.findings_max
            );
        }
        if a.max_run_cost_usd < 0.0 || !a.max_run_cost_usd.is_finite() {
            anyhow::bail!("analysis.max_run_cost_usd must be a non-negative number");
        }
        if !(0.0..=100.0).contains(&a.budget_warning_percent) {
            anyhow::bail!("analysis.budget_warning_percent must be within 0..=100");
        }
        if a.latency_scale < 0.0 || !a.latency_scale.is_finite() {
            anyhow::bail!("analysis.latency_scale must be a non-negative number");
        }
        if self.stream.buffer == 0 {
            anyhow::bail!("stream.buffer must be at least 1");
        }
        Ok(())
    }

    /// Apply `SENTINEL_*` environment overrides on top of file values.
    pub fn apply_env(&mut self) {
        fn get<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name)
                .ok()
                .and_then(|v| v.trim().parse::<T>().ok())
        }

        if let Some(bind) = get::<String>("SENTINEL_BIND").filter(|b| !b.is_empty()) {
            self.server.bind = bind;
        }
        if let Some(v) = get("SENTINEL_MAX_RUN_SECS") {
            self.analysis.max_run_secs = v;
        }
        if let Some(v) = get("SENTINEL_MAX_RUN_COST_USD") {
            self.analysis.max_run_cost_usd = v;
        }
        if let Some(v) = get("SENTINEL_LATENCY_SCALE") {
            self.analysis.latency_scale = v;
        }
    }
}
