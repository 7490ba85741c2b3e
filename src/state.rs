use crate::{analysis::AnalysisSettings, config::Config, findings::FindingProvider, session::GraphSettings};
use std::{sync::Arc, time::Duration};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub analysis: AnalysisSettings,
    pub graph: GraphSettings,
    pub provider: Arc<dyn FindingProvider>,
    /// Required bearer token, when auth is enabled.
    pub token: Option<String>,
}

impl AppState {
    pub fn stream_buffer(&self) -> usize {
        self.config.stream.buffer
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.config.stream.keepalive_secs.max(1))
    }
}
