use crate::cost::Micros;
use crate::error::RunError;
use crate::findings::Finding;
use crate::graph::GraphSnapshot;
use serde::Serialize;
use serde_json::{Map, Value};
use futures::FutureExt;
use std::{any::Any, future::Future, panic::AssertUnwindSafe, time::Duration};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

/// One frame of a streamed run, serialized with a `type` discriminator.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "status")]
    Status {
        message: String,
        timestamp: String,
        step: String,
    },

    #[serde(rename = "step_start", rename_all = "camelCase")]
    StepStart {
        step: String,
        message: String,
        timestamp: String,
        step_number: usize,
        total_steps: usize,
        progress: u8,
    },

    #[serde(rename = "threat-detected")]
    ThreatDetected {
        #[serde(flatten)]
        finding: Finding,
        timestamp: String,
    },

    #[serde(rename = "step_complete")]
    StepComplete {
        step: String,
        duration: u64,
        cost: Micros,
        total_cost: Micros,
        progress: u8,
        timestamp: String,
        #[serde(flatten)]
        details: Map<String, Value>,
    },

    #[serde(rename = "analysis_complete")]
    AnalysisComplete {
        message: String,
        timestamp: String,
        results: Value,
    },

    #[serde(rename = "graph_initial")]
    GraphInitial {
        timestamp: String,
        graph_data: Box<GraphSnapshot>,
    },

    #[serde(rename = "graph_update")]
    GraphUpdate {
        timestamp: String,
        step: String,
        graph_data: Box<GraphSnapshot>,
        changes: Value,
        progress: u8,
    },

    #[serde(rename = "graph_complete")]
    GraphComplete {
        message: String,
        timestamp: String,
        summary: Value,
        graph_data: Box<GraphSnapshot>,
    },

    #[serde(rename = "error")]
    Error {
        message: String,
        error: String,
        timestamp: String,
    },

    #[serde(rename = "end")]
    End,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Status { .. } => "status",
            Event::StepStart { .. } => "step_start",
            Event::ThreatDetected { .. } => "threat-detected",
            Event::StepComplete { .. } => "step_complete",
            Event::AnalysisComplete { .. } => "analysis_complete",
            Event::GraphInitial { .. } => "graph_initial",
            Event::GraphUpdate { .. } => "graph_update",
            Event::GraphComplete { .. } => "graph_complete",
            Event::Error { .. } => "error",
            Event::End => "end",
        }
    }

    pub fn status(step: &str, message: impl Into<String>) -> Self {
        Event::Status {
            message: message.into(),
            timestamp: timestamp(),
            step: step.to_string(),
        }
    }

    pub fn error(err: &RunError) -> Self {
        Event::Error {
            message: err.to_string(),
            error: err.code().to_string(),
            timestamp: timestamp(),
        }
    }
}

/// Producer side of a run's event channel.
///
/// Dropping the last sink closes the stream. A send to a closed stream, or a
/// pause interrupted by the client leaving, yields [`RunError::TransportClosed`].
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<Event>,
}

impl EventSink {
    pub async fn emit(&self, event: Event) -> Result<(), RunError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| RunError::TransportClosed)
    }

    /// Sleep for `d`, returning early if the receiving side goes away.
    pub async fn pause(&self, d: Duration) -> Result<(), RunError> {
        if self.is_closed() {
            return Err(RunError::TransportClosed);
        }
        if d.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(d) => Ok(()),
            _ = self.tx.closed() => Err(RunError::TransportClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Bounded channel between one run and its transport.
pub fn channel(buffer: usize) -> (EventSink, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (EventSink { tx }, rx)
}

/// Drive a run body under a wall-clock limit.
///
/// A panic inside the body (typically from a provider) becomes an upstream
/// failure so the client still receives its error frame.
pub async fn supervise<F>(limit: Duration, body: F) -> Result<(), RunError>
where
    F: Future<Output = Result<(), RunError>>,
{
    match tokio::time::timeout(limit, AssertUnwindSafe(body).catch_unwind()).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(RunError::Upstream(format!(
            "run aborted: {}",
            panic_message(panic.as_ref())
        ))),
        Err(_) => Err(RunError::Timeout(limit)),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unexpected panic")
}

/// How a streamed run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    /// The client left; nothing further was sent.
    Disconnected,
    /// One error frame was sent (if the client was still there).
    Failed(RunError),
}

/// Turn a run result into its outcome, emitting the single error frame for failures.
pub async fn conclude(run_id: &str, result: Result<(), RunError>, sink: &EventSink) -> RunOutcome {
    match result {
        Ok(()) => {
            info!("run {} completed", run_id);
            RunOutcome::Completed
        }
        Err(RunError::TransportClosed) => {
            info!("run {} stopped: client disconnected", run_id);
            RunOutcome::Disconnected
        }
        Err(err) => {
            warn!("run {} failed: {}", run_id, err);
            if sink.emit(Event::error(&err)).await.is_err() {
                debug!("run {}: client gone before error frame", run_id);
            }
            RunOutcome::Failed(err)
        }
    }
}
