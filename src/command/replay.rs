//! Replay and pipeline lifecycle commands.

use super::element::ElementTarget;
use super::CommandError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What to replay when a replay session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Positive is faster than real time, negative is slower
    pub speed: f64,
    /// Free-form selection query
    pub query: String,
}

/// Start or stop a replay session on a sink.
///
/// The ticket scopes one session per consumer. Repeating a start or stop on
/// the same ticket is a no-op for the receiving sink; this crate does not
/// de-duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayCommand {
    pub target: ElementTarget,
    pub ticket: u64,
    pub start: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<ReplayWindow>,
}

impl ReplayCommand {
    pub fn start(
        pipeline: impl Into<String>,
        sink: impl Into<String>,
        ticket: u64,
        window: Option<ReplayWindow>,
    ) -> Result<Self, CommandError> {
        if let Some(w) = &window {
            if w.to < w.from {
                return Err(CommandError::InvalidArgument(format!(
                    "replay window ends ({}) before it starts ({})",
                    w.to, w.from
                )));
            }
            if w.speed == 0.0 || !w.speed.is_finite() {
                return Err(CommandError::InvalidArgument(format!(
                    "replay speed must be a non-zero number, got {}",
                    w.speed
                )));
            }
        }
        Ok(Self {
            target: ElementTarget::new(pipeline, sink),
            ticket,
            start: true,
            window,
        })
    }

    pub fn stop(pipeline: impl Into<String>, sink: impl Into<String>, ticket: u64) -> Self {
        Self {
            target: ElementTarget::new(pipeline, sink),
            ticket,
            start: false,
            window: None,
        }
    }

    /// Whether `other` repeats this command on the same ticket.
    pub fn is_repeat_of(&self, other: &ReplayCommand) -> bool {
        self.target == other.target && self.ticket == other.ticket && self.start == other.start
    }
}

/// Lifecycle status requested for a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Start,
    Connect,
    Disconnect,
    Stop,
}

impl PipelineStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            PipelineStatus::Start => "start",
            PipelineStatus::Connect => "connect",
            PipelineStatus::Disconnect => "disconnect",
            PipelineStatus::Stop => "stop",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        [
            PipelineStatus::Start,
            PipelineStatus::Connect,
            PipelineStatus::Disconnect,
            PipelineStatus::Stop,
        ]
        .into_iter()
        .find(|s| s.display_name().eq_ignore_ascii_case(token))
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Change the lifecycle status of a whole pipeline. Execution is external.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineCommand {
    pub pipeline: String,
    pub status: PipelineStatus,
}

impl PipelineCommand {
    pub fn new(pipeline: impl Into<String>, status: PipelineStatus) -> Self {
        Self {
            pipeline: pipeline.into(),
            status,
        }
    }
}
