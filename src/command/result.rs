//! Structured outcome of executing a command.

use super::Command;
use serde::{Deserialize, Serialize};

/// Outcome class of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExecutionCode {
    #[default]
    Successful,
    /// The addressed pipeline, element or algorithm is unknown
    NotFound,
    InvalidArgument,
    ExecutionFailed,
    Timeout,
    /// Delivering a signal failed in a way that may succeed on retry
    SignalSendTransient,
}

impl ExecutionCode {
    pub fn display_name(&self) -> &'static str {
        match self {
            ExecutionCode::Successful => "successful",
            ExecutionCode::NotFound => "not found",
            ExecutionCode::InvalidArgument => "invalid argument",
            ExecutionCode::ExecutionFailed => "execution failed",
            ExecutionCode::Timeout => "timeout",
            ExecutionCode::SignalSendTransient => "transient signal send error",
        }
    }
}

impl std::fmt::Display for ExecutionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Result reported back to whoever submitted a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub command: Option<Command>,
    pub code: ExecutionCode,
    #[serde(default)]
    pub message: String,
}

impl ExecutionResult {
    pub fn new(command: Option<Command>, code: ExecutionCode, message: impl Into<String>) -> Self {
        Self {
            command,
            code,
            message: message.into(),
        }
    }

    pub fn successful(command: impl Into<Command>) -> Self {
        Self::new(Some(command.into()), ExecutionCode::Successful, "")
    }

    pub fn failed(
        command: impl Into<Command>,
        code: ExecutionCode,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Some(command.into()), code, message)
    }

    pub fn is_successful(&self) -> bool {
        self.code == ExecutionCode::Successful
    }

    /// Whether a batch should go on after this result.
    pub fn continue_iteration(&self) -> bool {
        self.code == ExecutionCode::SignalSendTransient
    }

    /// Fold `other` into this result: `other`'s command and code win, the
    /// messages are concatenated.
    pub fn merge(self, other: ExecutionResult) -> ExecutionResult {
        let message = match (self.message.is_empty(), other.message.is_empty()) {
            (true, _) => other.message,
            (false, true) => self.message,
            (false, false) => format!("{}\n{}", self.message, other.message),
        };
        ExecutionResult {
            command: other.command,
            code: other.code,
            message,
        }
    }
}

impl std::fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}
