//! Externally delivered switch signals and their read-back values.

use super::state::SwitchState;
use crate::command::ParameterValue;
use crate::transport::Destination;
use serde::{Deserialize, Serialize};

/// A switch-trigger signal applied to a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SwitchSignal {
    /// Become the source of truth
    Activate,
    /// Stop emitting and buffer
    Passivate,
    /// Record where upstream traffic is being routed
    RouteTo(Destination),
    /// Mark that accumulated state should move to the incoming instance
    RequestStateTransfer,
    /// Re-point `in` at `tmp`
    PromoteTemporary,
    /// Give `tmp` a fresh queue after promotion was acknowledged
    ResetTemporary,
    /// Downstream acknowledged every tuple up to this sequence
    Acknowledge(u64),
    /// Set a named strategy parameter
    Configure { name: String, value: ParameterValue },
}

impl SwitchSignal {
    pub fn display_name(&self) -> &'static str {
        match self {
            SwitchSignal::Activate => "activate",
            SwitchSignal::Passivate => "passivate",
            SwitchSignal::RouteTo(_) => "routeTo",
            SwitchSignal::RequestStateTransfer => "requestStateTransfer",
            SwitchSignal::PromoteTemporary => "promoteTemporary",
            SwitchSignal::ResetTemporary => "resetTemporary",
            SwitchSignal::Acknowledge(_) => "acknowledge",
            SwitchSignal::Configure { .. } => "configure",
        }
    }
}

impl std::fmt::Display for SwitchSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwitchSignal::RouteTo(destination) => write!(f, "routeTo({})", destination),
            SwitchSignal::Acknowledge(sequence) => write!(f, "acknowledge({})", sequence),
            SwitchSignal::Configure { name, value } => write!(f, "configure({}={})", name, value),
            other => write!(f, "{}", other.display_name()),
        }
    }
}

/// Named values a signal sender reads back to confirm an effect.
pub mod names {
    pub const STATE: &str = "state";
    pub const DESTINATION: &str = "destination";
    pub const IN_SIZE: &str = "inSize";
    pub const TMP_SIZE: &str = "tmpSize";
    pub const OUT_SIZE: &str = "outSize";
    pub const TRANSFER_REQUESTED: &str = "transferRequested";
}

/// Value returned by [`SwitchStrategy::signal_value`](super::SwitchStrategy::signal_value).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalValue {
    State(SwitchState),
    Destination(Destination),
    Size(usize),
    Flag(bool),
    Parameter(ParameterValue),
}

impl SignalValue {
    pub fn as_state(&self) -> Option<SwitchState> {
        match self {
            SignalValue::State(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_destination(&self) -> Option<Destination> {
        match self {
            SignalValue::Destination(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_size(&self) -> Option<usize> {
        match self {
            SignalValue::Size(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            SignalValue::Flag(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&ParameterValue> {
        match self {
            SignalValue::Parameter(v) => Some(v),
            _ => None,
        }
    }
}
