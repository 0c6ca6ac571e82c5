//! Command execution against live intermediaries.
//!
//! [`SwitchCoordinator`] is the [`CommandVisitor`] a node runs for commands
//! delivered by the event bus. Algorithm changes are executed directly on
//! the registered intermediaries. Everything addressed to elements this node
//! does not own is turned into an [`ElementSignal`] and handed to an
//! [`ElementSignalSender`], whose transport is external. Downstream
//! acknowledgements come back through [`SwitchCoordinator::acknowledge`].

use crate::command::{
    AlgorithmChangeCommand, CommandVisitor, ElementTarget, ExecutionCode, ExecutionResult,
    LoadSheddingCommand, ParameterChangeCommand, ParameterValue, PipelineCommand, PipelineStatus,
    ReplayCommand, ReplayWindow,
};
use crate::error::{Result, SwitchError};
use crate::switching::AlgorithmSwitch;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Where an [`ElementSignal`] is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalTarget {
    Pipeline(String),
    Element(ElementTarget),
}

impl std::fmt::Display for SignalTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalTarget::Pipeline(p) => write!(f, "{}", p),
            SignalTarget::Element(e) => write!(f, "{}", e),
        }
    }
}

/// Payload sent to a remote element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "camelCase")]
pub enum ElementSignal {
    Parameter {
        name: String,
        value: ParameterValue,
    },
    LoadShedding {
        shedder: Option<String>,
        parameters: BTreeMap<String, ParameterValue>,
    },
    Replay {
        ticket: u64,
        start: bool,
        window: Option<ReplayWindow>,
    },
    Pipeline {
        status: PipelineStatus,
    },
}

/// Delivery of element signals to the rest of the cluster.
#[cfg_attr(test, mockall::automock)]
pub trait ElementSignalSender: Send {
    fn send(&self, target: &SignalTarget, signal: &ElementSignal) -> Result<()>;
}

/// Shared handle to an intermediary driven by the coordinator.
pub type SharedSwitch = Arc<Mutex<dyn AlgorithmSwitch>>;

/// Executes commands on local intermediaries and forwards the rest.
pub struct SwitchCoordinator<S: ElementSignalSender> {
    switches: BTreeMap<ElementTarget, SharedSwitch>,
    signals: S,
}

impl<S: ElementSignalSender> SwitchCoordinator<S> {
    pub fn new(signals: S) -> Self {
        Self {
            switches: BTreeMap::new(),
            signals,
        }
    }

    /// Drive `switch` for commands addressed to `target`. Replaces any
    /// switch already registered there.
    pub fn register(&mut self, target: ElementTarget, switch: SharedSwitch) {
        tracing::debug!("switch registered at {}", target);
        self.switches.insert(target, switch);
    }

    pub fn unregister(&mut self, target: &ElementTarget) -> Option<SharedSwitch> {
        self.switches.remove(target)
    }

    pub fn switch(&self, target: &ElementTarget) -> Option<&SharedSwitch> {
        self.switches.get(target)
    }

    pub fn targets(&self) -> impl Iterator<Item = &ElementTarget> {
        self.switches.keys()
    }

    pub fn signals(&self) -> &S {
        &self.signals
    }

    /// Release tuples the switch at `target` emitted up to and including
    /// `sequence`, once its downstream has confirmed them.
    pub fn acknowledge(&self, target: &ElementTarget, sequence: u64) -> Result<()> {
        self.with_switch(target, |switch| switch.acknowledge(sequence))
            .unwrap_or_else(|| Err(SwitchError::NotRegistered(format!("switch at {}", target))))
    }

    fn send(
        &self,
        target: SignalTarget,
        signal: ElementSignal,
    ) -> std::result::Result<(), String> {
        self.signals.send(&target, &signal).map_err(|e| {
            tracing::warn!("signal to {} failed: {}", target, e);
            format!("sending to {} failed: {}", target, e)
        })
    }

    /// Run `f` on the switch at `target` with the lock held.
    fn with_switch<T>(
        &self,
        target: &ElementTarget,
        f: impl FnOnce(&mut dyn AlgorithmSwitch) -> Result<T>,
    ) -> Option<Result<T>> {
        let switch = self.switches.get(target)?;
        let mut guard = match switch.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Some(f(&mut *guard))
    }
}

/// Innermost error behind any context wrappers.
fn root_cause(error: &SwitchError) -> &SwitchError {
    match error {
        SwitchError::WithContext { source, .. } => root_cause(source),
        other => other,
    }
}

/// Execution code reported for a failed switch operation.
fn error_code(error: &SwitchError) -> ExecutionCode {
    match root_cause(error) {
        SwitchError::NotRegistered(_) => ExecutionCode::NotFound,
        SwitchError::Timeout(_) => ExecutionCode::Timeout,
        SwitchError::Command(_) => ExecutionCode::InvalidArgument,
        _ => ExecutionCode::ExecutionFailed,
    }
}

impl<S: ElementSignalSender> CommandVisitor for SwitchCoordinator<S> {
    fn visit_algorithm_change(&mut self, command: &AlgorithmChangeCommand) -> ExecutionResult {
        let outcome = self.with_switch(&command.target, |switch| {
            switch.change_algorithm(&command.algorithm, &command.parameters)
        });
        match outcome {
            None => ExecutionResult::failed(
                command.clone(),
                ExecutionCode::NotFound,
                format!("no switch registered at {}", command.target),
            ),
            Some(Ok(report)) => {
                tracing::info!(
                    "{} switched '{}' -> '{}'",
                    command.target,
                    report.from,
                    report.to
                );
                ExecutionResult::successful(command.clone())
            }
            Some(Err(e)) => {
                tracing::error!("algorithm change at {} failed: {}", command.target, e);
                ExecutionResult::failed(command.clone(), error_code(&e), e.to_string())
            }
        }
    }

    fn visit_parameter_change(
        &mut self,
        command: &ParameterChangeCommand<ParameterValue>,
    ) -> ExecutionResult {
        let local = self.with_switch(&command.target, |switch| {
            switch.set_parameter(&command.parameter, &command.value)
        });
        match local {
            Some(Ok(())) => ExecutionResult::successful(command.clone()),
            Some(Err(e)) => ExecutionResult::failed(command.clone(), error_code(&e), e.to_string()),
            None => {
                let signal = ElementSignal::Parameter {
                    name: command.parameter.clone(),
                    value: command.value.clone(),
                };
                match self.send(SignalTarget::Element(command.target.clone()), signal) {
                    Ok(()) => ExecutionResult::successful(command.clone()),
                    Err(message) => ExecutionResult::failed(
                        command.clone(),
                        ExecutionCode::SignalSendTransient,
                        message,
                    ),
                }
            }
        }
    }

    fn visit_load_shedding(&mut self, command: &LoadSheddingCommand) -> ExecutionResult {
        let signal = ElementSignal::LoadShedding {
            shedder: command.shedder.clone(),
            parameters: command.parameters.clone(),
        };
        match self.send(SignalTarget::Element(command.target.clone()), signal) {
            Ok(()) => ExecutionResult::successful(command.clone()),
            Err(message) => ExecutionResult::failed(
                command.clone(),
                ExecutionCode::SignalSendTransient,
                message,
            ),
        }
    }

    fn visit_replay(&mut self, command: &ReplayCommand) -> ExecutionResult {
        let signal = ElementSignal::Replay {
            ticket: command.ticket,
            start: command.start,
            window: command.window.clone(),
        };
        match self.send(SignalTarget::Element(command.target.clone()), signal) {
            Ok(()) => ExecutionResult::successful(command.clone()),
            Err(message) => ExecutionResult::failed(
                command.clone(),
                ExecutionCode::SignalSendTransient,
                message,
            ),
        }
    }

    fn visit_pipeline(&mut self, command: &PipelineCommand) -> ExecutionResult {
        let signal = ElementSignal::Pipeline {
            status: command.status,
        };
        match self.send(SignalTarget::Pipeline(command.pipeline.clone()), signal) {
            Ok(()) => ExecutionResult::successful(command.clone()),
            Err(message) => ExecutionResult::failed(
                command.clone(),
                ExecutionCode::SignalSendTransient,
                message,
            ),
        }
    }
}
