//! Command protocol driving switches and other pipeline-wide control actions.
//!
//! Commands are plain data. They arrive from an external event bus (as JSON),
//! or are built from flat argument lists with [`parse_command`], and are run
//! by a [`CommandVisitor`] that reports an [`ExecutionResult`].
//!
//! # Commands
//!
//! - [`AlgorithmChangeCommand`] - Switch an element to another algorithm
//! - [`ParameterChangeCommand`] - Change one named parameter of an element
//! - [`LoadSheddingCommand`] - Enable, replace or disable a load shedder
//! - [`ReplayCommand`] - Start or stop a replay session on a sink
//! - [`PipelineCommand`] - Request a pipeline lifecycle change
//! - [`CommandSequence`] / [`CommandSet`] - Ordered and unordered containers
//!
//! # Execution
//!
//! [`Command::accept`] dispatches leaf commands to the matching visitor
//! method and runs containers child by child. Execution failures are never
//! errors: they come back as an [`ExecutionResult`] with a non-success
//! [`ExecutionCode`]. Only building a command can fail with a
//! [`CommandError`].
//!
//! # Example
//!
//! ```ignore
//! use algoswitch::command::{parse_command, Command};
//!
//! let command = parse_command(&["changeAlgo", "pip", "switch", "fast", "inputPort", "4000"])?;
//! let result = command.accept(&mut coordinator);
//! if !result.is_successful() {
//!     eprintln!("{}", result);
//! }
//! ```

pub mod cli;
pub mod container;
pub mod element;
pub mod parameters;
pub mod replay;
pub mod result;
pub mod visitor;

pub use cli::parse_command;
pub use container::{CommandSequence, CommandSet};
pub use element::{
    AlgorithmChangeCommand, ElementTarget, LoadSheddingCommand, ParameterChangeCommand,
};
pub use parameters::{AlgorithmParameters, ParameterName, ParameterType, ParameterValue};
pub use replay::{PipelineCommand, PipelineStatus, ReplayCommand, ReplayWindow};
pub use result::{ExecutionCode, ExecutionResult};
pub use visitor::CommandVisitor;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or parsing a command.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// A value does not fit the parameter or field it was given for
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The argument list is malformed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The first argument names no known command
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

/// Any command, leaf or container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    AlgorithmChange(AlgorithmChangeCommand),
    ParameterChange(ParameterChangeCommand<ParameterValue>),
    LoadShedding(LoadSheddingCommand),
    Replay(ReplayCommand),
    Pipeline(PipelineCommand),
    Sequence(CommandSequence),
    Set(CommandSet),
}

impl Command {
    pub fn display_name(&self) -> &'static str {
        match self {
            Command::AlgorithmChange(_) => "algorithm change",
            Command::ParameterChange(_) => "parameter change",
            Command::LoadShedding(_) => "load shedding",
            Command::Replay(_) => "replay",
            Command::Pipeline(_) => "pipeline",
            Command::Sequence(_) => "sequence",
            Command::Set(_) => "set",
        }
    }

    /// Pipeline addressed by a leaf command.
    pub fn pipeline(&self) -> Option<&str> {
        match self {
            Command::AlgorithmChange(c) => Some(&c.target.pipeline),
            Command::ParameterChange(c) => Some(&c.target.pipeline),
            Command::LoadShedding(c) => Some(&c.target.pipeline),
            Command::Replay(c) => Some(&c.target.pipeline),
            Command::Pipeline(c) => Some(&c.pipeline),
            Command::Sequence(_) | Command::Set(_) => None,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Command::Sequence(_) | Command::Set(_))
    }

    /// Collapse empty and single-child containers. `None` means "no command".
    pub fn simplify(self) -> Option<Command> {
        match self {
            Command::Sequence(s) => s.simplify(),
            Command::Set(s) => s.simplify(),
            leaf => Some(leaf),
        }
    }

    /// Execute through `visitor`.
    pub fn accept(&self, visitor: &mut dyn CommandVisitor) -> ExecutionResult {
        match self {
            Command::AlgorithmChange(c) => visitor.visit_algorithm_change(c),
            Command::ParameterChange(c) => visitor.visit_parameter_change(c),
            Command::LoadShedding(c) => visitor.visit_load_shedding(c),
            Command::Replay(c) => visitor.visit_replay(c),
            Command::Pipeline(c) => visitor.visit_pipeline(c),
            Command::Sequence(s) => s.execute(visitor),
            Command::Set(s) => s.execute(visitor),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::AlgorithmChange(c) => write!(f, "changeAlgo {} -> {}", c.target, c.algorithm),
            Command::ParameterChange(c) => {
                write!(f, "changeParam {} {}={}", c.target, c.parameter, c.value)
            }
            Command::LoadShedding(c) => match &c.shedder {
                Some(shedder) => write!(f, "shedding {} {}", c.target, shedder),
                None => write!(f, "shedding {} off", c.target),
            },
            Command::Replay(c) => write!(
                f,
                "replay {} ticket {} {}",
                c.target,
                c.ticket,
                if c.start { "start" } else { "stop" }
            ),
            Command::Pipeline(c) => write!(f, "pipeline {} {}", c.pipeline, c.status),
            Command::Sequence(s) => write!(f, "sequence of {}", s.len()),
            Command::Set(s) => write!(f, "set of {}", s.len()),
        }
    }
}

impl From<AlgorithmChangeCommand> for Command {
    fn from(command: AlgorithmChangeCommand) -> Self {
        Command::AlgorithmChange(command)
    }
}

impl From<LoadSheddingCommand> for Command {
    fn from(command: LoadSheddingCommand) -> Self {
        Command::LoadShedding(command)
    }
}

impl From<ReplayCommand> for Command {
    fn from(command: ReplayCommand) -> Self {
        Command::Replay(command)
    }
}

impl From<PipelineCommand> for Command {
    fn from(command: PipelineCommand) -> Self {
        Command::Pipeline(command)
    }
}

impl From<CommandSequence> for Command {
    fn from(sequence: CommandSequence) -> Self {
        Command::Sequence(sequence)
    }
}

impl From<CommandSet> for Command {
    fn from(set: CommandSet) -> Self {
        Command::Set(set)
    }
}
