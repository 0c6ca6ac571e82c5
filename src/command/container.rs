//! Ordered and unordered command containers.

use super::result::ExecutionResult;
use super::visitor::CommandVisitor;
use super::Command;
use serde::{Deserialize, Serialize};

/// Commands that must run in exactly this order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandSequence {
    pub commands: Vec<Command>,
}

/// Commands whose order does not matter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandSet {
    pub commands: Vec<Command>,
}

fn simplify_children(commands: Vec<Command>) -> Vec<Command> {
    commands.into_iter().filter_map(Command::simplify).collect()
}

/// Zero children collapse to nothing, one child to itself.
fn collapse(mut commands: Vec<Command>, wrap: fn(Vec<Command>) -> Command) -> Option<Command> {
    match commands.len() {
        0 => None,
        1 => commands.pop(),
        _ => Some(wrap(commands)),
    }
}

/// Run `commands` in order. Failures are folded with
/// [`ExecutionResult::merge`]; iteration stops at the first failure that
/// does not allow continuing.
fn execute_all<'a>(
    commands: impl Iterator<Item = &'a Command>,
    visitor: &mut dyn CommandVisitor,
    whole: impl FnOnce() -> Command,
) -> ExecutionResult {
    let mut folded: Option<ExecutionResult> = None;
    for command in commands {
        let result = command.accept(visitor);
        if result.is_successful() {
            continue;
        }
        tracing::debug!("command failed: {}", result);
        let stop = !result.continue_iteration();
        folded = Some(match folded {
            Some(previous) => previous.merge(result),
            None => result,
        });
        if stop {
            break;
        }
    }
    folded.unwrap_or_else(|| ExecutionResult::successful(whole()))
}

impl CommandSequence {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    pub fn push(&mut self, command: impl Into<Command>) {
        self.commands.push(command.into());
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Simplify children, drop the empty ones, unwrap a single child.
    /// Order is preserved.
    pub fn simplify(self) -> Option<Command> {
        collapse(simplify_children(self.commands), |commands| {
            Command::Sequence(CommandSequence { commands })
        })
    }

    pub fn execute(&self, visitor: &mut dyn CommandVisitor) -> ExecutionResult {
        execute_all(self.commands.iter(), visitor, || Command::Sequence(self.clone()))
    }
}

impl CommandSet {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    pub fn push(&mut self, command: impl Into<Command>) {
        self.commands.push(command.into());
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Like [`CommandSequence::simplify`], and additionally drops children
    /// equal to an earlier one.
    pub fn simplify(self) -> Option<Command> {
        let mut unique: Vec<Command> = Vec::new();
        for command in simplify_children(self.commands) {
            if !unique.contains(&command) {
                unique.push(command);
            }
        }
        collapse(unique, |commands| Command::Set(CommandSet { commands }))
    }

    pub fn execute(&self, visitor: &mut dyn CommandVisitor) -> ExecutionResult {
        execute_all(self.commands.iter(), visitor, || Command::Set(self.clone()))
    }
}
