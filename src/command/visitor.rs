//! Execution contract for commands.

use super::element::{AlgorithmChangeCommand, LoadSheddingCommand, ParameterChangeCommand};
use super::parameters::ParameterValue;
use super::replay::{PipelineCommand, ReplayCommand};
use super::result::ExecutionResult;

/// One handler per leaf command variant. Containers are executed by
/// [`Command::accept`](super::Command::accept) itself.
pub trait CommandVisitor {
    fn visit_algorithm_change(&mut self, command: &AlgorithmChangeCommand) -> ExecutionResult;

    fn visit_parameter_change(
        &mut self,
        command: &ParameterChangeCommand<ParameterValue>,
    ) -> ExecutionResult;

    fn visit_load_shedding(&mut self, command: &LoadSheddingCommand) -> ExecutionResult;

    fn visit_replay(&mut self, command: &ReplayCommand) -> ExecutionResult;

    fn visit_pipeline(&mut self, command: &PipelineCommand) -> ExecutionResult;
}
