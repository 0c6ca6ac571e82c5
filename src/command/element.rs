//! Commands addressed to one element of a pipeline.

use super::parameters::{AlgorithmParameters, ParameterName, ParameterValue};
use super::{Command, CommandError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pipeline name plus element name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementTarget {
    pub pipeline: String,
    pub element: String,
}

impl ElementTarget {
    pub fn new(pipeline: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            element: element.into(),
        }
    }
}

impl std::fmt::Display for ElementTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.pipeline, self.element)
    }
}

/// Switch an element to another algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmChangeCommand {
    pub target: ElementTarget,
    pub algorithm: String,
    #[serde(default)]
    pub parameters: AlgorithmParameters,
}

impl AlgorithmChangeCommand {
    pub fn new(
        pipeline: impl Into<String>,
        element: impl Into<String>,
        algorithm: impl Into<String>,
    ) -> Self {
        Self {
            target: ElementTarget::new(pipeline, element),
            algorithm: algorithm.into(),
            parameters: AlgorithmParameters::new(),
        }
    }

    pub fn set_int_parameter(
        &mut self,
        name: ParameterName,
        value: i64,
    ) -> Result<(), CommandError> {
        self.parameters.set_int(name, value)
    }

    pub fn set_string_parameter(&mut self, name: ParameterName, value: impl Into<String>) {
        self.parameters.set_string(name, value);
    }

    pub fn get_int_parameter(&self, name: ParameterName, default: Option<i64>) -> Option<i64> {
        self.parameters.get_int(name, default)
    }

    pub fn get_string_parameter(
        &self,
        name: ParameterName,
        default: Option<&str>,
    ) -> Option<String> {
        self.parameters.get_string(name, default)
    }
}

/// Change one named parameter of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChangeCommand<T> {
    pub target: ElementTarget,
    pub parameter: String,
    pub value: T,
}

impl<T> ParameterChangeCommand<T> {
    pub fn new(
        pipeline: impl Into<String>,
        element: impl Into<String>,
        parameter: impl Into<String>,
        value: T,
    ) -> Self {
        Self {
            target: ElementTarget::new(pipeline, element),
            parameter: parameter.into(),
            value,
        }
    }
}

impl<T: Into<ParameterValue>> ParameterChangeCommand<T> {
    /// Erase the value type.
    pub fn into_generic(self) -> ParameterChangeCommand<ParameterValue> {
        ParameterChangeCommand {
            target: self.target,
            parameter: self.parameter,
            value: self.value.into(),
        }
    }
}

impl<T: Into<ParameterValue>> From<ParameterChangeCommand<T>> for Command {
    fn from(command: ParameterChangeCommand<T>) -> Self {
        Command::ParameterChange(command.into_generic())
    }
}

/// Enable, replace or disable the load shedder of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSheddingCommand {
    pub target: ElementTarget,
    /// Shedder identifier; `None` disables shedding
    pub shedder: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterValue>,
}

impl LoadSheddingCommand {
    /// An empty shedder name disables shedding too.
    pub fn new(
        pipeline: impl Into<String>,
        element: impl Into<String>,
        shedder: Option<String>,
    ) -> Self {
        Self {
            target: ElementTarget::new(pipeline, element),
            shedder: shedder.filter(|s| !s.trim().is_empty()),
            parameters: BTreeMap::new(),
        }
    }

    pub fn disable(pipeline: impl Into<String>, element: impl Into<String>) -> Self {
        Self::new(pipeline, element, None)
    }

    pub fn is_disable(&self) -> bool {
        self.shedder.is_none()
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// String encoding of a parameter, with a fallback.
    pub fn get_string_parameter(&self, name: &str, default: Option<&str>) -> Option<String> {
        self.parameters
            .get(name)
            .map(ToString::to_string)
            .or_else(|| default.map(str::to_string))
    }

    pub fn get_int_parameter(&self, name: &str, default: Option<i64>) -> Option<i64> {
        self.parameters
            .get(name)
            .and_then(ParameterValue::as_int)
            .or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_change_parameters() {
        let mut command = AlgorithmChangeCommand::new("pip", "switch", "fast");
        command.set_int_parameter(ParameterName::InputPort, 1234).unwrap();
        assert_eq!(command.get_int_parameter(ParameterName::InputPort, None), Some(1234));

        let err = command
            .set_int_parameter(ParameterName::CoprocessorHost, 1)
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgument(_)));

        command.set_string_parameter(ParameterName::CoprocessorHost, "gpu-1");
        assert_eq!(
            command.get_string_parameter(ParameterName::CoprocessorHost, None).as_deref(),
            Some("gpu-1")
        );
    }

    #[test]
    fn test_parameter_change_converts_into_command() {
        let command: Command = ParameterChangeCommand::new("pip", "src", "rate", 5i64).into();
        match command {
            Command::ParameterChange(c) => {
                assert_eq!(c.parameter, "rate");
                assert_eq!(c.value, ParameterValue::Int(5));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_load_shedding_disable() {
        assert!(LoadSheddingCommand::disable("pip", "e").is_disable());
        assert!(LoadSheddingCommand::new("pip", "e", Some(" ".into())).is_disable());

        let mut command = LoadSheddingCommand::new("pip", "e", Some("probabilistic".into()));
        command.set_parameter("ratio", 0.25);
        command.set_parameter("interval", "30");
        assert!(!command.is_disable());
        assert_eq!(command.get_string_parameter("ratio", None).as_deref(), Some("0.25"));
        assert_eq!(command.get_int_parameter("interval", None), Some(30));
        assert_eq!(command.get_int_parameter("missing", Some(1)), Some(1));
    }
}
