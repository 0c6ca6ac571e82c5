//! Typed command parameters.

use super::CommandError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A generic parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParameterValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(v) => Some(*v),
            ParameterValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Integer value; a text value holding an integer also qualifies.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            ParameterValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Best-effort typing of a command-line token.
    pub fn parse(token: &str) -> Self {
        if let Ok(v) = token.parse::<bool>() {
            ParameterValue::Bool(v)
        } else if let Ok(v) = token.parse::<i64>() {
            ParameterValue::Int(v)
        } else if let Ok(v) = token.parse::<f64>() {
            ParameterValue::Float(v)
        } else {
            ParameterValue::Text(token.to_string())
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        ParameterValue::Int(v as i64)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::Text(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        ParameterValue::Text(v)
    }
}

/// Declared value type of a [`ParameterName`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    Int,
    Text,
}

/// Closed set of parameters an algorithm change may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterName {
    InputPort,
    OutputPort,
    WarmupDelay,
    CoprocessorHost,
    TargetHost,
}

impl ParameterName {
    /// Command-line token of the parameter.
    pub fn token(&self) -> &'static str {
        match self {
            ParameterName::InputPort => "inputPort",
            ParameterName::OutputPort => "outputPort",
            ParameterName::WarmupDelay => "warmupDelay",
            ParameterName::CoprocessorHost => "coprocessorHost",
            ParameterName::TargetHost => "targetHost",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|p| p.token().eq_ignore_ascii_case(token))
    }

    pub fn all() -> &'static [ParameterName] {
        &[
            ParameterName::InputPort,
            ParameterName::OutputPort,
            ParameterName::WarmupDelay,
            ParameterName::CoprocessorHost,
            ParameterName::TargetHost,
        ]
    }

    pub fn value_type(&self) -> ParameterType {
        match self {
            ParameterName::InputPort | ParameterName::OutputPort | ParameterName::WarmupDelay => {
                ParameterType::Int
            }
            ParameterName::CoprocessorHost | ParameterName::TargetHost => ParameterType::Text,
        }
    }
}

impl std::fmt::Display for ParameterName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Parameter map of an algorithm change, checked against each name's type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgorithmParameters {
    values: BTreeMap<ParameterName, ParameterValue>,
}

impl AlgorithmParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an integer. Fails for text-typed parameters.
    pub fn set_int(&mut self, name: ParameterName, value: i64) -> Result<(), CommandError> {
        if name.value_type() != ParameterType::Int {
            return Err(CommandError::InvalidArgument(format!(
                "parameter '{}' does not take an integer",
                name
            )));
        }
        self.values.insert(name, ParameterValue::Int(value));
        Ok(())
    }

    /// Set any parameter through its string encoding. Always accepted.
    pub fn set_string(&mut self, name: ParameterName, value: impl Into<String>) {
        self.values.insert(name, ParameterValue::Text(value.into()));
    }

    /// Integer value of `name`, or `default` when unset or not an integer.
    pub fn get_int(&self, name: ParameterName, default: Option<i64>) -> Option<i64> {
        self.values.get(&name).and_then(ParameterValue::as_int).or(default)
    }

    /// String encoding of `name`, or `default` when unset.
    pub fn get_string(&self, name: ParameterName, default: Option<&str>) -> Option<String> {
        self.values
            .get(&name)
            .map(ToString::to_string)
            .or_else(|| default.map(str::to_string))
    }

    pub fn get(&self, name: ParameterName) -> Option<&ParameterValue> {
        self.values.get(&name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParameterName, &ParameterValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
