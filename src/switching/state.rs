//! Role of a strategy instance.

use serde::{Deserialize, Serialize};

/// Whether a strategy instance is the current source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SwitchState {
    /// Supplies tuples to the element it is wired into
    Active,
    /// Stands by and buffers; never emits
    #[default]
    Passive,
}

impl SwitchState {
    pub fn display_name(&self) -> &'static str {
        match self {
            SwitchState::Active => "ACTIVE",
            SwitchState::Passive => "PASSIVE",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SwitchState::Active)
    }
}

impl std::fmt::Display for SwitchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
