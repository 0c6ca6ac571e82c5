//! Transfer of accumulated algorithm state across a cutover.
//!
//! A running algorithm instance accumulates counters, windows and partial
//! aggregates. When the instance is replaced, [`StateTransfer`] merges the old
//! instance's state into the new one, field by field, following each field's
//! declared [`MergeStrategy`].
//!
//! # Schema instead of reflection
//!
//! A stateful type implements [`Stateful`] and returns a [`StateSchema`]: a
//! list of [`StateField`]s, each pairing accessors with a merge strategy and
//! inclusion flags. The engine walks that list. Field values implement
//! [`StateValue`], which classifies them as list, set, map or plain and knows
//! how to merge two values of the same type.
//!
//! # Handler resolution
//!
//! For every eligible field whose target and source values are both present:
//!
//! 1. a handler registered for this owner type and field name,
//! 2. a handler registered for the field's value type,
//! 3. the built-in behavior of the value (collections merge, plain values are
//!    overwritten, nested state recurses).
//!
//! Handlers live in an explicit [`HandlerRegistry`] value owned by the engine.

pub mod engine;
pub mod registry;
pub mod schema;
pub mod value;

pub use engine::{StateTransfer, TransferReport};
pub use registry::{FieldHandler, HandlerRegistry};
pub use schema::{InclusionMode, StateField, StateSchema, Stateful};
pub use value::{ContainerKind, StateValue};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a field's values from the old and new instance are combined.
///
/// Throughout this module the *target* is the instance being written to and
/// the *source* is the instance whose values are carried over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MergeStrategy {
    /// Plain values are overwritten, nested state recurses, collections are
    /// replaced by the source's contents.
    #[default]
    Default,
    /// Discard the target's contents and take the source's.
    ClearAndFill,
    /// Target's contents followed by the source's. Lists keep duplicates,
    /// maps let source entries win.
    Merge,
    /// Target's contents plus only those source entries that are not present
    /// yet. Target entries win on conflict.
    MergeAndKeepOld,
}

impl MergeStrategy {
    pub fn display_name(&self) -> &'static str {
        match self {
            MergeStrategy::Default => "DEFAULT",
            MergeStrategy::ClearAndFill => "CLEAR_AND_FILL",
            MergeStrategy::Merge => "MERGE",
            MergeStrategy::MergeAndKeepOld => "MERGE_AND_KEEP_OLD",
        }
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Errors raised while merging state.
#[derive(Error, Debug)]
pub enum StateTransferError {
    /// A registered handler was given a value of a type it does not handle.
    #[error("Handler for field '{field}' expected a value of type {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },

    /// A registered handler could not create a fresh container for a type.
    #[error("Cannot instantiate {type_name} for field '{field}'")]
    Instantiation {
        field: String,
        type_name: &'static str,
    },

    /// A registered handler refused to merge.
    #[error("Handler for field '{field}' failed: {message}")]
    Handler { field: String, message: String },
}
