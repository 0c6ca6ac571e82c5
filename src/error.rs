//! Error handling for algoswitch
//!
//! This module defines the crate-wide error type and a Result alias. Each
//! subsystem (transport, state transfer, commands) keeps its own error enum
//! and converts into [`SwitchError`] at the boundary.

use crate::command::CommandError;
use crate::state_transfer::StateTransferError;
use crate::transport::TransportError;
use thiserror::Error;

/// Main error type for algoswitch operations
#[derive(Error, Debug)]
pub enum SwitchError {
    /// Errors raised by the tuple transport
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Errors raised while merging algorithm state
    #[error("State transfer error: {0}")]
    StateTransfer(#[from] StateTransferError),

    /// Errors raised while building or parsing commands
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// A strategy or algorithm was requested that is not registered
    #[error("Not registered: {0}")]
    NotRegistered(String),

    /// The switch was requested in a state that does not allow it
    #[error("Invalid switch state: {0}")]
    InvalidState(String),

    /// Timeout errors
    #[error("Timeout: {0}")]
    Timeout(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SwitchError>,
    },
}

impl SwitchError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SwitchError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for algoswitch operations
pub type Result<T> = std::result::Result<T, SwitchError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<SwitchError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
