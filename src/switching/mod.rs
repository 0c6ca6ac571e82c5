//! Switching: which algorithm instance is authoritative, and how to change it.
//!
//! This module composes the hand-off queue and the tuple transport into a
//! live algorithm replacement.
//!
//! # Components
//!
//! - [`SwitchState`] - Active or passive role of a strategy
//! - [`QueueHolder`] - The `in`, `tmp` and `out` queues of one intermediary
//! - [`SwitchSignal`] / [`SignalValue`] - Externally delivered triggers and their read-back
//! - [`SwitchStrategy`] - Produces tuples, reacts to signals, hands out receivers
//! - [`SeparateIntermediaryStrategy`] - The built-in strategy owning its own queues
//! - [`StrategyRegistry`] - Explicit name to constructor map
//! - [`Intermediary`] - Runs an [`Algorithm`] and drives the cutover
//!
//! # Threading
//!
//! One receiver thread runs per upstream connection and only enqueues. The
//! thread calling [`Intermediary::step`] is the only consumer of `in`. Signals
//! may arrive on any thread; the strategy applies them under the same lock
//! that gates tuple production.
//!
//! # Example
//!
//! ```ignore
//! use algoswitch::switching::{Intermediary, SeparateIntermediaryStrategy};
//!
//! let strategy = Box::new(SeparateIntermediaryStrategy::from_config(&config));
//! let receivers = strategy.receiver_factory().accept_upstreams(&listener, 2)?;
//! let mut node = Intermediary::new(strategy, initial, downstream_tx, &config)?;
//!
//! // worker loop
//! while running.load(Ordering::Relaxed) {
//!     node.step();
//! }
//! ```

pub mod intermediary;
pub mod queue_holder;
pub mod registry;
pub mod separate;
pub mod signal;
pub mod state;
pub mod strategy;

pub use intermediary::{
    Algorithm, AlgorithmRegistry, AlgorithmSwitch, BoxedAlgorithm, CutoverReport, Intermediary,
    SharedSender,
};
pub use queue_holder::{ModeAck, QueueHolder};
pub use registry::StrategyRegistry;
pub use separate::{SeparateIntermediaryStrategy, SEPARATE_STRATEGY};
pub use signal::{names as signal_names, SignalValue, SwitchSignal};
pub use state::SwitchState;
pub use strategy::{ReceiverFactory, SwitchStrategy};
