//! # algoswitch: live algorithm switching for stream pipelines
//!
//! Replaces the processing algorithm of a running pipeline element without
//! stopping the data flow and without losing or duplicating in-flight
//! tuples. The pieces, leaves first:
//!
//! ## Architecture
//!
//! - **Queue**: [`queue::BoundedQueue`], the blocking hand-off between threads
//! - **Transport**: length-prefixed frames over TCP with in-band mode frames
//!   that move a connection between tuple kinds and destination queues
//! - **Switching**: the intermediary element, its strategy and the five step
//!   cutover that parks new traffic while the old algorithm drains
//! - **State transfer**: schema-driven merge of the outgoing algorithm's state
//!   into the incoming one
//! - **Commands**: the control protocol that triggers switches and other
//!   element actions and reports structured results
//! - **Coordination**: executes commands against local intermediaries and
//!   signals remote elements
//!
//! ## Configuration
//!
//! Runtime settings live in `algoswitch.toml` under the platform config
//! directory (see [`config::default_config_path`]):
//!
//! - **Linux**: `~/.config/algoswitch/`
//! - **macOS**: `~/Library/Application Support/algoswitch/`
//! - **Windows**: `%APPDATA%\algoswitch\`
//!
//! ## Example
//!
//! ```ignore
//! use algoswitch::{
//!     config::SwitchConfig,
//!     switching::{Intermediary, SeparateIntermediaryStrategy},
//! };
//!
//! let config = SwitchConfig::load_or_default(&path);
//! let strategy = Box::new(SeparateIntermediaryStrategy::from_config(&config));
//! let (downstream, outputs) = crossbeam_channel::unbounded();
//! let mut node = Intermediary::new(strategy, initial_algorithm, downstream, &config)?
//!     .with_algorithms(registry);
//!
//! std::thread::spawn(move || loop {
//!     node.step();
//! });
//! ```

pub mod command;
pub mod config;
pub mod coordination;
pub mod error;
pub mod queue;
pub mod state_transfer;
pub mod switching;
pub mod transport;
pub mod tuple;

// Re-export commonly used types
pub use command::{Command, ExecutionCode, ExecutionResult};
pub use config::SwitchConfig;
pub use coordination::{ElementSignal, ElementSignalSender, SwitchCoordinator};
pub use error::{Result, SwitchError};
pub use queue::BoundedQueue;
pub use state_transfer::{MergeStrategy, StateTransfer, Stateful};
pub use switching::{Algorithm, Intermediary, SwitchStrategy};
pub use tuple::{Tuple, TupleKind, TupleValue};
