//! Configuration module for algoswitch
//!
//! [`SwitchConfig`] holds the runtime knobs of an intermediary: queue sizes,
//! transport limits, the serializer used on the wire and how long a cutover
//! waits for upstream acknowledgements. Every field has a default, so a
//! partial file (or no file at all) is valid.
//!
//! # Formats
//!
//! Files ending in `.json` are read and written as JSON; anything else is
//! treated as TOML.
//!
//! # Default Location
//!
//! The default configuration file lives in the platform config directory:
//! - **Linux**: `~/.config/algoswitch/algoswitch.toml`
//! - **macOS**: `~/Library/Application Support/algoswitch/algoswitch.toml`
//! - **Windows**: `%APPDATA%\algoswitch\algoswitch.toml`
//!
//! # Example
//!
//! ```ignore
//! use algoswitch::config::SwitchConfig;
//!
//! let config = SwitchConfig::load_or_default("algoswitch.toml");
//! let strategy = SeparateIntermediaryStrategy::from_config(&config);
//! ```

use crate::error::{Result, SwitchError};
use crate::tuple::SerializerFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "algoswitch";

/// Default config filename
pub const CONFIG_FILE: &str = "algoswitch.toml";

/// Default capacity of the `in` and `tmp` queues
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default number of emitted tuples kept for replay until acknowledged
pub const DEFAULT_OUT_CAPACITY: usize = 4096;

/// Default poll timeout separating "no data yet" from "end of data"
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 20;

/// Default upper bound for one data frame (16 MiB)
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Default time a cutover waits for mode acknowledgements
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 5000;

/// Platform config directory for algoswitch.
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Path of the default config file.
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SwitchConfig {
    // Plain values must precede the tables when written as TOML.
    /// Directory for daily rolling log files. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub cutover: CutoverConfig,
}

/// Hand-off queue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Capacity of the `in` and `tmp` queues
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    /// How long `produce_tuple` waits for input before yielding nothing
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Unacknowledged tuples kept in `out`; the oldest is evicted beyond this
    #[serde(default = "default_out_capacity")]
    pub out_capacity: usize,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_poll_timeout_ms() -> u64 {
    DEFAULT_POLL_TIMEOUT_MS
}

fn default_out_capacity() -> usize {
    DEFAULT_OUT_CAPACITY
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            out_capacity: DEFAULT_OUT_CAPACITY,
        }
    }
}

impl QueueConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

/// Tuple transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Data frames longer than this end the receiver
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,

    /// Encoding of tuples on the wire
    #[serde(default)]
    pub serializer: SerializerFormat,

    /// Connect timeout for senders; blocking connect when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
}

fn default_max_frame_len() -> usize {
    DEFAULT_MAX_FRAME_LEN
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            serializer: SerializerFormat::default(),
            connect_timeout_ms: None,
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

/// Cutover settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoverConfig {
    /// How long to wait for upstream receivers to acknowledge a mode change
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
}

fn default_ack_timeout_ms() -> u64 {
    DEFAULT_ACK_TIMEOUT_MS
}

impl Default for CutoverConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
        }
    }
}

impl CutoverConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

impl SwitchConfig {
    /// Load a config file, TOML or JSON by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SwitchError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        if is_json(path) {
            serde_json::from_str(&content).map_err(|e| {
                SwitchError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })
        } else {
            toml::from_str(&content).map_err(|e| {
                SwitchError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })
        }
    }

    /// Load a config file, falling back to defaults on any error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to disk, TOML or JSON by extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SwitchError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = if is_json(path) {
            serde_json::to_string_pretty(self)
                .map_err(|e| SwitchError::Config(format!("Failed to serialize config: {}", e)))?
        } else {
            self.to_toml()?
        };

        std::fs::write(path, content).map_err(|e| {
            SwitchError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SwitchError::Config(format!("Failed to serialize config: {}", e)))
    }
}
