//! Tuples flowing through a pipeline and their wire serializers.
//!
//! A tuple's [`TupleKind`] is a property of the stream it arrived on, not of
//! the tuple itself: the kind is never written to the wire. The serializer
//! that decodes a payload stamps its own kind on the result, so receivers can
//! tell general traffic from traffic produced during a cutover.

use serde::{Deserialize, Serialize};

/// Whether a tuple belongs to normal operation or to a cutover in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TupleKind {
    /// Normal operating tuple
    #[default]
    General,
    /// Tuple produced while a cutover is in progress
    Switch,
}

impl TupleKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            TupleKind::General => "general",
            TupleKind::Switch => "switch",
        }
    }
}

impl std::fmt::Display for TupleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A single field value carried by a tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TupleValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl TupleValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TupleValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            TupleValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            TupleValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TupleValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TupleValue::Bytes(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for TupleValue {
    fn from(v: bool) -> Self {
        TupleValue::Bool(v)
    }
}

impl From<i64> for TupleValue {
    fn from(v: i64) -> Self {
        TupleValue::Int(v)
    }
}

impl From<f64> for TupleValue {
    fn from(v: f64) -> Self {
        TupleValue::Float(v)
    }
}

impl From<&str> for TupleValue {
    fn from(v: &str) -> Self {
        TupleValue::Text(v.to_string())
    }
}

impl From<String> for TupleValue {
    fn from(v: String) -> Self {
        TupleValue::Text(v)
    }
}

/// An opaque data record moved between pipeline elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuple {
    /// Stream-level kind, stamped on decode.
    #[serde(skip)]
    pub kind: TupleKind,
    /// Producer-assigned sequence number, used for acknowledgement bookkeeping.
    pub sequence: u64,
    pub values: Vec<TupleValue>,
}

impl Tuple {
    pub fn new(sequence: u64, values: Vec<TupleValue>) -> Self {
        Self {
            kind: TupleKind::General,
            sequence,
            values,
        }
    }

    /// Builder-style kind override.
    pub fn with_kind(mut self, kind: TupleKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn get(&self, index: usize) -> Option<&TupleValue> {
        self.values.get(index)
    }

    pub fn is_switch(&self) -> bool {
        self.kind == TupleKind::Switch
    }
}

/// Encodes tuples for a data frame and decodes them back for one stream kind.
pub trait TupleSerializer: Send + Sync {
    /// Kind stamped on every tuple this serializer decodes.
    fn kind(&self) -> TupleKind;

    /// Encode a tuple into a data-frame payload.
    fn serialize(&self, tuple: &Tuple) -> Result<Vec<u8>, crate::transport::TransportError>;

    /// Decode a payload. `None` for corrupt or incompatible payloads.
    fn deserialize(&self, bytes: &[u8]) -> Option<Tuple>;
}

/// Compact binary serializer.
#[derive(Debug, Clone, Copy)]
pub struct BincodeTupleSerializer {
    kind: TupleKind,
}

impl BincodeTupleSerializer {
    pub fn new(kind: TupleKind) -> Self {
        Self { kind }
    }
}

impl TupleSerializer for BincodeTupleSerializer {
    fn kind(&self) -> TupleKind {
        self.kind
    }

    fn serialize(&self, tuple: &Tuple) -> Result<Vec<u8>, crate::transport::TransportError> {
        bincode::serialize(tuple)
            .map_err(|e| crate::transport::TransportError::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Option<Tuple> {
        match bincode::deserialize::<Tuple>(bytes) {
            Ok(tuple) => Some(tuple.with_kind(self.kind)),
            Err(e) => {
                tracing::debug!("bincode payload rejected ({} bytes): {}", bytes.len(), e);
                None
            }
        }
    }
}

/// Human-readable serializer, useful when debugging traffic.
#[derive(Debug, Clone, Copy)]
pub struct JsonTupleSerializer {
    kind: TupleKind,
}

impl JsonTupleSerializer {
    pub fn new(kind: TupleKind) -> Self {
        Self { kind }
    }
}

impl TupleSerializer for JsonTupleSerializer {
    fn kind(&self) -> TupleKind {
        self.kind
    }

    fn serialize(&self, tuple: &Tuple) -> Result<Vec<u8>, crate::transport::TransportError> {
        serde_json::to_vec(tuple)
            .map_err(|e| crate::transport::TransportError::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Option<Tuple> {
        match serde_json::from_slice::<Tuple>(bytes) {
            Ok(tuple) => Some(tuple.with_kind(self.kind)),
            Err(e) => {
                tracing::debug!("json payload rejected ({} bytes): {}", bytes.len(), e);
                None
            }
        }
    }
}

/// Wire encoding selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializerFormat {
    #[default]
    Bincode,
    Json,
}

impl SerializerFormat {
    /// Build the serializer for one stream kind.
    pub fn serializer(&self, kind: TupleKind) -> Box<dyn TupleSerializer> {
        match self {
            SerializerFormat::Bincode => Box::new(BincodeTupleSerializer::new(kind)),
            SerializerFormat::Json => Box::new(JsonTupleSerializer::new(kind)),
        }
    }
}
