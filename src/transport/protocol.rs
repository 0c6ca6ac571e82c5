//! Receiver-side protocol state machine.
//!
//! The receiver's interpretation of data frames is a small explicit value,
//! [`ReceiverMode`]. [`transition`] is pure: it never touches a socket or a
//! queue, which keeps the multiplexing rules testable on their own.

use super::frame::{Frame, ModeFlag};
use crate::tuple::{SerializerFormat, Tuple, TupleKind, TupleSerializer};
use serde::{Deserialize, Serialize};

/// Queue a decoded data frame is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Destination {
    /// The intermediary's `in` queue
    #[default]
    GeneralQueue,
    /// The intermediary's `tmp` queue, used during a cutover
    TemporaryQueue,
}

impl Destination {
    pub fn display_name(&self) -> &'static str {
        match self {
            Destination::GeneralQueue => "general-queue",
            Destination::TemporaryQueue => "temporary-queue",
        }
    }

    /// Mode flag that selects this destination.
    pub fn flag(&self) -> ModeFlag {
        match self {
            Destination::GeneralQueue => ModeFlag::GeneralQueue,
            Destination::TemporaryQueue => ModeFlag::TemporaryQueue,
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Current interpretation of data frames on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ReceiverMode {
    pub kind: TupleKind,
    pub destination: Destination,
}

impl ReceiverMode {
    pub fn new(kind: TupleKind, destination: Destination) -> Self {
        Self { kind, destination }
    }

    /// Mode used while a cutover parks traffic for the incoming algorithm.
    pub fn switching() -> Self {
        Self::new(TupleKind::Switch, Destination::TemporaryQueue)
    }

    /// Apply one mode flag. Only the dimension the flag names changes.
    pub fn apply(self, flag: ModeFlag) -> Self {
        match flag {
            ModeFlag::General => Self {
                kind: TupleKind::General,
                ..self
            },
            ModeFlag::Switch => Self {
                kind: TupleKind::Switch,
                ..self
            },
            ModeFlag::GeneralQueue => Self {
                destination: Destination::GeneralQueue,
                ..self
            },
            ModeFlag::TemporaryQueue => Self {
                destination: Destination::TemporaryQueue,
                ..self
            },
        }
    }

    /// Flags that move any receiver into this mode.
    pub fn flags(&self) -> [ModeFlag; 2] {
        let kind = match self.kind {
            TupleKind::General => ModeFlag::General,
            TupleKind::Switch => ModeFlag::Switch,
        };
        [kind, self.destination.flag()]
    }

    /// Flags that move a receiver in `current` into this mode, such that
    /// exactly one of them leaves it in this mode. A receiver already in this
    /// mode gets the destination flag again, so every request is answered by
    /// one matching acknowledgement.
    pub fn flags_from(&self, current: ReceiverMode) -> Vec<ModeFlag> {
        let [kind, destination] = self.flags();
        let mut flags = Vec::with_capacity(2);
        if current.kind != self.kind {
            flags.push(kind);
        }
        if current.destination != self.destination || flags.is_empty() {
            flags.push(destination);
        }
        flags
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiverAction {
    /// Deliver a decoded tuple to a queue.
    Enqueue {
        destination: Destination,
        tuple: Tuple,
    },
    /// The mode changed; nothing is enqueued.
    ModeChanged(ReceiverMode),
    /// The payload could not be decoded and is dropped.
    Drop { len: usize },
}

/// Decoders for the two tuple kinds.
pub struct SerializerPair {
    pub general: Box<dyn TupleSerializer>,
    pub switch: Box<dyn TupleSerializer>,
}

impl SerializerPair {
    pub fn new(general: Box<dyn TupleSerializer>, switch: Box<dyn TupleSerializer>) -> Self {
        Self { general, switch }
    }

    /// Both kinds using the same wire format.
    pub fn from_format(format: SerializerFormat) -> Self {
        Self::new(
            format.serializer(TupleKind::General),
            format.serializer(TupleKind::Switch),
        )
    }

    pub fn for_kind(&self, kind: TupleKind) -> &dyn TupleSerializer {
        match kind {
            TupleKind::General => self.general.as_ref(),
            TupleKind::Switch => self.switch.as_ref(),
        }
    }
}

impl Default for SerializerPair {
    fn default() -> Self {
        Self::from_format(SerializerFormat::default())
    }
}

/// Interpret one frame against the current mode.
pub fn transition(
    mode: ReceiverMode,
    frame: Frame,
    serializers: &SerializerPair,
) -> (ReceiverMode, ReceiverAction) {
    match frame {
        Frame::Mode(flag) => {
            let next = mode.apply(flag);
            (next, ReceiverAction::ModeChanged(next))
        }
        Frame::Data(bytes) => match serializers.for_kind(mode.kind).deserialize(&bytes) {
            Some(tuple) => (
                mode,
                ReceiverAction::Enqueue {
                    destination: mode.destination,
                    tuple,
                },
            ),
            None => (mode, ReceiverAction::Drop { len: bytes.len() }),
        },
    }
}
