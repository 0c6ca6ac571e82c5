//! Frame codec for the tuple transport.

use super::{TransportError, TransportResult};
use std::io::{ErrorKind, Read, Write};

/// Length value reserved for mode frames.
pub const MODE_FRAME_LENGTH: u32 = u32::MAX;

/// Fixed payload size of a mode frame.
pub const MODE_FLAG_WIDTH: usize = 16;

/// Flags carried by mode frames.
///
/// `General`/`Switch` select the tuple kind, `GeneralQueue`/`TemporaryQueue`
/// select the destination queue. The two dimensions are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeFlag {
    General,
    Switch,
    GeneralQueue,
    TemporaryQueue,
}

impl ModeFlag {
    /// ASCII token written on the wire.
    pub fn token(&self) -> &'static str {
        match self {
            ModeFlag::General => "general",
            ModeFlag::Switch => "switch",
            ModeFlag::GeneralQueue => "general-queue",
            ModeFlag::TemporaryQueue => "temporary-queue",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "general" => Some(ModeFlag::General),
            "switch" => Some(ModeFlag::Switch),
            "general-queue" => Some(ModeFlag::GeneralQueue),
            "temporary-queue" => Some(ModeFlag::TemporaryQueue),
            _ => None,
        }
    }

    pub fn all() -> &'static [ModeFlag] {
        &[
            ModeFlag::General,
            ModeFlag::Switch,
            ModeFlag::GeneralQueue,
            ModeFlag::TemporaryQueue,
        ]
    }

    /// NUL-padded fixed-width payload.
    pub fn payload(&self) -> [u8; MODE_FLAG_WIDTH] {
        let mut buf = [0u8; MODE_FLAG_WIDTH];
        let token = self.token().as_bytes();
        buf[..token.len()].copy_from_slice(token);
        buf
    }
}

impl std::fmt::Display for ModeFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// One unit on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Mode(ModeFlag),
    Data(Vec<u8>),
}

/// Write one frame. Does not flush.
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> TransportResult<()> {
    match frame {
        Frame::Mode(flag) => {
            writer.write_all(&MODE_FRAME_LENGTH.to_be_bytes())?;
            writer.write_all(&flag.payload())?;
        }
        Frame::Data(bytes) => {
            let len = u32::try_from(bytes.len())
                .ok()
                .filter(|len| *len != MODE_FRAME_LENGTH)
                .ok_or(TransportError::FrameTooLarge {
                    len: bytes.len(),
                    max: (MODE_FRAME_LENGTH - 1) as usize,
                })?;
            writer.write_all(&len.to_be_bytes())?;
            writer.write_all(bytes)?;
        }
    }
    Ok(())
}

/// Read one frame, blocking until it is complete.
///
/// A clean end of stream before the length prefix is reported as
/// [`TransportError::ConnectionLost`].
pub fn read_frame<R: Read>(reader: &mut R, max_len: usize) -> TransportResult<Frame> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            TransportError::ConnectionLost
        } else {
            TransportError::Io(e)
        }
    })?;
    let len = u32::from_be_bytes(len_buf);

    if len == MODE_FRAME_LENGTH {
        let mut payload = [0u8; MODE_FLAG_WIDTH];
        reader.read_exact(&mut payload)?;
        let end = payload.iter().position(|b| *b == 0).unwrap_or(MODE_FLAG_WIDTH);
        let token = String::from_utf8_lossy(&payload[..end]);
        return ModeFlag::from_token(&token)
            .map(Frame::Mode)
            .ok_or_else(|| TransportError::UnknownModeFlag(token.into_owned()));
    }

    let len = len as usize;
    if len > max_len {
        return Err(TransportError::FrameTooLarge { len, max: max_len });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(Frame::Data(payload))
}
