//! Sending side of the tuple transport.

use super::frame::{write_frame, Frame, ModeFlag};
use super::protocol::{ReceiverMode, SerializerPair};
use super::{TransportError, TransportResult};
use crate::tuple::Tuple;
use std::io::{BufWriter, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Pending mode change for one sender, shared with whoever routes it.
///
/// A request is applied by the next thread that writes through the sender,
/// before its frame, so routing never has to wait for a writer blocked on a
/// full connection. Only the latest request is kept.
#[derive(Debug, Clone, Default)]
pub struct ModeRequest {
    pending: Arc<Mutex<Option<ReceiverMode>>>,
}

impl ModeRequest {
    fn slot(&self) -> MutexGuard<'_, Option<ReceiverMode>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Ask for `mode`, replacing any request not yet applied.
    pub fn request(&self, mode: ReceiverMode) {
        *self.slot() = Some(mode);
    }

    /// Whether a request is still waiting for a writer.
    pub fn is_pending(&self) -> bool {
        self.slot().is_some()
    }

    fn take(&self) -> Option<ReceiverMode> {
        self.slot().take()
    }
}

/// Writes data and mode frames to one downstream receiver.
///
/// The connection is opened on the first send. A failed write is returned to
/// the caller and leaves the sender disconnected for good: reconnection policy
/// belongs to the pipeline, so callers build a new sender instead.
pub struct TupleSender {
    target: String,
    connect_timeout: Option<Duration>,
    stream: Option<BufWriter<TcpStream>>,
    disconnected: bool,
    /// Mode the downstream receiver is in, as far as this sender knows.
    mode: ReceiverMode,
    serializers: SerializerPair,
    frames_sent: u64,
    requests: ModeRequest,
}

impl TupleSender {
    /// Create a sender that connects lazily to `target` (`host:port`).
    pub fn new(target: impl Into<String>, serializers: SerializerPair) -> Self {
        Self {
            target: target.into(),
            connect_timeout: None,
            stream: None,
            disconnected: false,
            mode: ReceiverMode::default(),
            serializers,
            frames_sent: 0,
            requests: ModeRequest::default(),
        }
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream, serializers: SerializerPair) -> Self {
        let target = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        let mut sender = Self::new(target, serializers);
        sender.stream = Some(BufWriter::new(stream));
        sender
    }

    /// Bound the time spent opening the connection.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Mode this sender last switched its receiver into.
    pub fn mode(&self) -> ReceiverMode {
        self.mode
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Handle for requesting mode changes without holding this sender.
    pub fn mode_request(&self) -> ModeRequest {
        self.requests.clone()
    }

    /// Send the pending mode request, if any. Returns whether one was sent.
    pub fn apply_requested_mode(&mut self) -> TransportResult<bool> {
        match self.requests.take() {
            Some(mode) => {
                self.send_mode(mode)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Write one data frame carrying already serialized bytes, then flush.
    pub fn send(&mut self, bytes: &[u8]) -> TransportResult<()> {
        self.apply_requested_mode()?;
        self.write(&Frame::Data(bytes.to_vec()))
    }

    /// Serialize a tuple for the current tuple kind and send it.
    pub fn send_tuple(&mut self, tuple: &Tuple) -> TransportResult<()> {
        self.apply_requested_mode()?;
        let bytes = self.serializers.for_kind(self.mode.kind).serialize(tuple)?;
        self.write(&Frame::Data(bytes))
    }

    /// Write one mode frame, then flush.
    pub fn send_mode_flag(&mut self, flag: ModeFlag) -> TransportResult<()> {
        self.write(&Frame::Mode(flag))?;
        self.mode = self.mode.apply(flag);
        tracing::debug!("sender to {} switched receiver via '{}'", self.target, flag);
        Ok(())
    }

    /// Send the mode frames that put the receiver into `mode`. Exactly one of
    /// them leaves the receiver in `mode`, even when it is there already.
    pub fn send_mode(&mut self, mode: ReceiverMode) -> TransportResult<()> {
        for flag in mode.flags_from(self.mode) {
            self.send_mode_flag(flag)?;
        }
        Ok(())
    }

    /// Close the connection. Later sends fail.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.flush();
            if let Ok(inner) = stream.into_inner() {
                let _ = inner.shutdown(std::net::Shutdown::Both);
            }
        }
        self.disconnected = true;
    }

    fn write(&mut self, frame: &Frame) -> TransportResult<()> {
        let result = self.connect().and_then(|stream| {
            write_frame(stream, frame)?;
            stream.flush()?;
            Ok(())
        });

        match result {
            Ok(()) => {
                self.frames_sent += 1;
                Ok(())
            }
            Err(e @ TransportError::Serialization(_))
            | Err(e @ TransportError::FrameTooLarge { .. }) => Err(e),
            Err(e) => {
                tracing::warn!("send to {} failed, disconnecting: {}", self.target, e);
                self.stream = None;
                self.disconnected = true;
                Err(e)
            }
        }
    }

    fn connect(&mut self) -> TransportResult<&mut BufWriter<TcpStream>> {
        if self.disconnected {
            return Err(TransportError::Disconnected(self.target.clone()));
        }
        if self.stream.is_none() {
            tracing::debug!("connecting tuple sender to {}", self.target);
            let stream = match self.connect_timeout {
                Some(timeout) => {
                    let addr = resolve(&self.target)?;
                    TcpStream::connect_timeout(&addr, timeout)?
                }
                None => TcpStream::connect(&self.target)?,
            };
            stream.set_nodelay(true)?;
            self.stream = Some(BufWriter::new(stream));
        }
        self.stream
            .as_mut()
            .ok_or_else(|| TransportError::Disconnected(self.target.clone()))
    }
}

impl Drop for TupleSender {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            let _ = stream.flush();
        }
    }
}

impl std::fmt::Debug for TupleSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TupleSender")
            .field("target", &self.target)
            .field("connected", &self.is_connected())
            .field("disconnected", &self.disconnected)
            .field("mode", &self.mode)
            .finish()
    }
}

fn resolve(target: &str) -> TransportResult<SocketAddr> {
    target.to_socket_addrs()?.next().ok_or_else(|| {
        TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("no address for {}", target),
        ))
    })
}
