//! The switch strategy contract and the receiver factory it hands out.

use super::queue_holder::QueueHolder;
use super::signal::{SignalValue, SwitchSignal};
use super::state::SwitchState;
use crate::error::Result;
use crate::transport::{ReceiverHandle, SerializerPair, TupleReceiver, TupleSink};
use crate::tuple::{SerializerFormat, Tuple};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

/// A concrete cutover behavior around one [`QueueHolder`].
pub trait SwitchStrategy: Send + Sync {
    /// Registry name of the strategy.
    fn name(&self) -> &str;

    /// Next tuple to forward. Always `None` unless the strategy is active.
    fn produce_tuple(&self) -> Option<Tuple>;

    /// Apply an externally delivered signal.
    fn handle_signal(&self, signal: &SwitchSignal) -> Result<()>;

    /// Read back a named value so a signal sender can confirm an effect.
    fn signal_value(&self, name: &str) -> Option<SignalValue>;

    /// Factory for receivers bound to this strategy's queues.
    fn receiver_factory(&self) -> ReceiverFactory;

    fn switch_state(&self) -> SwitchState;

    fn queues(&self) -> &Arc<QueueHolder>;

    /// Remove everything queued on `in` without waiting, oldest first.
    fn drain_input(&self) -> Vec<Tuple>;
}

/// Starts receivers that deliver into a strategy's queues.
#[derive(Clone)]
pub struct ReceiverFactory {
    sink: Arc<dyn TupleSink>,
    format: SerializerFormat,
    max_frame_len: usize,
}

impl ReceiverFactory {
    pub fn new(sink: Arc<dyn TupleSink>, format: SerializerFormat, max_frame_len: usize) -> Self {
        Self {
            sink,
            format,
            max_frame_len,
        }
    }

    pub fn format(&self) -> SerializerFormat {
        self.format
    }

    /// Run a receiver for an accepted connection.
    pub fn start(&self, stream: TcpStream) -> std::io::Result<ReceiverHandle> {
        TupleReceiver::new(
            stream,
            SerializerPair::from_format(self.format),
            self.sink.clone(),
            self.max_frame_len,
        )
        .spawn()
    }

    /// Accept `count` upstream connections and start a receiver for each.
    pub fn accept_upstreams(
        &self,
        listener: &TcpListener,
        count: usize,
    ) -> std::io::Result<Vec<ReceiverHandle>> {
        let mut handles = Vec::with_capacity(count);
        while handles.len() < count {
            let (stream, addr) = listener.accept()?;
            tracing::debug!("accepted upstream connection from {}", addr);
            handles.push(self.start(stream)?);
        }
        Ok(handles)
    }
}

impl std::fmt::Debug for ReceiverFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverFactory")
            .field("format", &self.format)
            .field("max_frame_len", &self.max_frame_len)
            .finish()
    }
}
