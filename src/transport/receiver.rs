//! Receiving side of the tuple transport.
//!
//! One [`TupleReceiver`] loop runs per accepted connection on its own thread.
//! It reads a frame, runs it through [`transition`], and performs the
//! resulting action against a [`TupleSink`]. Corrupt payloads are dropped and
//! logged; any hard I/O failure ends the loop and is reported as "stopped".

use super::frame::read_frame;
use super::protocol::{transition, Destination, ReceiverAction, ReceiverMode, SerializerPair};
use crate::tuple::Tuple;
use std::io::BufReader;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Where a receiver delivers what it reads. Receivers only ever enqueue.
pub trait TupleSink: Send + Sync {
    /// Deliver a decoded tuple to the queue selected by `destination`.
    fn enqueue(&self, destination: Destination, tuple: Tuple);

    /// Called after a mode frame has been applied.
    fn mode_applied(&self, _mode: ReceiverMode) {}
}

/// Counters kept by a running receiver.
#[derive(Debug, Default)]
pub struct ReceiverStats {
    pub frames: AtomicU64,
    pub enqueued: AtomicU64,
    pub dropped: AtomicU64,
    pub mode_changes: AtomicU64,
}

impl ReceiverStats {
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn mode_changes(&self) -> u64 {
        self.mode_changes.load(Ordering::Relaxed)
    }
}

/// State shared between a receiver loop and its handle.
struct Shared {
    /// Cleared once the receiver is stopped; the clone is only used to shut
    /// the socket down from another thread.
    socket: Mutex<Option<TcpStream>>,
    stats: ReceiverStats,
    peer: String,
}

impl Shared {
    fn clear_socket(&self) -> Option<TcpStream> {
        match self.socket.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn is_stopped(&self) -> bool {
        match self.socket.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

/// Per-connection frame reader.
pub struct TupleReceiver {
    stream: TcpStream,
    serializers: SerializerPair,
    sink: Arc<dyn TupleSink>,
    max_frame_len: usize,
    mode: ReceiverMode,
}

impl TupleReceiver {
    pub fn new(
        stream: TcpStream,
        serializers: SerializerPair,
        sink: Arc<dyn TupleSink>,
        max_frame_len: usize,
    ) -> Self {
        Self {
            stream,
            serializers,
            sink,
            max_frame_len,
            mode: ReceiverMode::default(),
        }
    }

    /// Start the read loop on a dedicated thread.
    pub fn spawn(self) -> std::io::Result<ReceiverHandle> {
        let peer = self
            .stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        let shared = Arc::new(Shared {
            socket: Mutex::new(Some(self.stream.try_clone()?)),
            stats: ReceiverStats::default(),
            peer: peer.clone(),
        });

        let loop_shared = shared.clone();
        let thread = std::thread::Builder::new()
            .name(format!("tuple-receiver-{}", peer))
            .spawn(move || self.run(&loop_shared))?;

        Ok(ReceiverHandle {
            shared,
            thread: Some(thread),
        })
    }

    fn run(mut self, shared: &Shared) {
        tracing::info!("tuple receiver for {} started", shared.peer);
        let mut reader = BufReader::new(&self.stream);

        loop {
            let frame = match read_frame(&mut reader, self.max_frame_len) {
                Ok(frame) => frame,
                Err(e) if !e.is_fatal() => {
                    tracing::warn!("receiver {} ignored frame: {}", shared.peer, e);
                    shared.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                Err(e) => {
                    if shared.is_stopped() {
                        tracing::debug!("receiver {} stopped: {}", shared.peer, e);
                    } else {
                        tracing::info!("receiver {} disconnected: {}", shared.peer, e);
                    }
                    break;
                }
            };
            shared.stats.frames.fetch_add(1, Ordering::Relaxed);

            let (mode, action) = transition(self.mode, frame, &self.serializers);
            self.mode = mode;
            match action {
                ReceiverAction::Enqueue { destination, tuple } => {
                    tracing::trace!(
                        "receiver {} enqueue #{} -> {}",
                        shared.peer,
                        tuple.sequence,
                        destination
                    );
                    self.sink.enqueue(destination, tuple);
                    shared.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                }
                ReceiverAction::ModeChanged(mode) => {
                    tracing::debug!(
                        "receiver {} mode: {} / {}",
                        shared.peer,
                        mode.kind,
                        mode.destination
                    );
                    shared.stats.mode_changes.fetch_add(1, Ordering::Relaxed);
                    self.sink.mode_applied(mode);
                }
                ReceiverAction::Drop { len } => {
                    tracing::warn!(
                        "receiver {} dropped undecodable {} frame ({} bytes)",
                        shared.peer,
                        self.mode.kind,
                        len
                    );
                    shared.stats.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        drop(reader);
        shared.clear_socket();
        let _ = self.stream.shutdown(Shutdown::Both);
        tracing::info!("tuple receiver for {} terminated", shared.peer);
    }
}

/// Control handle for a running receiver loop.
pub struct ReceiverHandle {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl ReceiverHandle {
    /// Close the socket so the blocked read fails and the loop ends.
    /// Calling it again has no effect.
    pub fn stop(&self) {
        if let Some(socket) = self.shared.clear_socket() {
            tracing::debug!("stopping receiver for {}", self.shared.peer);
            let _ = socket.shutdown(Shutdown::Both);
        }
    }

    /// `true` once the socket reference has been cleared, either by
    /// [`stop`](Self::stop) or because the peer went away.
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    pub fn peer(&self) -> &str {
        &self.shared.peer
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.shared.stats
    }

    /// Stop the loop and wait for its thread to exit.
    pub fn join(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("receiver thread for {} panicked", self.shared.peer);
            }
        }
    }
}

impl Drop for ReceiverHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::frame::ModeFlag;
    use crate::transport::sender::TupleSender;
    use crate::tuple::{TupleKind, TupleValue};
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct RecordingSink {
        received: Mutex<Vec<(Destination, Tuple)>>,
        modes: Mutex<Vec<ReceiverMode>>,
    }

    impl TupleSink for RecordingSink {
        fn enqueue(&self, destination: Destination, tuple: Tuple) {
            self.received.lock().unwrap().push((destination, tuple));
        }

        fn mode_applied(&self, mode: ReceiverMode) {
            self.modes.lock().unwrap().push(mode);
        }
    }

    fn connected_pair() -> (TupleSender, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (TupleSender::from_stream(client, SerializerPair::default()), server)
    }

    fn wait_until(cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_receiver_multiplexes_one_connection() {
        let (mut sender, server) = connected_pair();
        let sink = Arc::new(RecordingSink::default());
        let handle = TupleReceiver::new(server, SerializerPair::default(), sink.clone(), 1 << 20)
            .spawn()
            .unwrap();

        for seq in 1..=2 {
            sender.send_tuple(&Tuple::new(seq, vec![TupleValue::Int(0)])).unwrap();
        }
        sender.send_mode(ReceiverMode::switching()).unwrap();
        for seq in 3..=4 {
            sender.send_tuple(&Tuple::new(seq, vec![TupleValue::Int(0)])).unwrap();
        }

        wait_until(|| sink.received.lock().unwrap().len() == 4);
        let received = sink.received.lock().unwrap().clone();
        let summary: Vec<_> = received
            .iter()
            .map(|(d, t)| (*d, t.sequence, t.kind))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Destination::GeneralQueue, 1, TupleKind::General),
                (Destination::GeneralQueue, 2, TupleKind::General),
                (Destination::TemporaryQueue, 3, TupleKind::Switch),
                (Destination::TemporaryQueue, 4, TupleKind::Switch),
            ]
        );
        assert_eq!(sink.modes.lock().unwrap().last(), Some(&ReceiverMode::switching()));
        assert_eq!(handle.stats().mode_changes(), 2);
        handle.join();
    }

    #[test]
    fn test_corrupt_frame_does_not_stop_receiver() {
        let (mut sender, server) = connected_pair();
        let sink = Arc::new(RecordingSink::default());
        let handle = TupleReceiver::new(server, SerializerPair::default(), sink.clone(), 1 << 20)
            .spawn()
            .unwrap();

        sender.send(&[0xde, 0xad]).unwrap();
        sender.send_mode_flag(ModeFlag::General).unwrap();
        sender.send_tuple(&Tuple::new(9, Vec::new())).unwrap();

        wait_until(|| sink.received.lock().unwrap().len() == 1);
        assert_eq!(handle.stats().dropped(), 1);
        assert!(!handle.is_stopped());
        handle.join();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (_sender, server) = connected_pair();
        let handle = TupleReceiver::new(
            server,
            SerializerPair::default(),
            Arc::new(RecordingSink::default()),
            1 << 20,
        )
        .spawn()
        .unwrap();

        assert!(!handle.is_stopped());
        handle.stop();
        handle.stop();
        assert!(handle.is_stopped());
        handle.join();
    }

    #[test]
    fn test_peer_disconnect_reports_stopped() {
        let (mut sender, server) = connected_pair();
        let handle = TupleReceiver::new(
            server,
            SerializerPair::default(),
            Arc::new(RecordingSink::default()),
            1 << 20,
        )
        .spawn()
        .unwrap();

        sender.close();
        wait_until(|| handle.is_stopped());
        handle.join();
    }

    #[test]
    fn test_oversized_frame_terminates_loop() {
        let (mut sender, server) = connected_pair();
        let handle = TupleReceiver::new(
            server,
            SerializerPair::default(),
            Arc::new(RecordingSink::default()),
            8,
        )
        .spawn()
        .unwrap();

        sender.send(&[0u8; 32]).unwrap();
        wait_until(|| handle.is_stopped());
        handle.join();
    }
}
