//! The three queues around one intermediary instance.
//!
//! `in` feeds the active algorithm, `tmp` parks transitional traffic during a
//! cutover, and `out` remembers emitted tuples until downstream acknowledges
//! them, evicting the oldest once it holds its configured maximum. Receivers
//! bound to the holder only ever enqueue into `in` or `tmp` and report
//! applied mode frames as [`ModeAck`]s.

use crate::config::DEFAULT_OUT_CAPACITY;
use crate::queue::BoundedQueue;
use crate::transport::{Destination, ReceiverMode, TupleSink};
use crate::tuple::{Tuple, TupleKind};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

/// A receiver reporting the mode it is now in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeAck {
    pub kind: TupleKind,
    pub destination: Destination,
}

impl From<ReceiverMode> for ModeAck {
    fn from(mode: ReceiverMode) -> Self {
        Self {
            kind: mode.kind,
            destination: mode.destination,
        }
    }
}

impl ModeAck {
    pub fn matches(&self, mode: ReceiverMode) -> bool {
        self.kind == mode.kind && self.destination == mode.destination
    }
}

type SharedQueue = Arc<BoundedQueue<Tuple>>;

/// Queues owned by one switch strategy.
pub struct QueueHolder {
    input: RwLock<SharedQueue>,
    temporary: RwLock<SharedQueue>,
    out: Mutex<VecDeque<Tuple>>,
    capacity: usize,
    out_capacity: usize,
    acks_tx: Sender<ModeAck>,
    acks_rx: Receiver<ModeAck>,
}

fn read(slot: &RwLock<SharedQueue>) -> SharedQueue {
    match slot.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn write(slot: &RwLock<SharedQueue>, queue: SharedQueue) {
    match slot.write() {
        Ok(mut guard) => *guard = queue,
        Err(poisoned) => *poisoned.into_inner() = queue,
    }
}

impl QueueHolder {
    /// Create a holder whose `in` and `tmp` queues hold `capacity` tuples each.
    pub fn new(capacity: usize) -> Self {
        Self::with_out_capacity(capacity, DEFAULT_OUT_CAPACITY)
    }

    /// Like [`QueueHolder::new`], keeping at most `out_capacity` unacknowledged
    /// tuples.
    pub fn with_out_capacity(capacity: usize, out_capacity: usize) -> Self {
        let (acks_tx, acks_rx) = unbounded();
        Self {
            input: RwLock::new(Arc::new(BoundedQueue::new(capacity))),
            temporary: RwLock::new(Arc::new(BoundedQueue::new(capacity))),
            out: Mutex::new(VecDeque::new()),
            capacity,
            out_capacity,
            acks_tx,
            acks_rx,
        }
    }

    /// The queue a receiver delivers to for `destination`.
    pub fn queue(&self, destination: Destination) -> SharedQueue {
        match destination {
            Destination::GeneralQueue => self.input(),
            Destination::TemporaryQueue => self.temporary(),
        }
    }

    pub fn input(&self) -> SharedQueue {
        read(&self.input)
    }

    pub fn temporary(&self) -> SharedQueue {
        read(&self.temporary)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn out_capacity(&self) -> usize {
        self.out_capacity
    }

    /// Whether `tmp` still points at the queue that was promoted to `in`.
    pub fn is_temporary_aliased(&self) -> bool {
        Arc::ptr_eq(&self.input(), &self.temporary())
    }

    /// Re-point `in` at the current `tmp`. Until [`reset_temporary`] is
    /// called, both names refer to the same queue, so tuples that still arrive
    /// tagged for `tmp` land behind the promoted ones instead of being
    /// stranded.
    ///
    /// Returns the number of tuples promoted.
    ///
    /// [`reset_temporary`]: QueueHolder::reset_temporary
    pub fn promote_temporary(&self) -> usize {
        let promoted = self.temporary();
        let count = promoted.current_size();
        write(&self.input, promoted);
        tracing::debug!("promoted {} parked tuples to the input queue", count);
        count
    }

    /// Give `tmp` a fresh queue again. No-op unless `tmp` is aliased to `in`.
    pub fn reset_temporary(&self) {
        if self.is_temporary_aliased() {
            write(&self.temporary, Arc::new(BoundedQueue::new(self.capacity)));
            tracing::debug!("temporary queue reset");
        }
    }

    fn out_queue(&self) -> MutexGuard<'_, VecDeque<Tuple>> {
        match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Remember an emitted tuple until it is acknowledged. The oldest entry
    /// is evicted when `out` is full.
    pub fn record_sent(&self, tuple: &Tuple) {
        if self.out_capacity == 0 {
            return;
        }
        let mut out = self.out_queue();
        if out.len() >= self.out_capacity {
            if let Some(evicted) = out.pop_front() {
                tracing::trace!("out is full, tuple {} no longer replayable", evicted.sequence);
            }
        }
        out.push_back(tuple.clone());
    }

    /// Forget every emitted tuple up to and including `sequence`.
    /// Returns how many entries were dropped.
    pub fn acknowledge(&self, sequence: u64) -> usize {
        let mut out = self.out_queue();
        let mut dropped = 0;
        while out.front().is_some_and(|t| t.sequence <= sequence) {
            out.pop_front();
            dropped += 1;
        }
        dropped
    }

    /// Snapshot of emitted but unacknowledged tuples, oldest first.
    pub fn unacknowledged(&self) -> Vec<Tuple> {
        self.out_queue().iter().cloned().collect()
    }

    pub fn out_size(&self) -> usize {
        self.out_queue().len()
    }

    /// Discard acknowledgements left over from earlier mode changes.
    pub fn clear_mode_acks(&self) {
        let stale = self.acks_rx.try_iter().count();
        if stale > 0 {
            tracing::trace!("discarded {} stale mode acknowledgements", stale);
        }
    }

    /// Count acknowledgements for `mode` that have already arrived.
    pub fn take_mode_acks(&self, mode: ReceiverMode) -> usize {
        self.acks_rx.try_iter().filter(|ack| ack.matches(mode)).count()
    }

    /// Wait until `count` receivers have acknowledged `mode`, or `timeout`
    /// elapses. Returns the number of acknowledgements seen.
    pub fn wait_for_mode(&self, mode: ReceiverMode, count: usize, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut seen = 0;
        while seen < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.acks_rx.recv_timeout(remaining) {
                Ok(ack) if ack.matches(mode) => seen += 1,
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        seen
    }
}

impl TupleSink for QueueHolder {
    fn enqueue(&self, destination: Destination, tuple: Tuple) {
        // Clone the queue handle first so a blocked produce never holds the slot lock.
        let queue = self.queue(destination);
        queue.produce(tuple);
    }

    fn mode_applied(&self, mode: ReceiverMode) {
        // Both ends live in `self`.
        let _ = self.acks_tx.send(ModeAck::from(mode));
    }
}

impl std::fmt::Debug for QueueHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueHolder")
            .field("in", &self.input().current_size())
            .field("tmp", &self.temporary().current_size())
            .field("out", &self.out_size())
            .field("aliased", &self.is_temporary_aliased())
            .finish()
    }
}
