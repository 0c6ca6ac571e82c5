//! Bounded hand-off queue between producer and consumer threads.
//!
//! `BoundedQueue` wraps a bounded crossbeam channel that owns both of its
//! ends, so neither side can ever observe a disconnect while the queue is
//! alive. Every blocked producer and consumer re-checks its condition after
//! each successful hand-off; consumption order always equals production order.
//!
//! There is no built-in cancellation. Callers that need to shut down wrap the
//! blocking calls with their own stop flag, or use the timeout variants.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Fixed-capacity FIFO queue with blocking `produce` and `consume`.
pub struct BoundedQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// A capacity of zero is raised to one: a zero-capacity channel is a
    /// rendezvous point, which would make `produce` wait for a consumer even
    /// when nothing is queued.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Append an item, blocking while the queue is full.
    pub fn produce(&self, item: T) {
        // Both ends live in `self`, so the channel cannot be disconnected here.
        let _ = self.tx.send(item);
    }

    /// Append an item without blocking. Gives the item back if the queue is full.
    pub fn try_produce(&self, item: T) -> Result<(), T> {
        self.tx.try_send(item).map_err(|e| e.into_inner())
    }

    /// Remove the oldest item, blocking while the queue is empty.
    pub fn consume(&self) -> T {
        // Sender is owned by self, so `recv` only returns once an item arrives.
        match self.rx.recv() {
            Ok(item) => item,
            Err(_) => unreachable!("the sending end is owned by the queue"),
        }
    }

    /// Remove the oldest item if one is queued.
    pub fn try_consume(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Remove the oldest item, waiting at most `timeout` for one to arrive.
    ///
    /// `None` means "no data right now", not "end of data".
    pub fn consume_timeout(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Remove everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }

    /// Number of queued items. Advisory only: may be stale under concurrent use.
    pub fn current_size(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue looked empty at the time of the call.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("size", &self.current_size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_single_thread() {
        let queue = BoundedQueue::new(4);
        queue.produce(1);
        queue.produce(2);
        queue.produce(3);
        assert_eq!(queue.current_size(), 3);
        assert_eq!(queue.consume(), 1);
        assert_eq!(queue.consume(), 2);
        assert_eq!(queue.consume(), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let queue = BoundedQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.produce("a");
        assert_eq!(queue.try_produce("b"), Err("b"));
    }

    #[test]
    fn test_produce_blocks_when_full() {
        let queue = Arc::new(BoundedQueue::new(2));
        queue.produce('A');
        queue.produce('B');

        let done = Arc::new(AtomicBool::new(false));
        let producer = {
            let queue = queue.clone();
            let done = done.clone();
            thread::spawn(move || {
                queue.produce('C');
                done.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!done.load(Ordering::SeqCst), "produce(C) must block while full");

        assert_eq!(queue.consume(), 'A');
        producer.join().unwrap();
        assert!(done.load(Ordering::SeqCst));

        assert_eq!(queue.drain(), vec!['B', 'C']);
    }

    #[test]
    fn test_consume_blocks_when_empty() {
        let queue = Arc::new(BoundedQueue::new(1));
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.consume())
        };
        thread::sleep(Duration::from_millis(50));
        queue.produce(42u32);
        assert_eq!(consumer.join().unwrap(), 42);
    }

    #[test]
    fn test_consume_timeout_returns_none_when_idle() {
        let queue: BoundedQueue<u8> = BoundedQueue::new(1);
        assert_eq!(queue.consume_timeout(Duration::from_millis(10)), None);
        assert_eq!(queue.try_consume(), None);
    }

    #[test]
    fn test_many_producers_one_consumer() {
        let queue = Arc::new(BoundedQueue::new(3));
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        queue.produce((p, i));
                    }
                })
            })
            .collect();

        let mut last_seen = [None::<i32>; 4];
        for _ in 0..200 {
            let (p, i) = queue.consume();
            // per-producer order must be preserved
            if let Some(prev) = last_seen[p] {
                assert!(i > prev);
            }
            last_seen[p] = Some(i);
        }
        for handle in producers {
            handle.join().unwrap();
        }
        assert!(queue.is_empty());
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_consumption_order_equals_production_order(
            items in prop::collection::vec(any::<u32>(), 0..200),
            capacity in 1usize..16,
        ) {
            let queue = Arc::new(BoundedQueue::new(capacity));
            let producer = {
                let queue = queue.clone();
                let items = items.clone();
                thread::spawn(move || {
                    for item in items {
                        queue.produce(item);
                    }
                })
            };

            let consumed: Vec<u32> = (0..items.len()).map(|_| queue.consume()).collect();
            producer.join().unwrap();
            prop_assert_eq!(consumed, items);
        }
    }
}
