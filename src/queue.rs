//! Time-ordered queue of pending partial updates.
//!
//! [`ActionQueue`] is shared by any number of producers and exactly one
//! consumer (the device worker). Items pop in timestamp order; items with the
//! same timestamp pop in submission order. The queue also tracks whether the
//! consumer is still applying the last item it popped, which is what makes
//! [`ActionQueue::wait`] a completion barrier rather than an emptiness check.
//!
//! A popped item is not final until it is applied. While the consumer waits
//! for it to fall due, [`ActionQueue::interruption`] reports whether a
//! discard abandoned it or an earlier item arrived ahead of it.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::DeviceError;

/// A partial state update scheduled for a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingUpdate {
    /// When the update falls due, relative to the time source epoch.
    pub at: Duration,
    /// Bits of the status byte to keep.
    pub clear_mask: u8,
    /// Field value already shifted into position.
    pub value: u8,
    seq: u64,
}

impl PendingUpdate {
    /// Submission sequence number, unique per queue.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl Ord for PendingUpdate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for PendingUpdate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Why the consumer should not apply the item it popped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// A discard ran after the pop; drop the item.
    Abandoned,
    /// An earlier item was pushed after the pop; put the item back.
    Superseded,
}

#[derive(Debug, Default)]
struct Inner {
    heap: BinaryHeap<Reverse<PendingUpdate>>,
    next_seq: u64,
    in_flight: bool,
    /// The in-flight item was discarded before being applied.
    abandoned: bool,
    paused: bool,
    closed: bool,
}

impl Inner {
    fn is_idle(&self) -> bool {
        self.heap.is_empty() && !self.in_flight
    }
}

/// Thread-safe min-heap of [`PendingUpdate`]s with a completion barrier.
#[derive(Debug, Default)]
pub struct ActionQueue {
    inner: Mutex<Inner>,
    /// Signalled when an item becomes poppable or the queue closes.
    ready: Condvar,
    /// Signalled when the queue may have become idle.
    idle: Condvar,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedules an update and wakes the consumer.
    ///
    /// # Errors
    /// Returns `ShutDown` once the queue has been closed.
    pub fn push(&self, at: Duration, clear_mask: u8, value: u8) -> Result<(), DeviceError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(DeviceError::ShutDown);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(Reverse(PendingUpdate {
            at,
            clear_mask,
            value,
            seq,
        }));
        drop(inner);

        self.ready.notify_one();
        Ok(())
    }

    /// Blocks until the earliest update can be popped.
    ///
    /// The popped item counts as in flight until [`complete`](Self::complete)
    /// is called. Returns `None` once the queue is closed.
    pub fn pop(&self) -> Option<PendingUpdate> {
        let mut inner = self.lock();
        loop {
            if inner.closed {
                return None;
            }
            if !inner.paused {
                if let Some(Reverse(update)) = inner.heap.pop() {
                    inner.in_flight = true;
                    inner.abandoned = false;
                    return Some(update);
                }
            }
            inner = self.ready.wait(inner).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Marks the in-flight item as fully processed.
    pub fn complete(&self) {
        let mut inner = self.lock();
        inner.in_flight = false;
        if inner.is_idle() {
            self.idle.notify_all();
        }
    }

    /// Whether the in-flight `update` should be held back instead of applied.
    pub fn interruption(&self, update: &PendingUpdate) -> Option<Interruption> {
        let inner = self.lock();
        if inner.abandoned {
            return Some(Interruption::Abandoned);
        }
        match inner.heap.peek() {
            Some(Reverse(head)) if head < update => Some(Interruption::Superseded),
            _ => None,
        }
    }

    /// Returns a popped item to the queue with its original sequence number.
    /// The consumer still calls [`complete`](Self::complete) afterwards.
    pub fn requeue(&self, update: PendingUpdate) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner.heap.push(Reverse(update));
        drop(inner);

        self.ready.notify_one();
    }

    /// Drops every pending item without applying it and returns how many
    /// were dropped. Never blocks. An in-flight item still waiting to fall
    /// due is marked abandoned; one already being applied finishes.
    pub fn discard(&self) -> usize {
        let mut inner = self.lock();
        let dropped = inner.heap.len();
        inner.heap.clear();
        inner.abandoned = inner.in_flight;
        if inner.is_idle() {
            self.idle.notify_all();
        }
        dropped
    }

    /// Blocks until the queue is empty and nothing is in flight.
    ///
    /// A paused queue with pending items never becomes idle; use
    /// [`wait_timeout`](Self::wait_timeout) when that is possible.
    pub fn wait(&self) {
        let inner = self.lock();
        let _inner = self
            .idle
            .wait_while(inner, |inner| !inner.is_idle())
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Bounded [`wait`](Self::wait). Returns `true` if the queue became idle.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let inner = self.lock();
        let (inner, _) = self
            .idle
            .wait_timeout_while(inner, timeout, |inner| !inner.is_idle())
            .unwrap_or_else(PoisonError::into_inner);
        inner.is_idle()
    }

    /// Holds the consumer: `pop` blocks until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.lock().paused = true;
    }

    pub fn resume(&self) {
        self.lock().paused = false;
        self.ready.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Refuses further pushes, drops pending items and releases every
    /// blocked consumer. Idempotent.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.heap.clear();
        drop(inner);

        self.ready.notify_all();
        self.idle.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of pending items, not counting one in flight.
    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    /// Copy of the pending items in the order they will be applied.
    pub fn snapshot(&self) -> Vec<PendingUpdate> {
        let inner = self.lock();
        let mut updates: Vec<PendingUpdate> = inner.heap.iter().map(|item| item.0).collect();
        updates.sort_unstable();
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn pops_in_time_order() {
        let queue = ActionQueue::new();
        queue.push(ms(30), 0xfc, 3).unwrap();
        queue.push(ms(10), 0xfc, 1).unwrap();
        queue.push(ms(20), 0xfc, 2).unwrap();

        let values: Vec<u8> = (0..3)
            .map(|_| {
                let update = queue.pop().unwrap();
                queue.complete();
                update.value
            })
            .collect();
        assert_eq!(values, [1, 2, 3]);
    }

    #[test]
    fn equal_timestamps_pop_in_submission_order() {
        let queue = ActionQueue::new();
        // Larger masks and values first: a tuple comparison would reorder these.
        queue.push(ms(5), 0xfc, 2).unwrap();
        queue.push(ms(5), 0x8f, 0x10).unwrap();
        queue.push(ms(5), 0x7f, 0x00).unwrap();

        let order: Vec<u8> = queue.snapshot().iter().map(|u| u.clear_mask).collect();
        assert_eq!(order, [0xfc, 0x8f, 0x7f]);

        let first = queue.pop().unwrap();
        assert_eq!((first.clear_mask, first.value), (0xfc, 2));
    }

    #[test]
    fn discard_on_empty_queue_is_a_no_op() {
        let queue = ActionQueue::new();
        assert_eq!(queue.discard(), 0);
        assert_eq!(queue.discard(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn discard_leaves_in_flight_item_outstanding() {
        let queue = ActionQueue::new();
        queue.push(ms(0), 0xfc, 1).unwrap();
        queue.push(ms(1), 0xfc, 2).unwrap();

        let _update = queue.pop().unwrap();
        assert_eq!(queue.discard(), 1);
        assert!(!queue.wait_timeout(ms(10)));

        queue.complete();
        assert!(queue.wait_timeout(ms(10)));
    }

    #[test]
    fn discard_abandons_in_flight_item() {
        let queue = ActionQueue::new();
        queue.push(ms(500), 0x8f, 0x60).unwrap();

        let update = queue.pop().unwrap();
        assert_eq!(queue.interruption(&update), None);

        queue.discard();
        queue.push(ms(0), 0x8f, 0x30).unwrap();
        assert_eq!(queue.interruption(&update), Some(Interruption::Abandoned));
        queue.complete();

        // The next pop starts clean.
        let next = queue.pop().unwrap();
        assert_eq!(next.value, 0x30);
        assert_eq!(queue.interruption(&next), None);
    }

    #[test]
    fn earlier_push_supersedes_in_flight_item() {
        let queue = ActionQueue::new();
        queue.push(ms(100), 0xfc, 1).unwrap();

        let late = queue.pop().unwrap();
        queue.push(ms(100), 0xfc, 2).unwrap();
        assert_eq!(queue.interruption(&late), None);

        queue.push(ms(10), 0xfc, 3).unwrap();
        assert_eq!(queue.interruption(&late), Some(Interruption::Superseded));
        queue.requeue(late);
        queue.complete();

        let values: Vec<u8> = (0..3)
            .map(|_| {
                let update = queue.pop().unwrap();
                queue.complete();
                update.value
            })
            .collect();
        assert_eq!(values, [3, 1, 2]);
    }

    #[test]
    fn wait_blocks_until_consumer_completes() {
        let queue = Arc::new(ActionQueue::new());
        for i in 0..5 {
            queue.push(ms(i), 0xfc, 0).unwrap();
        }

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut applied = 0;
                while applied < 5 {
                    queue.pop().unwrap();
                    thread::sleep(ms(2));
                    applied += 1;
                    queue.complete();
                }
                applied
            })
        };

        queue.wait();
        assert!(queue.is_empty());
        assert_eq!(consumer.join().unwrap(), 5);
    }

    #[test]
    fn paused_queue_holds_items_until_resumed() {
        let queue = Arc::new(ActionQueue::new());
        queue.pause();
        queue.push(ms(0), 0xfc, 1).unwrap();
        assert!(!queue.wait_timeout(ms(10)));

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let update = queue.pop();
                queue.complete();
                update
            })
        };

        thread::sleep(ms(10));
        assert_eq!(queue.len(), 1);
        queue.resume();
        assert_eq!(consumer.join().unwrap().map(|u| u.value), Some(1));
    }

    #[test]
    fn close_releases_consumer_and_rejects_pushes() {
        let queue = Arc::new(ActionQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };

        queue.close();
        assert!(consumer.join().unwrap().is_none());
        assert!(matches!(queue.push(ms(0), 0xfc, 1), Err(DeviceError::ShutDown)));
        queue.close();
        assert!(queue.is_closed());
    }

    #[test]
    fn concurrent_producers_never_lose_items() {
        let queue = Arc::new(ActionQueue::new());
        queue.pause();

        let producers: Vec<_> = [300u64, 450]
            .into_iter()
            .map(|count| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..count {
                        queue.push(ms(i % 7), 0xfc, (i % 4) as u8).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.len(), 750);
        let mut seqs: Vec<u64> = snapshot.iter().map(PendingUpdate::seq).collect();
        seqs.sort_unstable();
        seqs.dedup();
        assert_eq!(seqs.len(), 750);
    }
}
