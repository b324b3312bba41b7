//! Deadline queue for the native loop's one-shot timers.
//!
//! The loop has no timer facility of its own; it sleeps until
//! [`TimerQueue::next_deadline`] and then pops whatever is due. Cancelled
//! entries stay in the heap and are skipped lazily.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

/// Handle for cancelling a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

pub struct TimerQueue<K> {
    next_id: u64,
    heap: BinaryHeap<Reverse<(Instant, TimerId)>>,
    pending: HashMap<TimerId, K>,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self {
            next_id: 0,
            heap: BinaryHeap::new(),
            pending: HashMap::new(),
        }
    }
}

impl<K> TimerQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, at: Instant, payload: K) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.heap.push(Reverse((at, id)));
        self.pending.insert(id, payload);
        id
    }

    /// Returns the payload if the timer had not fired yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<K> {
        self.pending.remove(&id)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest deadline among live timers.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse((at, id))) = self.heap.peek() {
            if self.pending.contains_key(id) {
                return Some(*at);
            }
            self.heap.pop();
        }
        None
    }

    /// Remove and return every live timer due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<K> {
        let mut due = Vec::new();
        while let Some(Reverse((at, id))) = self.heap.peek().copied() {
            if at > now {
                break;
            }
            self.heap.pop();
            if let Some(payload) = self.pending.remove(&id) {
                due.push(payload);
            }
        }
        due
    }
}
