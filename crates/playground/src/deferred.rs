use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

#[derive(Debug)]
struct Entry<A> {
    due: Duration,
    seq: u64,
    action: A,
}

impl<A> PartialEq for Entry<A> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<A> Eq for Entry<A> {}

impl<A> PartialOrd for Entry<A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the max-heap pops the earliest (due, seq) first.
impl<A> Ord for Entry<A> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Time-ordered queue of actions waiting on the playground clock.
///
/// Entries due at the same instant come out in scheduling order. Nothing
/// queued survives a [`DeferredQueue::abort_all`], so an entry that comes due
/// always belongs to the run that scheduled it.
#[derive(Debug)]
pub struct DeferredQueue<A> {
    heap: BinaryHeap<Entry<A>>,
    next_seq: u64,
}

impl<A> Default for DeferredQueue<A> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<A> DeferredQueue<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now: Duration, delay: Duration, action: A) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.heap.push(Entry {
            due: now.saturating_add(delay),
            seq,
            action,
        });
    }

    /// Empties the queue and hands back every entry in due order, so the
    /// caller can run their abort paths right away.
    pub fn abort_all(&mut self) -> Vec<A> {
        let mut entries = std::mem::take(&mut self.heap).into_sorted_vec();
        // `into_sorted_vec` is ascending by `Ord`, which is reversed here.
        entries.reverse();
        entries.into_iter().map(|entry| entry.action).collect()
    }

    /// Drops every entry without resuming it.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn pop_due(&mut self, now: Duration) -> Option<A> {
        if self.heap.peek()?.due > now {
            return None;
        }
        self.heap.pop().map(|entry| entry.action)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}
