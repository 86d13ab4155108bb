/// Deterministic event scheduler.
///
/// Owns the virtual clock and a `BinaryHeap` of queue entries with a
/// reversed `Ord`, so the heap pops the smallest `(at, sequence)` first.
/// Sequence numbers are strictly increasing, so events sharing a fire time
/// come out in the order they were queued.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::trace;

use crate::error::{KernelError, KernelResult};
use crate::event::{EventId, EventIdGen};
use crate::time::VirtualTime;

/// One pending entry in the event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    /// Absolute fire time.
    pub at: VirtualTime,
    /// Tie-break among entries with the same `at`.
    pub sequence: u64,
    /// The event to fire.
    pub event: EventId,
}

/// Ordering: smallest `(at, sequence)` first.
///
/// Rust's `BinaryHeap` is a *max*-heap, so the natural ordering is
/// reversed here to turn it into a min-heap.
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The virtual clock plus the ordered queue of pending events.
///
/// All scheduling goes through this struct; nothing else mutates the
/// clock or the queue.
#[derive(Debug, Clone)]
pub struct Scheduler {
    queue: BinaryHeap<QueueEntry>,
    now: VirtualTime,
    next_sequence: u64,
    id_gen: EventIdGen,
}

impl Scheduler {
    /// Create an empty scheduler with the clock at zero.
    pub fn new() -> Self {
        Self::starting_at(VirtualTime::ZERO)
    }

    /// Create an empty scheduler with the clock at `start`.
    pub fn starting_at(start: VirtualTime) -> Self {
        Scheduler {
            queue: BinaryHeap::new(),
            now: start,
            next_sequence: 0,
            id_gen: EventIdGen::new(),
        }
    }

    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// Mint a fresh event ID.
    pub fn mint_event_id(&mut self) -> EventId {
        self.id_gen.next_id()
    }

    /// The next event ID that will be minted.
    pub fn next_event_id(&self) -> EventId {
        self.id_gen.peek()
    }

    /// Queue `event` to fire at the absolute time `at`.
    ///
    /// Returns the sequence number assigned to the entry. Fails with
    /// `InvalidScheduling` if `at` is before the current time.
    pub fn schedule(&mut self, event: EventId, at: VirtualTime) -> KernelResult<u64> {
        if at.is_before(self.now) {
            return Err(KernelError::InvalidScheduling {
                event,
                requested: at,
                current: self.now,
            });
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        trace!(%event, %at, sequence, "scheduled");
        self.queue.push(QueueEntry {
            at,
            sequence,
            event,
        });
        Ok(sequence)
    }

    /// Queue `event` at the current time. Cannot fail: `now` is never in the past.
    pub fn schedule_now(&mut self, event: EventId) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        trace!(%event, at = %self.now, sequence, "scheduled");
        self.queue.push(QueueEntry {
            at: self.now,
            sequence,
            event,
        });
        sequence
    }

    /// Pop the earliest entry and advance the clock to its fire time.
    ///
    /// Returns `None` when the queue is empty.
    pub fn pop_next(&mut self) -> Option<QueueEntry> {
        let entry = self.queue.pop()?;
        // `schedule` rejects past times, so the clock never goes backward.
        debug_assert!(!entry.at.is_before(self.now));
        self.now = entry.at;
        Some(entry)
    }

    /// Fire time of the earliest entry, if any.
    pub fn peek_time(&self) -> Option<VirtualTime> {
        self.queue.peek().map(|e| e.at)
    }

    /// Move the clock forward to `at` without firing anything.
    ///
    /// Fails with `InvalidHorizon` if `at` is in the past, or if an entry is
    /// queued before `at` (it would be skipped).
    pub fn advance_to(&mut self, at: VirtualTime) -> KernelResult<()> {
        if at.is_before(self.now) {
            return Err(KernelError::InvalidHorizon {
                requested: at,
                current: self.now,
            });
        }
        if let Some(next) = self.peek_time() {
            if next.is_before(at) {
                return Err(KernelError::InvalidHorizon {
                    requested: at,
                    current: self.now,
                });
            }
        }
        self.now = at;
        Ok(())
    }

    /// Returns `true` if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Drain all entries in firing order without touching the clock.
    pub fn drain_ordered(&mut self) -> Vec<QueueEntry> {
        let mut entries = Vec::with_capacity(self.queue.len());
        while let Some(e) = self.queue.pop() {
            entries.push(e);
        }
        entries
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(sched: &mut Scheduler, at: u64) -> EventId {
        let id = sched.mint_event_id();
        sched.schedule(id, VirtualTime::new(at)).unwrap();
        id
    }

    #[test]
    fn test_fifo_at_same_time() {
        let mut sched = Scheduler::new();
        let a = queue(&mut sched, 10);
        let b = queue(&mut sched, 10);
        let c = queue(&mut sched, 10);

        assert_eq!(sched.pop_next().unwrap().event, a);
        assert_eq!(sched.pop_next().unwrap().event, b);
        assert_eq!(sched.pop_next().unwrap().event, c);
    }

    #[test]
    fn test_time_ordering() {
        let mut sched = Scheduler::new();
        queue(&mut sched, 30);
        queue(&mut sched, 10);
        queue(&mut sched, 20);

        let times: Vec<u64> = (0..3).map(|_| sched.pop_next().unwrap().at.ticks()).collect();
        assert_eq!(times, vec![10, 20, 30]);
        assert_eq!(sched.now(), VirtualTime::new(30));
    }

    #[test]
    fn test_mixed_ordering() {
        let mut sched = Scheduler::new();
        for at in [50, 10, 10, 30, 10, 0, 50] {
            queue(&mut sched, at);
        }
        let entries = sched.drain_ordered();
        for w in entries.windows(2) {
            assert!(
                (w[0].at, w[0].sequence) < (w[1].at, w[1].sequence),
                "entries out of order: {:?} vs {:?}",
                w[0],
                w[1]
            );
        }
    }

    #[test]
    fn test_sequence_follows_queue_order_not_id() {
        let mut sched = Scheduler::new();
        let early = sched.mint_event_id();
        let late = sched.mint_event_id();
        sched.schedule(late, VirtualTime::new(5)).unwrap();
        sched.schedule(early, VirtualTime::new(5)).unwrap();
        assert_eq!(sched.pop_next().unwrap().event, late);
        assert_eq!(sched.pop_next().unwrap().event, early);
    }

    #[test]
    fn test_reject_past_scheduling() {
        let mut sched = Scheduler::new();
        queue(&mut sched, 10);
        sched.pop_next().unwrap();

        let id = sched.mint_event_id();
        let err = sched.schedule(id, VirtualTime::new(9)).unwrap_err();
        assert_eq!(
            err,
            KernelError::InvalidScheduling {
                event: id,
                requested: VirtualTime::new(9),
                current: VirtualTime::new(10),
            }
        );
        assert!(sched.is_empty());
        // Scheduling at exactly `now` is allowed.
        assert!(sched.schedule(id, VirtualTime::new(10)).is_ok());
    }

    #[test]
    fn test_advance_to() {
        let mut sched = Scheduler::starting_at(VirtualTime::new(5));
        sched.advance_to(VirtualTime::new(8)).unwrap();
        assert_eq!(sched.now(), VirtualTime::new(8));
        assert!(sched.advance_to(VirtualTime::new(7)).is_err());

        queue(&mut sched, 12);
        assert!(sched.advance_to(VirtualTime::new(13)).is_err());
        sched.advance_to(VirtualTime::new(12)).unwrap();
        assert_eq!(sched.peek_time(), Some(VirtualTime::new(12)));
    }

    #[test]
    fn test_empty_scheduler() {
        let mut sched = Scheduler::new();
        assert!(sched.is_empty());
        assert_eq!(sched.len(), 0);
        assert!(sched.pop_next().is_none());
        assert_eq!(sched.now(), VirtualTime::ZERO);
    }

    #[test]
    fn test_determinism_across_runs() {
        fn build() -> Vec<QueueEntry> {
            let mut sched = Scheduler::new();
            for at in [5, 3, 5, 1, 3] {
                queue(&mut sched, at);
            }
            sched.drain_ordered()
        }
        assert_eq!(build(), build());
    }
}
