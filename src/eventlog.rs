/// Run recording for determinism checks.
///
/// When enabled, the kernel appends every fired event and every process
/// state transition to an append-only log. Two runs of the same model
/// must produce logs with equal hashes.

use crate::event::{EventId, EventKind};
use crate::process::{ProcessId, ProcessState};
use crate::time::VirtualTime;

// ── Hash utility ──────────────────────────────────────────────────────

/// Combine two u64 hashes deterministically.
pub fn hash_combine(a: u64, b: u64) -> u64 {
    let mut h = a;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h = h.wrapping_add(b);
    h ^= h >> 32;
    h
}

// ── Log entries ───────────────────────────────────────────────────────

/// One recorded occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// An event was popped from the queue.
    Fired {
        /// Position among fired events, starting at 0.
        index: u64,
        time: VirtualTime,
        event: EventId,
        kind: EventKind,
        waiters: usize,
    },
    /// A process changed state.
    Transition {
        time: VirtualTime,
        process: ProcessId,
        from: ProcessState,
        to: ProcessState,
    },
}

impl LogEntry {
    fn hash(&self) -> u64 {
        match self {
            LogEntry::Fired {
                index,
                time,
                event,
                kind,
                waiters,
            } => {
                let mut h = hash_combine(1, *index);
                h = hash_combine(h, time.ticks());
                h = hash_combine(h, event.raw());
                h = hash_combine(h, kind.tag());
                hash_combine(h, *waiters as u64)
            }
            LogEntry::Transition {
                time,
                process,
                from,
                to,
            } => {
                let mut h = hash_combine(2, time.ticks());
                h = hash_combine(h, process.raw());
                h = hash_combine(h, *from as u64);
                hash_combine(h, *to as u64)
            }
        }
    }
}

// ── Event Log ─────────────────────────────────────────────────────────

/// Append-only log of fired events and process transitions.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Vec<LogEntry>,
    fired: u64,
}

impl EventLog {
    /// Create an empty event log.
    pub fn new() -> Self {
        EventLog {
            entries: Vec::new(),
            fired: 0,
        }
    }

    /// Record a fired event.
    pub fn record_fired(
        &mut self,
        time: VirtualTime,
        event: EventId,
        kind: EventKind,
        waiters: usize,
    ) {
        self.entries.push(LogEntry::Fired {
            index: self.fired,
            time,
            event,
            kind,
            waiters,
        });
        self.fired += 1;
    }

    /// Record a process state transition.
    pub fn record_transition(
        &mut self,
        time: VirtualTime,
        process: ProcessId,
        from: ProcessState,
        to: ProcessState,
    ) {
        self.entries.push(LogEntry::Transition {
            time,
            process,
            from,
            to,
        });
    }

    /// All entries, in recording order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Fired events only, as `(time, event, kind)`.
    pub fn fired(&self) -> impl Iterator<Item = (VirtualTime, EventId, EventKind)> + '_ {
        self.entries.iter().filter_map(|e| match e {
            LogEntry::Fired {
                time, event, kind, ..
            } => Some((*time, *event, *kind)),
            _ => None,
        })
    }

    /// State transitions of one process, as `(from, to)`.
    pub fn transitions_of(
        &self,
        process: ProcessId,
    ) -> impl Iterator<Item = (ProcessState, ProcessState)> + '_ {
        self.entries.iter().filter_map(move |e| match e {
            LogEntry::Transition { process: p, from, to, .. } if *p == process => {
                Some((*from, *to))
            }
            _ => None,
        })
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compute a deterministic hash of the entire log.
    pub fn log_hash(&self) -> u64 {
        self.entries
            .iter()
            .fold(0, |h, entry| hash_combine(h, entry.hash()))
    }
}

/// Whether two logs recorded the same run.
pub fn logs_match(a: &EventLog, b: &EventLog) -> bool {
    a.len() == b.len() && a.log_hash() == b.log_hash()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EventLog {
        let mut log = EventLog::new();
        let p = ProcessId::new(0);
        log.record_fired(VirtualTime::ZERO, EventId::new(1), EventKind::Init { process: p }, 0);
        log.record_transition(VirtualTime::ZERO, p, ProcessState::Scheduled, ProcessState::Running);
        log.record_fired(VirtualTime::new(5), EventId::new(2), EventKind::Timeout { delay: 5 }, 1);
        log
    }

    #[test]
    fn test_hash_determinism() {
        let a = hash_combine(12345, 67890);
        let b = hash_combine(12345, 67890);
        assert_eq!(a, b);
        assert_ne!(hash_combine(1, 2), hash_combine(2, 1));
    }

    #[test]
    fn test_log_hash_determinism() {
        assert_eq!(sample().log_hash(), sample().log_hash());
        assert!(logs_match(&sample(), &sample()));
    }

    #[test]
    fn test_log_hash_detects_divergence() {
        let a = sample();
        let mut b = sample();
        b.record_fired(VirtualTime::new(6), EventId::new(3), EventKind::Explicit, 0);
        assert!(!logs_match(&a, &b));

        let mut c = EventLog::new();
        let p = ProcessId::new(0);
        c.record_fired(VirtualTime::ZERO, EventId::new(1), EventKind::Init { process: p }, 0);
        c.record_transition(VirtualTime::ZERO, p, ProcessState::Scheduled, ProcessState::Running);
        // Same event, different time.
        c.record_fired(VirtualTime::new(4), EventId::new(2), EventKind::Timeout { delay: 5 }, 1);
        assert_eq!(a.len(), c.len());
        assert_ne!(a.log_hash(), c.log_hash());
    }

    #[test]
    fn test_fired_and_transitions_views() {
        let log = sample();
        let fired: Vec<EventId> = log.fired().map(|(_, e, _)| e).collect();
        assert_eq!(fired, vec![EventId::new(1), EventId::new(2)]);
        let transitions: Vec<_> = log.transitions_of(ProcessId::new(0)).collect();
        assert_eq!(transitions, vec![(ProcessState::Scheduled, ProcessState::Running)]);
        assert_eq!(log.transitions_of(ProcessId::new(9)).count(), 0);
        assert_eq!(log.len(), 3);
        assert!(EventLog::default().is_empty());
    }
}
