/// Event records for the simulation kernel.
///
/// An event is the atomic unit of scheduling. It is created untriggered,
/// gets an outcome and a fire time when triggered, is placed on the
/// scheduler's queue, and resumes every registered waiter when fired.

use crate::error::Outcome;
use crate::process::ProcessId;
use crate::store::StoreId;
use crate::time::VirtualTime;

// ── Event ID ──────────────────────────────────────────────────────────

/// A globally unique, strictly-increasing event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(u64);

impl EventId {
    /// Wrap a raw u64 into an `EventId`.
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    /// Return the raw value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

// ── Event ID Generator ───────────────────────────────────────────────

/// Deterministic, strictly-increasing event-ID generator.
///
/// Each environment owns exactly one of these.
#[derive(Debug, Clone, Default)]
pub struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    /// Create a generator starting at 0.
    pub fn new() -> Self {
        EventIdGen { next: 0 }
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }

    /// Peek at the next ID without consuming it.
    pub fn peek(&self) -> EventId {
        EventId(self.next)
    }
}

// ── Event State ──────────────────────────────────────────────────────

/// Lifecycle of an event. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum EventState {
    /// Not fired yet. Either untriggered, or triggered and waiting in the queue.
    Pending,
    /// Popped from the queue; its waiters are being resumed.
    Triggered,
    /// All waiters have run.
    Processed,
}

impl std::fmt::Display for EventState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

// ── Event Kind ───────────────────────────────────────────────────────

/// What created an event. Determines any kernel action taken when it fires,
/// before its waiters are resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
    /// Starts a freshly spawned process.
    Init { process: ProcessId },
    /// Fires `delay` ticks after creation.
    Timeout { delay: u64 },
    /// Fires when a process returns or fails.
    Completion { process: ProcessId },
    /// Created by `event()`, triggered by `succeed`/`fail`/`schedule`.
    Explicit,
    /// Delivers the next queued interrupt to a process.
    Interruption { process: ProcessId },
    /// `any_of` / `all_of`.
    Condition,
    /// Fires when an item is accepted by a store.
    StorePut { store: StoreId },
    /// Fires with an item taken from a store.
    StoreGet { store: StoreId },
    /// Re-delivers the outcome of an event that had already fired.
    Relay { source: EventId },
}

impl EventKind {
    /// Events the kernel creates for its own bookkeeping. Nobody outside
    /// the kernel holds their IDs, so they are dropped once processed.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            EventKind::Init { .. } | EventKind::Interruption { .. } | EventKind::Relay { .. }
        )
    }

    /// Short tag used by the event log hash.
    pub(crate) fn tag(&self) -> u64 {
        match self {
            EventKind::Init { .. } => 1,
            EventKind::Timeout { .. } => 2,
            EventKind::Completion { .. } => 3,
            EventKind::Explicit => 4,
            EventKind::Interruption { .. } => 5,
            EventKind::Condition => 6,
            EventKind::StorePut { .. } => 7,
            EventKind::StoreGet { .. } => 8,
            EventKind::Relay { .. } => 9,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Init { process } => write!(f, "Init({})", process),
            EventKind::Timeout { delay } => write!(f, "Timeout(+{})", delay),
            EventKind::Completion { process } => write!(f, "Completion({})", process),
            EventKind::Explicit => write!(f, "Explicit"),
            EventKind::Interruption { process } => write!(f, "Interruption({})", process),
            EventKind::Condition => write!(f, "Condition"),
            EventKind::StorePut { store } => write!(f, "Put({})", store),
            EventKind::StoreGet { store } => write!(f, "Get({})", store),
            EventKind::Relay { source } => write!(f, "Relay({})", source),
        }
    }
}

// ── Callbacks ────────────────────────────────────────────────────────

/// Who gets notified when an event fires, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Callback {
    /// Resume a process suspended on this event.
    Resume(ProcessId),
    /// Re-evaluate the condition whose own event has this ID.
    Condition(EventId),
}

// ── Event Record ─────────────────────────────────────────────────────

/// The kernel's bookkeeping for one event.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub id: EventId,
    pub kind: EventKind,
    pub state: EventState,
    /// Set once, when the event is triggered.
    pub trigger_time: Option<VirtualTime>,
    /// Queue tie-break; assigned when the event is put on the queue.
    pub sequence: Option<u64>,
    /// Set once, together with `trigger_time`.
    pub outcome: Option<Outcome>,
    pub(crate) callbacks: Vec<Callback>,
}

impl EventRecord {
    pub(crate) fn new(id: EventId, kind: EventKind) -> Self {
        EventRecord {
            id,
            kind,
            state: EventState::Pending,
            trigger_time: None,
            sequence: None,
            outcome: None,
            callbacks: Vec::new(),
        }
    }

    /// Whether an outcome has been assigned (the event is queued or fired).
    pub fn is_triggered(&self) -> bool {
        self.outcome.is_some()
    }

    /// Whether the event has been popped from the queue.
    pub fn has_fired(&self) -> bool {
        self.state != EventState::Pending
    }

    /// Number of waiters still registered.
    pub fn waiter_count(&self) -> usize {
        self.callbacks.len()
    }
}
