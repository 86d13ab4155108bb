//! `ProcessId` and `ProcessRef`: the two ways to name a process.

use crate::error::KernelResult;
use crate::event::EventId;
use crate::simulation::Context;
use crate::value::Value;

/// A unique identifier for a process within one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessId(u64);

impl ProcessId {
    /// Create a process ID from a raw integer.
    #[inline]
    pub fn new(id: u64) -> Self {
        ProcessId(id)
    }

    /// Return the underlying integer.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Handle returned by `spawn`.
///
/// Carries both facets of a process: the ID used to drive or interrupt
/// it, and the completion event other processes await. Holding a handle
/// does not keep the process alive; it is plain data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessRef {
    id: ProcessId,
    completion: EventId,
}

impl ProcessRef {
    pub(crate) fn new(id: ProcessId, completion: EventId) -> Self {
        ProcessRef { id, completion }
    }

    /// The process ID.
    #[inline]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// The event that fires when the process returns or fails.
    #[inline]
    pub fn completion_event(&self) -> EventId {
        self.completion
    }

    /// Interrupt this process from inside another process body.
    pub fn interrupt(&self, ctx: &mut Context<'_>, cause: Option<Value>) -> KernelResult<()> {
        ctx.interrupt(self, cause)
    }
}

impl From<ProcessRef> for EventId {
    fn from(p: ProcessRef) -> Self {
        p.completion
    }
}

impl From<&ProcessRef> for EventId {
    fn from(p: &ProcessRef) -> Self {
        p.completion
    }
}

impl std::fmt::Display for ProcessRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
