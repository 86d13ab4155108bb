//! Process lifecycle state and the kernel's per-process record.

use std::collections::VecDeque;

use crate::event::EventId;
use crate::interrupt::Interrupt;
use crate::time::VirtualTime;

use super::id::ProcessId;
use super::traits::{Process, WaitKind};

/// Lifecycle of a process.
///
/// `Created → Scheduled → Running ⇄ Suspended → {Completed, Failed, Interrupted}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ProcessState {
    /// Record exists, start not yet queued.
    Created,
    /// Start event queued, body not entered yet.
    Scheduled,
    /// Body is executing.
    Running,
    /// Waiting on exactly one event.
    Suspended,
    /// Body returned a value.
    Completed,
    /// Body returned a failure.
    Failed,
    /// An interrupt reached a wait point without a handler.
    Interrupted,
}

impl ProcessState {
    /// Whether the process has finished, one way or another.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessState::Completed | ProcessState::Failed | ProcessState::Interrupted
        )
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Kernel bookkeeping for one process.
pub(crate) struct ProcessRecord {
    pub(crate) id: ProcessId,
    pub(crate) name: String,
    pub(crate) state: ProcessState,
    /// `Some` exactly while `Suspended`.
    pub(crate) current_wait: Option<EventId>,
    /// How the current wait point treats interrupts.
    pub(crate) wait_kind: WaitKind,
    pub(crate) completion: EventId,
    pub(crate) parent: Option<ProcessId>,
    pub(crate) children: Vec<ProcessId>,
    pub(crate) pending_interrupts: VecDeque<Interrupt>,
    /// An `Interruption` event for this process is queued.
    pub(crate) delivery_scheduled: bool,
    pub(crate) spawned_at: VirtualTime,
    /// Taken out while the body runs; dropped once the process terminates.
    pub(crate) body: Option<Box<dyn Process>>,
}

impl ProcessRecord {
    pub(crate) fn new(
        id: ProcessId,
        name: String,
        completion: EventId,
        parent: Option<ProcessId>,
        spawned_at: VirtualTime,
        body: Box<dyn Process>,
    ) -> Self {
        ProcessRecord {
            id,
            name,
            state: ProcessState::Created,
            current_wait: None,
            wait_kind: WaitKind::Plain,
            completion,
            parent,
            children: Vec::new(),
            pending_interrupts: VecDeque::new(),
            delivery_scheduled: false,
            spawned_at,
            body: Some(body),
        }
    }
}

impl std::fmt::Debug for ProcessRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("current_wait", &self.current_wait)
            .field("wait_kind", &self.wait_kind)
            .field("completion", &self.completion)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("pending_interrupts", &self.pending_interrupts.len())
            .field("spawned_at", &self.spawned_at)
            .finish_non_exhaustive()
    }
}
