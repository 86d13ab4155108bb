//! Structured error types for the kernel.
//!
//! Two layers:
//!
//! - [`KernelError`] is returned synchronously by the call that caused it
//!   (scheduling in the past, resuming a process that is not suspended,
//!   interrupting a process that cannot be interrupted, ...).
//! - [`Failure`] is a *value* carried by an event: the cause a process
//!   failed with, or the cause an explicit event was failed with. It only
//!   reaches whoever awaits that event.

use thiserror::Error;

use crate::event::EventId;
use crate::interrupt::Interrupt;
use crate::process::{ProcessId, ProcessState};
use crate::store::StoreId;
use crate::time::VirtualTime;
use crate::value::Value;

/// Errors surfaced by the kernel API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// Attempted to schedule an event before the current virtual time.
    #[error("cannot schedule {event} at {requested} when current time is {current}")]
    InvalidScheduling {
        event: EventId,
        requested: VirtualTime,
        current: VirtualTime,
    },

    /// A run horizon lies before the current virtual time.
    #[error("cannot run until {requested} when current time is {current}")]
    InvalidHorizon {
        requested: VirtualTime,
        current: VirtualTime,
    },

    /// Attempted to resume a process that is not waiting to be resumed.
    #[error("cannot resume process {process} in state {state}")]
    InvalidResume {
        process: ProcessId,
        state: ProcessState,
    },

    /// Attempted to interrupt a process that is not suspended.
    #[error("process {process} is {state} and cannot be interrupted")]
    NotInterruptible {
        process: ProcessId,
        state: ProcessState,
    },

    /// An event ID was referenced that the kernel does not know.
    #[error("event {0} not found")]
    UnknownEvent(EventId),

    /// A process ID was referenced that the kernel does not know.
    #[error("process {0} not found")]
    UnknownProcess(ProcessId),

    /// A store ID was referenced that the kernel does not know.
    #[error("store {0} not found")]
    UnknownStore(StoreId),

    /// An event that already has an outcome was triggered again.
    #[error("event {0} has already been triggered")]
    EventAlreadyTriggered(EventId),

    /// Only events created with `event()` can be triggered by hand.
    #[error("event {0} is not an explicit event")]
    NotExplicit(EventId),

    /// A store was created with a capacity of zero.
    #[error("store capacity must be at least 1")]
    InvalidCapacity,

    /// `now + delay` does not fit in a `VirtualTime`.
    #[error("delay of {delay} ticks from {now} overflows virtual time")]
    TimeOverflow { now: VirtualTime, delay: u64 },

    /// A process failed, nothing awaited it, and the host policy is to abort.
    #[error("process {process} failed with nobody awaiting it: {failure}")]
    ProcessFailure {
        process: ProcessId,
        failure: Box<Failure>,
    },

    /// The queue drained before the awaited event was processed.
    #[error("event {0} was never fired")]
    EventNeverFired(EventId),
}

/// The cause carried by a failed event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Failure {
    /// An interrupt reached a wait point that does not handle interrupts.
    #[error("unrecovered {0}")]
    Interrupted(Interrupt),

    /// A failure raised by a process body or passed to `fail`.
    #[error("failed with {0}")]
    Raised(Value),

    /// A kernel error raised while a process body was running.
    #[cfg_attr(feature = "serialize", serde(skip))]
    #[error("kernel error: {0}")]
    Kernel(Box<KernelError>),
}

impl Failure {
    /// Shorthand for `Failure::Raised(Value::Text(..))`.
    pub fn raised(reason: impl Into<Value>) -> Self {
        Failure::Raised(reason.into())
    }

    /// Returns the interrupt this failure was caused by, if any.
    pub fn interrupt(&self) -> Option<&Interrupt> {
        match self {
            Failure::Interrupted(i) => Some(i),
            _ => None,
        }
    }
}

impl From<KernelError> for Failure {
    fn from(e: KernelError) -> Self {
        Failure::Kernel(Box::new(e))
    }
}

/// What an event resolved to once triggered.
pub type Outcome = Result<Value, Failure>;

/// Convenience alias for `Result<T, KernelError>`.
pub type KernelResult<T> = Result<T, KernelError>;
