//! # Kairos: Discrete-Event Simulation Kernel
//!
//! A single-threaded kernel for cooperative processes on a virtual clock.
//! Processes wait on events, spawn children, wait for each other and
//! interrupt each other. No async, no threads, no wall-clock time: every
//! run with the same inputs fires the same events in the same order.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────┐
//! │        Environment         │ ← host facade: factories, run, inspection
//! │  ┌─────────────────────┐  │
//! │  │       Kernel         │  │ ← execution loop, process records
//! │  │  ┌───────────────┐  │  │
//! │  │  │   Scheduler    │  │  │ ← clock + (time, sequence) min-heap
//! │  │  └───────────────┘  │  │
//! │  │  ┌───────────────┐  │  │
//! │  │  │    Events      │  │  │ ← outcomes and waiters
//! │  │  └───────────────┘  │  │
//! │  │  ┌───────────────┐  │  │
//! │  │  │  Interrupts    │  │  │ ← per-process pending queue
//! │  │  └───────────────┘  │  │
//! │  └─────────────────────┘  │
//! └───────────────────────────┘
//!           ▲        │
//!   Context │        │ Resume
//!           │        ▼
//!      ┌──────────────────┐
//!      │  Process bodies   │ ← explicit state machines
//!      └──────────────────┘
//! ```

pub mod condition;
pub mod config;
pub mod environment;
pub mod error;
pub mod event;
pub mod eventlog;
pub mod interrupt;
pub mod process;
pub mod scheduler;
pub mod simulation;
pub mod store;
pub mod time;
pub mod value;

// Re-exports for convenience.
pub use condition::ConditionKind;
pub use config::{EnvironmentConfig, FailurePolicy};
pub use environment::{Environment, EnvironmentBuilder};
pub use error::{Failure, KernelError, KernelResult, Outcome};
pub use event::{EventId, EventKind, EventRecord, EventState};
pub use eventlog::{logs_match, EventLog, LogEntry};
pub use interrupt::Interrupt;
pub use process::{
    from_fn, Process, ProcessId, ProcessRef, ProcessState, Resume, Step, WaitKind, WaitPoint,
};
pub use scheduler::Scheduler;
pub use simulation::{Context, FiredEvent, StepOutcome};
pub use store::StoreId;
pub use time::VirtualTime;
pub use value::Value;
