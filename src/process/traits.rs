//! `Process` trait and the values exchanged at each suspension point.

use crate::error::Failure;
use crate::event::EventId;
use crate::interrupt::Interrupt;
use crate::simulation::Context;
use crate::value::Value;

use super::id::ProcessRef;

// ── Resume ────────────────────────────────────────────────────────────

/// What a process body is resumed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resume {
    /// First entry into the body.
    Start,
    /// The awaited event fired successfully with this value.
    Value(Value),
    /// The awaited event fired with a failure.
    Failed(Failure),
    /// The process was interrupted at an interruptible wait point.
    Interrupted(Interrupt),
}

impl Resume {
    /// The value carried by a normal resumption.
    ///
    /// `Start` yields `Value::Unit`. A failed event or an interrupt becomes
    /// `Err`, so a body that does not care about the distinction can write
    /// `input.into_value()?` and let the failure propagate to whoever
    /// awaits it in turn.
    pub fn into_value(self) -> Result<Value, Failure> {
        match self {
            Resume::Start => Ok(Value::Unit),
            Resume::Value(v) => Ok(v),
            Resume::Failed(f) => Err(f),
            Resume::Interrupted(i) => Err(Failure::Interrupted(i)),
        }
    }

    /// Whether this is an interrupt.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Resume::Interrupted(_))
    }
}

// ── Wait points ───────────────────────────────────────────────────────

/// How a wait point reacts to an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum WaitKind {
    /// No handler: an interrupt fails the process with `Failure::Interrupted`.
    #[default]
    Plain,
    /// The body is resumed with `Resume::Interrupted` and decides what to do.
    Interruptible,
}

/// A suspension point: the event to wait for and how interrupts are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPoint {
    pub event: EventId,
    pub kind: WaitKind,
}

// ── Step ──────────────────────────────────────────────────────────────

/// What a process body hands back to the kernel after running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Suspend until the wait point's event fires (or an interrupt arrives).
    Wait(WaitPoint),
    /// Return; the completion event fires with this value.
    Done(Value),
}

impl Step {
    /// Suspend on `event` with a plain wait point.
    pub fn await_event(event: impl Into<EventId>) -> Step {
        Step::Wait(WaitPoint {
            event: event.into(),
            kind: WaitKind::Plain,
        })
    }

    /// Suspend until `process` completes. Sugar for awaiting its completion event.
    pub fn await_process(process: &ProcessRef) -> Step {
        Step::await_event(process.completion_event())
    }

    /// Return with `Value::Unit`.
    pub fn done() -> Step {
        Step::Done(Value::Unit)
    }

    /// Mark the wait point as handling interrupts. No effect on `Done`.
    pub fn interruptible(self) -> Step {
        match self {
            Step::Wait(w) => Step::Wait(WaitPoint {
                kind: WaitKind::Interruptible,
                ..w
            }),
            done => done,
        }
    }
}

// ── Process ───────────────────────────────────────────────────────────

/// A cooperative process body, written as an explicit state machine.
///
/// The kernel calls `resume` once at start and then every time the
/// awaited event fires or an interrupt is delivered. Each call runs to
/// the next suspension point and returns it, or finishes the process.
///
/// # Contract
///
/// Implementations **must**:
/// - Not use global mutable state.
/// - Route all side effects on the simulation through `ctx`.
/// - Be deterministic for equal inputs.
///
/// # Example
///
/// ```rust
/// use kairos::{Context, Environment, Failure, Process, Resume, Step, VirtualTime};
///
/// /// Waits `period` ticks, `rounds` times.
/// struct Ticker { period: u64, rounds: u32 }
///
/// impl Process for Ticker {
///     fn resume(&mut self, ctx: &mut Context<'_>, input: Resume) -> Result<Step, Failure> {
///         input.into_value()?;
///         if self.rounds == 0 {
///             return Ok(Step::done());
///         }
///         self.rounds -= 1;
///         Ok(Step::await_event(ctx.timeout(self.period)?))
///     }
/// }
///
/// let mut env = Environment::new();
/// let ticker = env.process(Ticker { period: 3, rounds: 4 });
/// env.run(None).unwrap();
/// assert_eq!(env.now(), VirtualTime::new(12));
/// assert!(!env.is_alive(&ticker));
/// ```
pub trait Process {
    /// Run the body from its last suspension point.
    fn resume(&mut self, ctx: &mut Context<'_>, input: Resume) -> Result<Step, Failure>;
}

/// A body backed by a closure, useful for tests and short scripts.
impl<F> Process for F
where
    F: FnMut(&mut Context<'_>, Resume) -> Result<Step, Failure>,
{
    fn resume(&mut self, ctx: &mut Context<'_>, input: Resume) -> Result<Step, Failure> {
        (self)(ctx, input)
    }
}

/// Pins a closure to the `Process` signature so its argument types are
/// inferred at the call site.
///
/// ```rust
/// use kairos::{from_fn, Environment, Step, Value};
///
/// let mut env = Environment::new();
/// let p = env.process(from_fn(|ctx, input| {
///     input.into_value()?;
///     Ok(Step::Done(Value::Int(ctx.now().ticks() as i64)))
/// }));
/// env.run(None).unwrap();
/// assert_eq!(env.outcome(p.completion_event()), Some(&Ok(Value::Int(0))));
/// ```
pub fn from_fn<F>(f: F) -> F
where
    F: FnMut(&mut Context<'_>, Resume) -> Result<Step, Failure>,
{
    f
}
