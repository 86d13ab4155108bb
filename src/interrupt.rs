//! Interrupt channel.
//!
//! Any process (or the host) may interrupt a suspended process. The
//! target is detached from the event it was waiting on, the interrupt is
//! queued on the target, and an `Interruption` event is queued at the
//! current instant. When that event fires, the oldest queued interrupt is
//! delivered as `Resume::Interrupted`.
//!
//! Interrupts that arrive while one is already on its way stay queued and
//! are delivered one per resumption, each time the target suspends again.

use tracing::debug;

use crate::error::{KernelError, KernelResult};
use crate::event::{Callback, EventKind};
use crate::process::{ProcessId, ProcessState};
use crate::simulation::Kernel;
use crate::value::Value;

/// An interrupt signal as seen by the interrupted process.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Interrupt {
    /// The interrupting process, or `None` when the host interrupted.
    pub by: Option<ProcessId>,
    /// Optional payload supplied by the interrupter.
    pub cause: Option<Value>,
}

impl Interrupt {
    pub fn new(by: Option<ProcessId>, cause: Option<Value>) -> Self {
        Interrupt { by, cause }
    }
}

impl std::fmt::Display for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "interrupt")?;
        if let Some(by) = self.by {
            write!(f, " by {}", by)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, " ({})", cause)?;
        }
        Ok(())
    }
}

impl Kernel {
    /// Queue an interrupt for `target`.
    ///
    /// Fails with `NotInterruptible`, leaving the target untouched, unless
    /// the target is `Suspended`.
    pub(crate) fn interrupt(
        &mut self,
        target: ProcessId,
        cause: Option<Value>,
        by: Option<ProcessId>,
    ) -> KernelResult<()> {
        let rec = self.process_mut(target)?;
        if rec.state != ProcessState::Suspended {
            return Err(KernelError::NotInterruptible {
                process: target,
                state: rec.state,
            });
        }
        let interrupt = Interrupt::new(by, cause);
        debug!(process = %target, %interrupt, queued = rec.pending_interrupts.len(), "interrupt");
        rec.pending_interrupts.push_back(interrupt);
        if !rec.delivery_scheduled {
            self.schedule_delivery(target)?;
        }
        Ok(())
    }

    /// Detach `target` from its current wait and queue an `Interruption`
    /// event for it at the current instant.
    pub(crate) fn schedule_delivery(&mut self, target: ProcessId) -> KernelResult<()> {
        let waiting_on = self.process(target)?.current_wait;
        if let Some(event) = waiting_on {
            // The event itself is untouched; other waiters still get it.
            if let Some(rec) = self.events.get_mut(&event) {
                rec.callbacks.retain(|cb| *cb != Callback::Resume(target));
            }
        }

        let delivery = self.new_event(EventKind::Interruption { process: target });
        self.queue_now(delivery, Ok(Value::Unit));
        let rec = self.process_mut(target)?;
        rec.current_wait = Some(delivery);
        rec.delivery_scheduled = true;
        Ok(())
    }

    /// Deliver the oldest queued interrupt to `target`.
    pub(crate) fn deliver_interrupt(&mut self, target: ProcessId) -> KernelResult<()> {
        let rec = self.process_mut(target)?;
        rec.delivery_scheduled = false;
        match rec.pending_interrupts.pop_front() {
            Some(interrupt) => self.resume(target, crate::process::Resume::Interrupted(interrupt)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentConfig;
    use crate::error::Failure;
    use crate::process::{from_fn, Resume, Step};

    fn sleeper(kernel: &mut Kernel, delay: u64) -> crate::process::ProcessRef {
        kernel.spawn(
            Box::new(from_fn(move |ctx, input| match input {
                Resume::Start => Ok(Step::await_event(ctx.timeout(delay)?).interruptible()),
                Resume::Interrupted(i) => Ok(Step::Done(i.cause.unwrap_or_default())),
                other => other.into_value().map(Step::Done),
            })),
            None,
            None,
        )
    }

    #[test]
    fn test_display() {
        let i = Interrupt::new(Some(ProcessId::new(3)), Some(Value::text("low battery")));
        assert_eq!(i.to_string(), "interrupt by P3 (\"low battery\")");
        assert_eq!(Interrupt::new(None, None).to_string(), "interrupt");
    }

    #[test]
    fn test_interrupt_requires_suspended_target() {
        let mut k = Kernel::new(EnvironmentConfig::default());
        let p = sleeper(&mut k, 10);

        // Still `Scheduled`: the body has not run yet.
        let err = k.interrupt(p.id(), None, None).unwrap_err();
        assert_eq!(
            err,
            KernelError::NotInterruptible {
                process: p.id(),
                state: ProcessState::Scheduled,
            }
        );
        let rec = k.process(p.id()).unwrap();
        assert_eq!(rec.state, ProcessState::Scheduled);
        assert!(rec.pending_interrupts.is_empty());
    }

    #[test]
    fn test_interrupt_detaches_waiter_but_keeps_event() {
        let mut k = Kernel::new(EnvironmentConfig::default());
        let p = sleeper(&mut k, 10);
        k.step().unwrap();
        let timeout = k.process(p.id()).unwrap().current_wait.unwrap();
        assert_eq!(k.events[&timeout].waiter_count(), 1);

        k.interrupt(p.id(), Some(Value::Int(7)), None).unwrap();
        assert_eq!(k.events[&timeout].waiter_count(), 0);
        assert_eq!(k.scheduler.peek_time(), Some(crate::time::VirtualTime::ZERO));

        k.run(None).unwrap();
        assert_eq!(k.process(p.id()).unwrap().state, ProcessState::Completed);
        assert_eq!(
            k.events[&p.completion_event()].outcome,
            Some(Ok(Value::Int(7)))
        );
        // The timeout still fired on schedule, with nobody listening.
        assert_eq!(k.now(), crate::time::VirtualTime::new(10));
        assert!(k.events[&timeout].has_fired());
    }

    #[test]
    fn test_second_interrupt_is_queued_not_dropped() {
        let mut k = Kernel::new(EnvironmentConfig::default());
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let log = seen.clone();
        let p = k.spawn(
            Box::new(from_fn(move |ctx, input| {
                if let Resume::Interrupted(i) = &input {
                    log.borrow_mut().push(i.cause.clone());
                }
                if log.borrow().len() == 2 {
                    return Ok(Step::done());
                }
                Ok(Step::await_event(ctx.timeout(100)?).interruptible())
            })),
            None,
            None,
        );
        k.step().unwrap();
        k.interrupt(p.id(), Some(Value::Int(1)), None).unwrap();
        k.interrupt(p.id(), Some(Value::Int(2)), None).unwrap();
        assert_eq!(k.process(p.id()).unwrap().pending_interrupts.len(), 2);

        k.run(None).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![Some(Value::Int(1)), Some(Value::Int(2))]
        );
        assert_eq!(k.process(p.id()).unwrap().state, ProcessState::Completed);
    }

    #[test]
    fn test_interrupt_at_plain_wait_fails_process() {
        let mut k = Kernel::new(EnvironmentConfig::default());
        let entered = std::rc::Rc::new(std::cell::Cell::new(0));
        let count = entered.clone();
        let p = k.spawn(
            Box::new(from_fn(move |ctx, _| {
                count.set(count.get() + 1);
                Ok(Step::await_event(ctx.timeout(5)?))
            })),
            None,
            None,
        );
        k.step().unwrap();
        k.interrupt(p.id(), Some(Value::text("stop")), None).unwrap();
        k.run(None).unwrap();

        // The body is never entered with the interrupt.
        assert_eq!(entered.get(), 1);
        assert_eq!(k.process(p.id()).unwrap().state, ProcessState::Interrupted);
        assert_eq!(
            k.events[&p.completion_event()].outcome,
            Some(Err(Failure::Interrupted(Interrupt::new(
                None,
                Some(Value::text("stop"))
            ))))
        );
    }
}
