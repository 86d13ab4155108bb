/// Simulation kernel: the execution loop and the context handed to
/// process bodies.
///
/// The loop pops the earliest event, advances virtual time, and resumes
/// every process waiting on it, synchronously and in registration order.
/// A resumed process may issue a new wait, spawn children or interrupt
/// others before the next waiter runs. Everything happens on one thread.

use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::condition::{Condition, ConditionKind};
use crate::config::{EnvironmentConfig, FailurePolicy};
use crate::error::{Failure, KernelError, KernelResult, Outcome};
use crate::event::{Callback, EventId, EventKind, EventRecord, EventState};
use crate::eventlog::EventLog;
use crate::process::{
    Process, ProcessId, ProcessRecord, ProcessRef, ProcessState, Resume, Step, WaitKind, WaitPoint,
};
use crate::scheduler::Scheduler;
use crate::store::{Store, StoreId};
use crate::time::VirtualTime;
use crate::value::Value;

// ── Step outcome ──────────────────────────────────────────────────────

/// An event fired by one call to `step`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredEvent {
    pub event: EventId,
    pub time: VirtualTime,
    pub kind: EventKind,
    /// Waiters resumed or notified by this event.
    pub waiters: usize,
}

/// Result of a single `step`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// One event was fired.
    Fired(FiredEvent),
    /// The queue was empty; nothing happened.
    Idle,
}

// ── Kernel ────────────────────────────────────────────────────────────

/// All state of one simulation run. Never shared between runs.
pub(crate) struct Kernel {
    pub(crate) scheduler: Scheduler,
    pub(crate) events: BTreeMap<EventId, EventRecord>,
    pub(crate) processes: BTreeMap<ProcessId, ProcessRecord>,
    /// Unresolved conditions, keyed by their own event.
    pub(crate) conditions: BTreeMap<EventId, Condition>,
    pub(crate) stores: Vec<Store>,
    pub(crate) config: EnvironmentConfig,
    pub(crate) log: Option<EventLog>,
    next_process: u64,
    events_processed: u64,
    /// Event the host is blocked on in `run_until_event`; counts as a waiter.
    host_awaits: Option<EventId>,
}

impl Kernel {
    pub(crate) fn new(config: EnvironmentConfig) -> Self {
        Kernel {
            scheduler: Scheduler::starting_at(config.initial_time),
            events: BTreeMap::new(),
            processes: BTreeMap::new(),
            conditions: BTreeMap::new(),
            stores: Vec::new(),
            log: config.record_log.then(EventLog::new),
            config,
            next_process: 0,
            events_processed: 0,
            host_awaits: None,
        }
    }

    #[inline]
    pub(crate) fn now(&self) -> VirtualTime {
        self.scheduler.now()
    }

    pub(crate) fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub(crate) fn process(&self, id: ProcessId) -> KernelResult<&ProcessRecord> {
        self.processes.get(&id).ok_or(KernelError::UnknownProcess(id))
    }

    pub(crate) fn process_mut(&mut self, id: ProcessId) -> KernelResult<&mut ProcessRecord> {
        self.processes
            .get_mut(&id)
            .ok_or(KernelError::UnknownProcess(id))
    }

    pub(crate) fn event_mut(&mut self, id: EventId) -> KernelResult<&mut EventRecord> {
        self.events.get_mut(&id).ok_or(KernelError::UnknownEvent(id))
    }

    // ── Events ────────────────────────────────────────────────────

    /// Create an untriggered event.
    pub(crate) fn new_event(&mut self, kind: EventKind) -> EventId {
        let id = self.scheduler.mint_event_id();
        self.events.insert(id, EventRecord::new(id, kind));
        id
    }

    /// Give a freshly created kernel event its outcome and queue it now.
    pub(crate) fn queue_now(&mut self, id: EventId, outcome: Outcome) {
        let at = self.scheduler.now();
        let sequence = self.scheduler.schedule_now(id);
        if let Some(rec) = self.events.get_mut(&id) {
            rec.outcome = Some(outcome);
            rec.trigger_time = Some(at);
            rec.sequence = Some(sequence);
        }
    }

    /// Trigger an explicit event at the absolute time `at`.
    pub(crate) fn trigger_at(
        &mut self,
        id: EventId,
        outcome: Outcome,
        at: VirtualTime,
    ) -> KernelResult<()> {
        let rec = self.events.get_mut(&id).ok_or(KernelError::UnknownEvent(id))?;
        if rec.kind != EventKind::Explicit {
            return Err(KernelError::NotExplicit(id));
        }
        if rec.is_triggered() {
            return Err(KernelError::EventAlreadyTriggered(id));
        }
        let sequence = self.scheduler.schedule(id, at)?;
        rec.outcome = Some(outcome);
        rec.trigger_time = Some(at);
        rec.sequence = Some(sequence);
        Ok(())
    }

    pub(crate) fn timeout(&mut self, delay: u64, value: Value) -> KernelResult<EventId> {
        let now = self.now();
        let at = now
            .plus(delay)
            .ok_or(KernelError::TimeOverflow { now, delay })?;
        let id = self.new_event(EventKind::Timeout { delay });
        let sequence = self.scheduler.schedule(id, at)?;
        if let Some(rec) = self.events.get_mut(&id) {
            rec.outcome = Some(Ok(value));
            rec.trigger_time = Some(at);
            rec.sequence = Some(sequence);
        }
        Ok(id)
    }

    // ── Processes ─────────────────────────────────────────────────

    /// Create a process and queue its start at the current time.
    pub(crate) fn spawn(
        &mut self,
        body: Box<dyn Process>,
        name: Option<String>,
        parent: Option<ProcessId>,
    ) -> ProcessRef {
        let id = ProcessId::new(self.next_process);
        self.next_process += 1;
        let name = name.unwrap_or_else(|| format!("process-{}", id.raw()));
        let completion = self.new_event(EventKind::Completion { process: id });
        let now = self.now();

        self.processes.insert(
            id,
            ProcessRecord::new(id, name, completion, parent, now, body),
        );
        if let Some(parent) = parent.and_then(|p| self.processes.get_mut(&p)) {
            parent.children.push(id);
        }

        let init = self.new_event(EventKind::Init { process: id });
        self.queue_now(init, Ok(Value::Unit));
        self.set_state(id, ProcessState::Scheduled);
        debug!(process = %id, parent = ?parent, time = %now, "spawned");

        ProcessRef::new(id, completion)
    }

    pub(crate) fn set_state(&mut self, id: ProcessId, to: ProcessState) {
        let now = self.now();
        if let Some(rec) = self.processes.get_mut(&id) {
            let from = rec.state;
            rec.state = to;
            trace!(process = %id, %from, %to, "transition");
            if let Some(log) = self.log.as_mut() {
                log.record_transition(now, id, from, to);
            }
        }
    }

    /// Run a process body from its last suspension point.
    ///
    /// `Start` is accepted only from `Scheduled`; every other input only
    /// from `Suspended`. Anything else is `InvalidResume`.
    pub(crate) fn resume(&mut self, id: ProcessId, input: Resume) -> KernelResult<()> {
        let rec = self.process_mut(id)?;
        let resumable = match input {
            Resume::Start => rec.state == ProcessState::Scheduled,
            _ => rec.state == ProcessState::Suspended,
        };
        if !resumable {
            return Err(KernelError::InvalidResume {
                process: id,
                state: rec.state,
            });
        }
        let wait_kind = rec.wait_kind;
        let mut body = rec.body.take().ok_or(KernelError::InvalidResume {
            process: id,
            state: rec.state,
        })?;
        rec.current_wait = None;
        rec.wait_kind = WaitKind::Plain;
        self.set_state(id, ProcessState::Running);

        let result = match input {
            Resume::Interrupted(interrupt) if wait_kind == WaitKind::Plain => {
                debug!(process = %id, %interrupt, "interrupt at plain wait point");
                Err(Failure::Interrupted(interrupt))
            }
            input => {
                let mut ctx = Context {
                    kernel: &mut *self,
                    current: id,
                };
                body.resume(&mut ctx, input)
            }
        };

        if let Some(rec) = self.processes.get_mut(&id) {
            rec.body = Some(body);
        }

        match result {
            Ok(Step::Wait(wait)) => self.suspend(id, wait),
            Ok(Step::Done(value)) => {
                self.finish(id, Ok(value));
                Ok(())
            }
            Err(failure) => {
                self.finish(id, Err(failure));
                Ok(())
            }
        }
    }

    /// Register `id` as a waiter on the wait point's event.
    fn suspend(&mut self, id: ProcessId, wait: WaitPoint) -> KernelResult<()> {
        let target = match self.events.get(&wait.event) {
            None => {
                self.finish(id, Err(KernelError::UnknownEvent(wait.event).into()));
                return Ok(());
            }
            Some(ev) if ev.state == EventState::Pending => wait.event,
            // Already fired: re-deliver its outcome at the current instant.
            Some(ev) => {
                let outcome = ev.outcome.clone().unwrap_or(Ok(Value::Unit));
                let relay = self.new_event(EventKind::Relay { source: wait.event });
                self.queue_now(relay, outcome);
                relay
            }
        };

        self.event_mut(target)?.callbacks.push(Callback::Resume(id));
        let rec = self.process_mut(id)?;
        rec.current_wait = Some(target);
        rec.wait_kind = wait.kind;
        let deliver_now = !rec.pending_interrupts.is_empty() && !rec.delivery_scheduled;
        self.set_state(id, ProcessState::Suspended);
        debug!(process = %id, event = %wait.event, kind = ?wait.kind, "suspended");

        if deliver_now {
            self.schedule_delivery(id)?;
        }
        Ok(())
    }

    /// Terminate a process and fire its completion event now.
    fn finish(&mut self, id: ProcessId, outcome: Outcome) {
        let (completion, dropped) = match self.processes.get_mut(&id) {
            Some(rec) => {
                rec.body = None;
                rec.current_wait = None;
                let dropped = rec.pending_interrupts.len();
                rec.pending_interrupts.clear();
                (rec.completion, dropped)
            }
            None => return,
        };
        if dropped > 0 {
            warn!(process = %id, dropped, "process terminated with undelivered interrupts");
        }

        let state = match &outcome {
            Ok(_) => ProcessState::Completed,
            Err(Failure::Interrupted(_)) => ProcessState::Interrupted,
            Err(_) => ProcessState::Failed,
        };
        match &outcome {
            Ok(value) => debug!(process = %id, %value, "completed"),
            Err(failure) => debug!(process = %id, %failure, "failed"),
        }
        self.set_state(id, state);
        self.queue_now(completion, outcome);
    }

    // ── Execution loop ────────────────────────────────────────────

    /// Fire the earliest queued event.
    ///
    /// Advances the clock to the event's time, runs the kernel action for
    /// its kind (start a process, deliver an interrupt), then notifies the
    /// waiters in registration order.
    pub(crate) fn step(&mut self) -> KernelResult<StepOutcome> {
        let Some(entry) = self.scheduler.pop_next() else {
            return Ok(StepOutcome::Idle);
        };
        let id = entry.event;
        let time = entry.at;

        let rec = self.event_mut(id)?;
        rec.state = EventState::Triggered;
        let kind = rec.kind;
        let outcome = rec.outcome.clone().unwrap_or(Ok(Value::Unit));
        let callbacks = std::mem::take(&mut rec.callbacks);
        let waiters = callbacks.len();

        self.events_processed += 1;
        debug!(event = %id, %kind, %time, waiters, "fired");
        if let Some(log) = self.log.as_mut() {
            log.record_fired(time, id, kind, waiters);
        }

        match kind {
            EventKind::Init { process } => self.resume(process, Resume::Start)?,
            EventKind::Interruption { process } => self.deliver_interrupt(process)?,
            _ => {}
        }

        for callback in callbacks {
            match callback {
                Callback::Resume(pid) => {
                    let rec = self.process(pid)?;
                    // An earlier waiter may have interrupted this one.
                    if rec.state != ProcessState::Suspended || rec.current_wait != Some(id) {
                        trace!(process = %pid, event = %id, "stale waiter skipped");
                        continue;
                    }
                    let input = match &outcome {
                        Ok(value) => Resume::Value(value.clone()),
                        Err(failure) => Resume::Failed(failure.clone()),
                    };
                    self.resume(pid, input)?;
                }
                Callback::Condition(cond) => self.check_condition(cond),
            }
        }

        if kind.is_internal() {
            self.events.remove(&id);
        } else {
            self.event_mut(id)?.state = EventState::Processed;
        }

        if let (EventKind::Completion { process }, Err(failure)) = (kind, &outcome) {
            if waiters == 0 && self.host_awaits != Some(id) {
                warn!(%process, %failure, "process failed with nobody awaiting it");
                if self.config.failure_policy == FailurePolicy::Abort {
                    return Err(KernelError::ProcessFailure {
                        process,
                        failure: Box::new(failure.clone()),
                    });
                }
            }
        }

        Ok(StepOutcome::Fired(FiredEvent {
            event: id,
            time,
            kind,
            waiters,
        }))
    }

    /// Step until the queue is empty or the next event lies after `until`.
    ///
    /// With a horizon, the clock ends at exactly `until`; events at later
    /// times stay queued for a later run. Returns the number of events fired.
    pub(crate) fn run(&mut self, until: Option<VirtualTime>) -> KernelResult<u64> {
        let now = self.now();
        if let Some(until) = until {
            if until.is_before(now) {
                return Err(KernelError::InvalidHorizon {
                    requested: until,
                    current: now,
                });
            }
        }

        let start = self.events_processed;
        loop {
            match (self.scheduler.peek_time(), until) {
                (None, _) => break,
                (Some(next), Some(until)) if until.is_before(next) => break,
                _ => {}
            }
            self.step()?;
        }
        if let Some(until) = until {
            self.scheduler.advance_to(until)?;
        }
        debug!(fired = self.events_processed - start, time = %self.now(), "run stopped");
        Ok(self.events_processed - start)
    }

    /// Step until `event` has been fired, then return its outcome.
    ///
    /// The host counts as a waiter on `event`, so a failed completion
    /// event awaited this way is returned rather than treated as unobserved.
    pub(crate) fn run_until_event(&mut self, event: EventId) -> KernelResult<Outcome> {
        self.host_awaits = Some(event);
        let result = self.step_until_fired(event);
        self.host_awaits = None;
        result
    }

    fn step_until_fired(&mut self, event: EventId) -> KernelResult<Outcome> {
        loop {
            let rec = self
                .events
                .get(&event)
                .ok_or(KernelError::UnknownEvent(event))?;
            if rec.has_fired() {
                return Ok(rec.outcome.clone().unwrap_or(Ok(Value::Unit)));
            }
            if let StepOutcome::Idle = self.step()? {
                return Err(KernelError::EventNeverFired(event));
            }
        }
    }
}

// ── Context ───────────────────────────────────────────────────────────

/// Handle passed to a process body on every resumption.
///
/// Provides the body with:
/// - the current virtual time and its own identity
/// - factories for timeouts, explicit events, conditions and child processes
/// - the interrupt channel and store requests
///
/// The context borrows the kernel mutably for the duration of one
/// resumption, so a body cannot touch scheduler internals directly.
pub struct Context<'a> {
    pub(crate) kernel: &'a mut Kernel,
    pub(crate) current: ProcessId,
}

impl<'a> Context<'a> {
    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.kernel.now()
    }

    /// The running process.
    #[inline]
    pub fn id(&self) -> ProcessId {
        self.current
    }

    /// Handle to the running process.
    pub fn me(&self) -> KernelResult<ProcessRef> {
        let rec = self.kernel.process(self.current)?;
        Ok(ProcessRef::new(self.current, rec.completion))
    }

    /// Name the running process was spawned with.
    pub fn name(&self) -> &str {
        self.kernel
            .processes
            .get(&self.current)
            .map(|r| r.name.as_str())
            .unwrap_or_default()
    }

    /// An event that fires `delay` ticks from now.
    pub fn timeout(&mut self, delay: u64) -> KernelResult<EventId> {
        self.kernel.timeout(delay, Value::Unit)
    }

    /// An event that fires `delay` ticks from now carrying `value`.
    pub fn timeout_with(&mut self, delay: u64, value: Value) -> KernelResult<EventId> {
        self.kernel.timeout(delay, value)
    }

    /// A new untriggered event.
    pub fn event(&mut self) -> EventId {
        self.kernel.new_event(EventKind::Explicit)
    }

    /// Trigger an explicit event successfully at the current instant.
    pub fn succeed(&mut self, event: EventId, value: Value) -> KernelResult<()> {
        let now = self.now();
        self.kernel.trigger_at(event, Ok(value), now)
    }

    /// Trigger an explicit event with a failure at the current instant.
    pub fn fail(&mut self, event: EventId, failure: Failure) -> KernelResult<()> {
        let now = self.now();
        self.kernel.trigger_at(event, Err(failure), now)
    }

    /// Trigger an explicit event at an absolute time.
    pub fn schedule(&mut self, event: EventId, at: VirtualTime) -> KernelResult<()> {
        self.kernel.trigger_at(event, Ok(Value::Unit), at)
    }

    /// An event that fires once any of `events` has fired.
    pub fn any_of(&mut self, events: &[EventId]) -> KernelResult<EventId> {
        self.kernel.condition(ConditionKind::Any, events)
    }

    /// An event that fires once all of `events` have fired.
    pub fn all_of(&mut self, events: &[EventId]) -> KernelResult<EventId> {
        self.kernel.condition(ConditionKind::All, events)
    }

    /// Request that `item` be added to `store`.
    pub fn put(&mut self, store: StoreId, item: Value) -> KernelResult<EventId> {
        self.kernel.put(store, item)
    }

    /// Request the oldest item of `store`.
    pub fn get(&mut self, store: StoreId) -> KernelResult<EventId> {
        self.kernel.get(store)
    }

    /// Withdraw an unserved store request.
    pub fn cancel(&mut self, store: StoreId, request: EventId) -> KernelResult<bool> {
        self.kernel.cancel(store, request)
    }

    /// Spawn a child of the running process. It starts at the current time,
    /// after the running process suspends.
    pub fn process<P: Process + 'static>(&mut self, body: P) -> ProcessRef {
        self.kernel
            .spawn(Box::new(body), None, Some(self.current))
    }

    /// Spawn a named child of the running process.
    pub fn process_named<P: Process + 'static>(
        &mut self,
        name: impl Into<String>,
        body: P,
    ) -> ProcessRef {
        self.kernel
            .spawn(Box::new(body), Some(name.into()), Some(self.current))
    }

    /// Interrupt `target`. It must be suspended.
    pub fn interrupt(&mut self, target: &ProcessRef, cause: Option<Value>) -> KernelResult<()> {
        self.kernel
            .interrupt(target.id(), cause, Some(self.current))
    }

    /// State of any process in this environment.
    pub fn process_state(&self, id: ProcessId) -> Option<ProcessState> {
        self.kernel.processes.get(&id).map(|r| r.state)
    }

    /// Outcome of an event, once triggered.
    pub fn outcome(&self, event: EventId) -> Option<&Outcome> {
        self.kernel.events.get(&event)?.outcome.as_ref()
    }
}
