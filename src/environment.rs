//! The host-facing simulation environment.
//!
//! An [`Environment`] owns one kernel: clock, queue, events, processes
//! and stores. Everything the host does between steps goes through it.

use crate::condition::ConditionKind;
use crate::config::{EnvironmentConfig, FailurePolicy};
use crate::error::{Failure, KernelResult, Outcome};
use crate::event::{EventId, EventKind, EventRecord, EventState};
use crate::eventlog::EventLog;
use crate::process::{Process, ProcessId, ProcessRef, ProcessState};
use crate::simulation::{Kernel, StepOutcome};
use crate::store::StoreId;
use crate::time::VirtualTime;
use crate::value::Value;

// ── Environment ───────────────────────────────────────────────────────

/// A discrete-event simulation.
///
/// # Example
/// ```rust
/// use kairos::{from_fn, Environment, Resume, Step, Value, VirtualTime};
///
/// let mut env = Environment::new();
/// let clock = env.process(from_fn(|ctx, input| match input {
///     Resume::Start => Ok(Step::await_event(ctx.timeout(5)?)),
///     other => Ok(Step::Done(other.into_value()?)),
/// }));
///
/// env.run(Some(VirtualTime::new(3))).unwrap();
/// assert!(env.is_alive(&clock));
/// env.run(None).unwrap();
/// assert_eq!(env.now(), VirtualTime::new(5));
/// assert_eq!(env.outcome(clock.completion_event()), Some(&Ok(Value::Unit)));
/// ```
pub struct Environment {
    kernel: Kernel,
}

impl Environment {
    /// Environment with the default configuration, starting at time zero.
    pub fn new() -> Self {
        Self::with_config(EnvironmentConfig::default())
    }

    pub fn with_config(config: EnvironmentConfig) -> Self {
        Environment {
            kernel: Kernel::new(config),
        }
    }

    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::new()
    }

    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.kernel.now()
    }

    /// Fire time of the next queued event, if any.
    pub fn peek(&self) -> Option<VirtualTime> {
        self.kernel.scheduler.peek_time()
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.kernel.config
    }

    // ── Processes ─────────────────────────────────────────────────

    /// Spawn a top-level process. It starts at the current time.
    pub fn process<P: Process + 'static>(&mut self, body: P) -> ProcessRef {
        self.kernel.spawn(Box::new(body), None, None)
    }

    /// Spawn a named top-level process.
    pub fn process_named<P: Process + 'static>(
        &mut self,
        name: impl Into<String>,
        body: P,
    ) -> ProcessRef {
        self.kernel.spawn(Box::new(body), Some(name.into()), None)
    }

    /// Interrupt a suspended process from outside any process body.
    pub fn interrupt(&mut self, target: &ProcessRef, cause: Option<Value>) -> KernelResult<()> {
        self.kernel.interrupt(target.id(), cause, None)
    }

    // ── Events ────────────────────────────────────────────────────

    /// An event that fires `delay` ticks from now.
    pub fn timeout(&mut self, delay: u64) -> KernelResult<EventId> {
        self.kernel.timeout(delay, Value::Unit)
    }

    /// An event that fires `delay` ticks from now carrying `value`.
    pub fn timeout_with(&mut self, delay: u64, value: Value) -> KernelResult<EventId> {
        self.kernel.timeout(delay, value)
    }

    /// A new untriggered event, triggered later with `succeed`, `fail` or `schedule`.
    pub fn event(&mut self) -> EventId {
        self.kernel.new_event(EventKind::Explicit)
    }

    pub fn succeed(&mut self, event: EventId, value: Value) -> KernelResult<()> {
        let now = self.now();
        self.kernel.trigger_at(event, Ok(value), now)
    }

    pub fn fail(&mut self, event: EventId, failure: Failure) -> KernelResult<()> {
        let now = self.now();
        self.kernel.trigger_at(event, Err(failure), now)
    }

    /// Queue an explicit event to fire at the absolute time `at`.
    pub fn schedule(&mut self, event: EventId, at: VirtualTime) -> KernelResult<()> {
        self.kernel.trigger_at(event, Ok(Value::Unit), at)
    }

    pub fn any_of(&mut self, events: &[EventId]) -> KernelResult<EventId> {
        self.kernel.condition(ConditionKind::Any, events)
    }

    pub fn all_of(&mut self, events: &[EventId]) -> KernelResult<EventId> {
        self.kernel.condition(ConditionKind::All, events)
    }

    // ── Stores ────────────────────────────────────────────────────

    /// An unbounded FIFO store.
    pub fn store(&mut self) -> StoreId {
        self.kernel.add_store(usize::MAX)
    }

    /// A FIFO store holding at most `capacity` items.
    pub fn store_with_capacity(&mut self, capacity: usize) -> KernelResult<StoreId> {
        self.kernel.create_store(Some(capacity))
    }

    pub fn put(&mut self, store: StoreId, item: Value) -> KernelResult<EventId> {
        self.kernel.put(store, item)
    }

    pub fn get(&mut self, store: StoreId) -> KernelResult<EventId> {
        self.kernel.get(store)
    }

    pub fn cancel(&mut self, store: StoreId, request: EventId) -> KernelResult<bool> {
        self.kernel.cancel(store, request)
    }

    /// Items currently held by `store`.
    pub fn store_len(&self, store: StoreId) -> KernelResult<usize> {
        self.kernel.store_len(store)
    }

    // ── Execution ─────────────────────────────────────────────────

    /// Fire the next event.
    pub fn step(&mut self) -> KernelResult<StepOutcome> {
        self.kernel.step()
    }

    /// Run until the queue is empty, or up to and including `until`.
    ///
    /// Returns the number of events fired. With a horizon the clock ends
    /// at `until` even if the queue ran dry earlier.
    pub fn run(&mut self, until: Option<VirtualTime>) -> KernelResult<u64> {
        self.kernel.run(until)
    }

    /// Run until `event` has fired and return its outcome.
    ///
    /// A failed process awaited this way comes back as `Ok(Err(failure))`
    /// under either failure policy.
    pub fn run_until_event(&mut self, event: impl Into<EventId>) -> KernelResult<Outcome> {
        self.kernel.run_until_event(event.into())
    }

    // ── Inspection ────────────────────────────────────────────────

    pub fn process_state(&self, id: ProcessId) -> Option<ProcessState> {
        self.kernel.processes.get(&id).map(|r| r.state)
    }

    pub fn process_name(&self, id: ProcessId) -> Option<&str> {
        self.kernel.processes.get(&id).map(|r| r.name.as_str())
    }

    /// Whether the process has not terminated yet.
    pub fn is_alive(&self, process: &ProcessRef) -> bool {
        self.process_state(process.id())
            .is_some_and(|s| !s.is_terminal())
    }

    /// Processes spawned by `id`, in spawn order.
    pub fn children(&self, id: ProcessId) -> &[ProcessId] {
        self.kernel
            .processes
            .get(&id)
            .map(|r| r.children.as_slice())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: ProcessId) -> Option<ProcessId> {
        self.kernel.processes.get(&id)?.parent
    }

    /// The record of an event. Internal kernel events are gone once fired.
    pub fn event_record(&self, event: EventId) -> Option<&EventRecord> {
        self.kernel.events.get(&event)
    }

    pub fn event_state(&self, event: EventId) -> Option<EventState> {
        self.event_record(event).map(|r| r.state)
    }

    /// Outcome of an event, once triggered.
    pub fn outcome(&self, event: EventId) -> Option<&Outcome> {
        self.event_record(event)?.outcome.as_ref()
    }

    /// Total events fired so far.
    pub fn events_processed(&self) -> u64 {
        self.kernel.events_processed()
    }

    /// The run log, if recording was enabled.
    pub fn event_log(&self) -> Option<&EventLog> {
        self.kernel.log.as_ref()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("now", &self.now())
            .field("queued", &self.kernel.scheduler.len())
            .field("processes", &self.kernel.processes.len())
            .field("events_processed", &self.events_processed())
            .finish()
    }
}

// ── EnvironmentBuilder ────────────────────────────────────────────────

/// Fluent builder for an [`Environment`].
///
/// # Example
/// ```rust
/// use kairos::{Environment, FailurePolicy, VirtualTime};
///
/// let env = Environment::builder()
///     .initial_time(100)
///     .abort_on_unhandled_failure()
///     .with_log()
///     .build();
/// assert_eq!(env.now(), VirtualTime::new(100));
/// assert_eq!(env.config().failure_policy, FailurePolicy::Abort);
/// assert!(env.event_log().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct EnvironmentBuilder {
    config: EnvironmentConfig,
}

impl EnvironmentBuilder {
    pub fn new() -> Self {
        EnvironmentBuilder {
            config: EnvironmentConfig::default(),
        }
    }

    /// Start the clock at `at` instead of zero.
    pub fn initial_time(mut self, at: impl Into<VirtualTime>) -> Self {
        self.config.initial_time = at.into();
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Make an unobserved process failure stop `step`/`run` with an error.
    pub fn abort_on_unhandled_failure(self) -> Self {
        self.failure_policy(FailurePolicy::Abort)
    }

    /// Record fired events and process transitions.
    pub fn with_log(mut self) -> Self {
        self.config.record_log = true;
        self
    }

    pub fn build(self) -> Environment {
        Environment::with_config(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KernelError;

    #[test]
    fn test_builder_defaults_match_new() {
        let built = Environment::builder().build();
        assert_eq!(built.config(), Environment::new().config());
        assert!(built.event_log().is_none());
    }

    #[test]
    fn test_initial_time() {
        let mut env = Environment::builder().initial_time(50).build();
        let t = env.timeout(5).unwrap();
        env.run(None).unwrap();
        assert_eq!(env.now(), VirtualTime::new(55));
        assert_eq!(
            env.event_record(t).unwrap().trigger_time,
            Some(VirtualTime::new(55))
        );
    }

    #[test]
    fn test_run_empty_queue() {
        let mut env = Environment::new();
        assert_eq!(env.run(None).unwrap(), 0);
        assert_eq!(env.now(), VirtualTime::ZERO);
        assert_eq!(env.step().unwrap(), StepOutcome::Idle);
    }

    #[test]
    fn test_run_until_is_inclusive_and_idempotent() {
        let mut env = Environment::new();
        let at_ten = env.timeout(10).unwrap();
        let later = env.timeout(11).unwrap();

        assert_eq!(env.run(Some(VirtualTime::new(10))).unwrap(), 1);
        assert_eq!(env.event_state(at_ten), Some(EventState::Processed));
        assert_eq!(env.event_state(later), Some(EventState::Pending));
        assert_eq!(env.now(), VirtualTime::new(10));

        assert_eq!(env.run(Some(VirtualTime::new(10))).unwrap(), 0);
        assert_eq!(env.now(), VirtualTime::new(10));
        assert_eq!(env.peek(), Some(VirtualTime::new(11)));
    }

    #[test]
    fn test_run_until_past_time_rejected() {
        let mut env = Environment::builder().initial_time(5).build();
        assert_eq!(
            env.run(Some(VirtualTime::new(4))),
            Err(KernelError::InvalidHorizon {
                requested: VirtualTime::new(4),
                current: VirtualTime::new(5),
            })
        );
    }

    #[test]
    fn test_run_until_advances_idle_clock() {
        let mut env = Environment::new();
        env.run(Some(VirtualTime::new(7))).unwrap();
        assert_eq!(env.now(), VirtualTime::new(7));
    }

    #[test]
    fn test_explicit_event_lifecycle() {
        let mut env = Environment::new();
        let e = env.event();
        assert_eq!(env.outcome(e), None);

        env.succeed(e, Value::Int(1)).unwrap();
        assert_eq!(env.succeed(e, Value::Int(2)), Err(KernelError::EventAlreadyTriggered(e)));
        assert_eq!(env.fail(e, Failure::raised("late")), Err(KernelError::EventAlreadyTriggered(e)));

        env.run(None).unwrap();
        assert_eq!(env.outcome(e), Some(&Ok(Value::Int(1))));
        assert_eq!(env.event_state(e), Some(EventState::Processed));
    }

    #[test]
    fn test_schedule_round_trip() {
        let mut env = Environment::new();
        let e = env.event();
        env.schedule(e, VirtualTime::new(9)).unwrap();
        assert_eq!(env.run_until_event(e).unwrap(), Ok(Value::Unit));
        assert_eq!(env.now(), VirtualTime::new(9));
        assert_eq!(env.events_processed(), 1);
        assert_eq!(env.run(None).unwrap(), 0);
    }

    #[test]
    fn test_schedule_in_past_rejected() {
        let mut env = Environment::builder().initial_time(10).build();
        let e = env.event();
        assert!(matches!(
            env.schedule(e, VirtualTime::new(3)),
            Err(KernelError::InvalidScheduling { .. })
        ));
        // Still untriggered.
        assert_eq!(env.outcome(e), None);
        env.schedule(e, VirtualTime::new(10)).unwrap();
    }

    #[test]
    fn test_only_explicit_events_can_be_triggered() {
        let mut env = Environment::new();
        let t = env.timeout(3).unwrap();
        assert_eq!(env.succeed(t, Value::Unit), Err(KernelError::NotExplicit(t)));
        let missing = EventId::new(404);
        assert_eq!(env.succeed(missing, Value::Unit), Err(KernelError::UnknownEvent(missing)));
    }

    #[test]
    fn test_run_until_event_never_fired() {
        let mut env = Environment::new();
        let e = env.event();
        assert_eq!(env.run_until_event(e), Err(KernelError::EventNeverFired(e)));
    }

    #[test]
    fn test_timeout_past_end_of_time() {
        let mut env = Environment::builder().initial_time(u64::MAX).build();
        assert_eq!(
            env.timeout(1),
            Err(KernelError::TimeOverflow {
                now: VirtualTime::MAX,
                delay: 1,
            })
        );
        assert!(env.timeout(0).is_ok());
    }

    #[test]
    fn test_zero_capacity_store() {
        let mut env = Environment::new();
        assert_eq!(env.store_with_capacity(0), Err(KernelError::InvalidCapacity));
        let s = env.store();
        env.put(s, Value::Int(1)).unwrap();
        assert_eq!(env.store_len(s).unwrap(), 1);
    }
}
