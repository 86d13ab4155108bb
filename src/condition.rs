//! `any_of` / `all_of` composite events.
//!
//! A condition is an ordinary event that fires once enough of its
//! sub-events have fired. Its value is a `Value::Events` listing the
//! sub-events that had fired at that moment, in declaration order, with
//! their values. If a fired sub-event failed, the condition fails with the
//! same cause.

use tracing::debug;

use crate::error::{KernelResult, Outcome};
use crate::event::{Callback, EventId, EventKind};
use crate::simulation::Kernel;
use crate::value::Value;

/// How many sub-events a condition needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ConditionKind {
    /// Fires as soon as one sub-event has fired.
    Any,
    /// Fires once every sub-event has fired.
    All,
}

/// An unresolved condition, keyed in the kernel by its own event.
#[derive(Debug, Clone)]
pub(crate) struct Condition {
    pub(crate) kind: ConditionKind,
    pub(crate) events: Vec<EventId>,
}

impl Kernel {
    /// Create a condition over `events`. An empty list fires at once.
    pub(crate) fn condition(
        &mut self,
        kind: ConditionKind,
        events: &[EventId],
    ) -> KernelResult<EventId> {
        for &event in events {
            self.event_mut(event)?;
        }

        let id = self.new_event(EventKind::Condition);
        for &event in events {
            self.event_mut(event)?.callbacks.push(Callback::Condition(id));
        }
        self.conditions.insert(
            id,
            Condition {
                kind,
                events: events.to_vec(),
            },
        );
        debug!(condition = %id, ?kind, count = events.len(), "condition created");

        // Some sub-events may have fired already.
        self.check_condition(id);
        Ok(id)
    }

    /// Re-evaluate a condition after one of its sub-events fired.
    pub(crate) fn check_condition(&mut self, id: EventId) {
        let Some(cond) = self.conditions.get(&id) else {
            return;
        };

        let mut fired = Vec::new();
        let mut failure = None;
        for &event in &cond.events {
            let Some(rec) = self.events.get(&event) else {
                continue;
            };
            if !rec.has_fired() {
                continue;
            }
            match &rec.outcome {
                Some(Err(f)) if failure.is_none() => failure = Some(f.clone()),
                Some(Ok(value)) => fired.push((event, value.clone())),
                _ => {}
            }
        }

        let outcome: Outcome = match (failure, cond.kind) {
            (Some(f), _) => Err(f),
            (None, ConditionKind::Any) if !fired.is_empty() || cond.events.is_empty() => {
                Ok(Value::Events(fired))
            }
            (None, ConditionKind::All) if fired.len() == cond.events.len() => {
                Ok(Value::Events(fired))
            }
            _ => return,
        };

        let Some(cond) = self.conditions.remove(&id) else {
            return;
        };
        for event in &cond.events {
            if let Some(rec) = self.events.get_mut(event) {
                rec.callbacks.retain(|cb| *cb != Callback::Condition(id));
            }
        }
        debug!(condition = %id, ok = outcome.is_ok(), "condition resolved");
        self.queue_now(id, outcome);
    }
}
