//! Payloads carried by events, store items, interrupts and process results.

use crate::event::EventId;

/// A value produced by an event or returned by a process.
///
/// The kernel never inspects values; they are handed back verbatim to
/// whoever awaits the event that carries them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// No payload (plain timeouts, accepted puts, unit results).
    #[default]
    Unit,
    /// A signed integer.
    Int(i64),
    /// Human-readable text (convenient for examples and tests).
    Text(String),
    /// Raw bytes.
    Data(Vec<u8>),
    /// Fired sub-events of a condition, in declaration order.
    Events(Vec<(EventId, Value)>),
}

impl Value {
    /// Shorthand for `Value::Text`.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Returns the integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value a condition recorded for `event`, if it fired.
    pub fn get(&self, event: EventId) -> Option<&Value> {
        match self {
            Value::Events(fired) => fired.iter().find(|(id, _)| *id == event).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Whether a condition value includes `event`.
    pub fn contains(&self, event: EventId) -> bool {
        self.get(event).is_some()
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Text(s) => {
                if s.chars().count() > 32 {
                    let head: String = s.chars().take(32).collect();
                    write!(f, "{:?}…", head)
                } else {
                    write!(f, "{:?}", s)
                }
            }
            Value::Data(d) => write!(f, "Data({} bytes)", d.len()),
            Value::Events(fired) => write!(f, "Events({} fired)", fired.len()),
        }
    }
}
