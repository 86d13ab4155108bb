//! Per-environment configuration.

use crate::time::VirtualTime;

/// What the kernel does when a failed process's completion event fires
/// and nothing is waiting on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum FailurePolicy {
    /// Log a warning and keep running. Only the failed process is affected.
    #[default]
    Contain,
    /// Stop the run: `step`/`run` return `KernelError::ProcessFailure`.
    /// A completion event the host is blocked on in `run_until_event`
    /// counts as awaited.
    Abort,
}

/// Settings fixed when an environment is created.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EnvironmentConfig {
    /// Clock value the simulation starts at.
    pub initial_time: VirtualTime,
    /// Host policy for failures nobody awaits.
    pub failure_policy: FailurePolicy,
    /// Record fired events and process transitions in an [`EventLog`](crate::eventlog::EventLog).
    pub record_log: bool,
}

impl EnvironmentConfig {
    /// Configuration matching a host that treats any unobserved process
    /// failure as fatal to the whole run.
    pub fn strict() -> Self {
        EnvironmentConfig {
            failure_policy: FailurePolicy::Abort,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EnvironmentConfig::default();
        assert_eq!(cfg.initial_time, VirtualTime::ZERO);
        assert_eq!(cfg.failure_policy, FailurePolicy::Contain);
        assert!(!cfg.record_log);
    }

    #[test]
    fn test_strict() {
        assert_eq!(EnvironmentConfig::strict().failure_policy, FailurePolicy::Abort);
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn test_config_json() {
        let cfg = EnvironmentConfig {
            initial_time: VirtualTime::new(8),
            failure_policy: FailurePolicy::Abort,
            record_log: true,
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EnvironmentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
