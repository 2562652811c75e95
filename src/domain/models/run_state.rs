//! Lifecycle of a single test execution.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a test run.
///
/// A run moves `NotStarted -> Running` and then reaches exactly one terminal
/// state. `Verifying` is entered once the job has finished (naturally or because
/// every trigger fired) and the verdicts are being computed; the watchdog can no
/// longer win from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    NotStarted,
    Running,
    Verifying,
    Completed,
    Failed,
    TimedOut,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Verifying => "verifying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> Vec<RunState> {
        match self {
            Self::NotStarted => vec![Self::Running],
            Self::Running => vec![Self::Verifying, Self::Failed, Self::TimedOut],
            Self::Verifying => vec![Self::Completed, Self::Failed],
            Self::Completed | Self::Failed | Self::TimedOut => vec![],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_have_no_exits() {
        for state in [RunState::Completed, RunState::Failed, RunState::TimedOut] {
            assert!(state.is_terminal());
            assert!(state.valid_transitions().is_empty());
        }
    }

    #[test]
    fn test_timeout_only_reachable_from_running() {
        assert!(RunState::Running.can_transition_to(RunState::TimedOut));
        assert!(!RunState::Verifying.can_transition_to(RunState::TimedOut));
        assert!(!RunState::NotStarted.can_transition_to(RunState::TimedOut));
    }

    #[test]
    fn test_completion_requires_verification() {
        assert!(!RunState::Running.can_transition_to(RunState::Completed));
        assert!(RunState::Verifying.can_transition_to(RunState::Completed));
    }

    #[test]
    fn test_runs_start_not_started() {
        assert_eq!(RunState::default(), RunState::NotStarted);
        assert!(!RunState::default().is_terminal());
    }

    #[test]
    fn test_display_matches_serde_name() {
        let json = serde_json::to_string(&RunState::TimedOut).unwrap();
        assert_eq!(json, format!("\"{}\"", RunState::TimedOut));
    }
}
