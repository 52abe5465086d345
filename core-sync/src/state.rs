//! # Refresh State Machine
//!
//! ```text
//! Idle → Refreshing → Idle
//!            ↓
//!        Cancelled → Idle
//!            ↓
//!        Refreshing        (replacement started before the old pass drained)
//! ```

use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshState {
    #[default]
    Idle,
    Refreshing,
    Cancelled,
}

impl RefreshState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshState::Idle => "idle",
            RefreshState::Refreshing => "refreshing",
            RefreshState::Cancelled => "cancelled",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RefreshState::Refreshing)
    }

    fn can_transition_to(&self, next: RefreshState) -> bool {
        use RefreshState::*;
        matches!(
            (self, next),
            (Idle, Refreshing)
                | (Refreshing, Idle)
                | (Refreshing, Cancelled)
                | (Cancelled, Idle)
                | (Cancelled, Refreshing)
        )
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidStateTransition`] when the move is not allowed.
    pub fn transition(self, next: RefreshState) -> Result<RefreshState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SyncError::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
                reason: format!("cannot move from {self} to {next}"),
            })
        }
    }
}

impl fmt::Display for RefreshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_cycle() {
        let state = RefreshState::default();
        let state = state.transition(RefreshState::Refreshing).unwrap();
        assert!(state.is_active());
        let state = state.transition(RefreshState::Idle).unwrap();
        assert_eq!(state, RefreshState::Idle);
    }

    #[test]
    fn test_preemption_cycle() {
        let state = RefreshState::Refreshing
            .transition(RefreshState::Cancelled)
            .unwrap();
        assert_eq!(
            state.transition(RefreshState::Refreshing).unwrap(),
            RefreshState::Refreshing
        );
        assert_eq!(state.transition(RefreshState::Idle).unwrap(), RefreshState::Idle);
    }

    #[test]
    fn test_invalid_transitions() {
        for (from, to) in [
            (RefreshState::Idle, RefreshState::Cancelled),
            (RefreshState::Idle, RefreshState::Idle),
            (RefreshState::Refreshing, RefreshState::Refreshing),
            (RefreshState::Cancelled, RefreshState::Cancelled),
        ] {
            let err = from.transition(to).unwrap_err();
            assert!(matches!(err, SyncError::InvalidStateTransition { .. }));
        }
    }

    #[test]
    fn test_serialization() {
        assert_eq!(
            serde_json::to_string(&RefreshState::Refreshing).unwrap(),
            "\"refreshing\""
        );
    }
}
