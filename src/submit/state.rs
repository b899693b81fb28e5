//! Submission lifecycle
//!
//! Created → ResourcesAcquired → Staged → Submitted → {Accepted, Running} →
//! {Finished, Failed, Killed}

use serde::{Deserialize, Serialize};
use xlaunch_protocol::ops::ApplicationState;

/// Where one submission stands, from the launcher's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    /// Nothing requested from the cluster yet
    Created,
    /// Application id and cluster capability obtained
    ResourcesAcquired,
    /// Validated and staged
    Staged,
    /// Handed to the resource manager, not yet scheduled
    Submitted,
    Accepted,
    Running,
    Finished,
    Failed,
    Killed,
}

impl SubmissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::Finished | SubmissionState::Failed | SubmissionState::Killed
        )
    }

    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: SubmissionState) -> bool {
        use SubmissionState::*;
        match (self, target) {
            (Created, ResourcesAcquired) => true,
            (ResourcesAcquired, Staged) => true,
            (Staged, Submitted) => true,

            // Polling drives the rest; the RM may skip states between polls
            (Submitted, Accepted | Running | Finished | Failed | Killed) => true,
            (Accepted, Running | Finished | Failed | Killed) => true,
            (Running, Finished | Failed | Killed) => true,
            // A new coordinator attempt goes back through ACCEPTED
            (Running, Accepted) => true,

            _ => false,
        }
    }

    /// Launcher state for a state reported by the resource manager.
    pub fn from_reported(state: ApplicationState) -> SubmissionState {
        match state {
            ApplicationState::New | ApplicationState::NewSaving | ApplicationState::Submitted => {
                SubmissionState::Submitted
            }
            ApplicationState::Accepted => SubmissionState::Accepted,
            ApplicationState::Running => SubmissionState::Running,
            ApplicationState::Finished => SubmissionState::Finished,
            ApplicationState::Failed => SubmissionState::Failed,
            ApplicationState::Killed => SubmissionState::Killed,
        }
    }
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubmissionState::Created => "CREATED",
            SubmissionState::ResourcesAcquired => "RESOURCES_ACQUIRED",
            SubmissionState::Staged => "STAGED",
            SubmissionState::Submitted => "SUBMITTED",
            SubmissionState::Accepted => "ACCEPTED",
            SubmissionState::Running => "RUNNING",
            SubmissionState::Finished => "FINISHED",
            SubmissionState::Failed => "FAILED",
            SubmissionState::Killed => "KILLED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: SubmissionState,
        to: SubmissionState,
    },
}

/// Current state plus the path that led to it.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: SubmissionState,
    history: Vec<SubmissionState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: SubmissionState::Created,
            history: vec![SubmissionState::Created],
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn history(&self) -> &[SubmissionState] {
        &self.history
    }

    /// Transition to a new state
    pub fn transition(&mut self, to: SubmissionState) -> Result<(), StateError> {
        if !self.state.can_transition_to(to) {
            return Err(StateError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Fold in a state reported by the resource manager.
    ///
    /// Returns whether the launcher state changed. Repeating the current
    /// state is a no-op.
    pub fn observe(&mut self, reported: ApplicationState) -> Result<bool, StateError> {
        let next = SubmissionState::from_reported(reported);
        if next == self.state {
            return Ok(false);
        }
        self.transition(next)?;
        Ok(true)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
