//! Session lifecycle state machine
//!
//! `Uninitialized -> Created -> Running <-> Paused -> ShuttingDown -> Uninitialized`

use crate::error::SessionError;
use std::fmt;

/// Lifecycle state of an emulation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No core handle exists
    #[default]
    Uninitialized,
    /// Core created, not yet producing frames
    Created,
    /// Frame schedule armed
    Running,
    /// Frame schedule cancelled, buffers kept
    Paused,
    /// Shutdown sequence in progress
    ShuttingDown,
}

impl SessionState {
    /// Whether a core handle is alive in this state
    pub fn is_alive(&self) -> bool {
        !matches!(self, SessionState::Uninitialized)
    }

    /// Whether the session has been started and not yet torn down
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Running | SessionState::Paused)
    }

    /// Check that the current state is one of `allowed` for `operation`
    pub fn require(
        self,
        operation: &'static str,
        allowed: &[SessionState],
    ) -> Result<(), SessionError> {
        if allowed.contains(&self) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self,
            })
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::ShuttingDown => write!(f, "shutting down"),
        }
    }
}
