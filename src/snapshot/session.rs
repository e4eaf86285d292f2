//! Clone session lifecycle
//!
//! ```text
//! None -> Creating -> Established -> Linking -> Linked <-> Copying
//!                          |                      |          |
//!                          v                      v          v
//!                      Restoring -> None      Unlinking -> None
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// State of a snapshot with respect to one clone session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    None,
    Creating,
    Established,
    Linking,
    Linked,
    Copying,
    Restoring,
    Unlinking,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (None, Creating)
                | (Creating, Established)
                | (Established, Linking)
                | (Established, Restoring)
                | (Linking, Linked)
                | (Linked, Copying)
                | (Copying, Linked)
                | (Linked, Unlinking)
                | (Copying, Unlinking)
                | (Unlinking, None)
                | (Restoring, None)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::None => "NONE",
            SessionState::Creating => "CREATING",
            SessionState::Established => "ESTABLISHED",
            SessionState::Linking => "LINKING",
            SessionState::Linked => "LINKED",
            SessionState::Copying => "COPYING",
            SessionState::Restoring => "RESTORING",
            SessionState::Unlinking => "UNLINKING",
        };
        write!(f, "{}", name)
    }
}

/// Tracks the states one engine operation moved through
#[derive(Debug, Clone)]
pub struct Session {
    trail: Vec<SessionState>,
}

impl Session {
    pub fn starting_at(state: SessionState) -> Self {
        Self { trail: vec![state] }
    }

    pub fn state(&self) -> SessionState {
        // trail is never empty
        self.trail[self.trail.len() - 1]
    }

    pub fn advance(&mut self, next: SessionState) -> Result<()> {
        let current = self.state();
        if !current.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        debug!("session: {} -> {}", current, next);
        self.trail.push(next);
        Ok(())
    }

    pub fn into_trail(self) -> Vec<SessionState> {
        self.trail
    }
}
