//! Session state machine
//!
//! ```text
//! Created -> Validating -> Parsing -> Estimating -> Generating -> Recording -> Succeeded
//!    \___________\____________\__________\______________\____________\-----> Failed
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of a session run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Created,
    Validating,
    Parsing,
    Estimating,
    Generating,
    Recording,
    Succeeded,
    Failed,
}

impl SessionState {
    /// Display name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Validating => "Validating",
            Self::Parsing => "Parsing",
            Self::Estimating => "Estimating",
            Self::Generating => "Generating",
            Self::Recording => "Recording",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// The state that follows this one on the success path
    pub fn next(&self) -> Option<SessionState> {
        match self {
            Self::Created => Some(Self::Validating),
            Self::Validating => Some(Self::Parsing),
            Self::Parsing => Some(Self::Estimating),
            Self::Estimating => Some(Self::Generating),
            Self::Generating => Some(Self::Recording),
            Self::Recording => Some(Self::Succeeded),
            Self::Succeeded | Self::Failed => None,
        }
    }

    /// Whether `self -> to` is a legal transition
    ///
    /// # Examples
    ///
    /// ```
    /// use notetion::workflow::SessionState;
    ///
    /// assert!(SessionState::Parsing.can_transition_to(SessionState::Estimating));
    /// assert!(SessionState::Parsing.can_transition_to(SessionState::Failed));
    /// assert!(!SessionState::Parsing.can_transition_to(SessionState::Generating));
    /// assert!(!SessionState::Succeeded.can_transition_to(SessionState::Failed));
    /// ```
    pub fn can_transition_to(&self, to: SessionState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Failed || self.next() == Some(to)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus the ordered history of visited states
#[derive(Debug, Clone)]
pub struct StateMachine {
    session_id: String,
    history: Vec<SessionState>,
}

impl StateMachine {
    /// A machine in `Created`
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            history: vec![SessionState::Created],
        }
    }

    /// Current state
    pub fn current(&self) -> SessionState {
        self.history
            .last()
            .copied()
            .unwrap_or(SessionState::Created)
    }

    /// All visited states, oldest first
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Moves to `to`
    ///
    /// # Errors
    ///
    /// Returns error on an illegal transition; the state is unchanged.
    pub fn transition(&mut self, to: SessionState) -> crate::error::Result<()> {
        let from = self.current();
        if !from.can_transition_to(to) {
            anyhow::bail!(
                "Illegal session transition {} -> {} for session {}",
                from,
                to,
                self.session_id
            );
        }
        tracing::info!("Session {}: {} -> {}", self.session_id, from, to);
        self.history.push(to);
        Ok(())
    }

    /// Moves to `Failed` unless already terminal
    pub fn fail(&mut self) {
        if !self.current().is_terminal() {
            tracing::info!(
                "Session {}: {} -> {}",
                self.session_id,
                self.current(),
                SessionState::Failed
            );
            self.history.push(SessionState::Failed);
        }
    }
}
