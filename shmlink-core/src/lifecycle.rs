// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Segment lifecycle with typed state transitions.
//!
//! Implements the per-instance lifecycle:
//! Uninitialized → Constructing → Ready → Destroying → Destroyed.
//! A failed construction goes straight from Constructing to Destroyed.
//! Invalid transitions result in StateTransitionError.

use std::fmt;

use crate::error::StateTransitionError;

/// Role an instance plays for its segment. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Allocates the segment and the signal, and destroys both on teardown.
    Create,
    /// Maps an existing segment and only detaches on teardown.
    Attach,
}

impl Mode {
    /// Role name used in log lines and error messages.
    pub const fn role(&self) -> &'static str {
        match self {
            Self::Create => "creator",
            Self::Attach => "attacher",
        }
    }

    /// Whether this role owns the shared state.
    pub const fn is_creator(&self) -> bool {
        matches!(self, Self::Create)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.role())
    }
}

/// Segment lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// Nothing acquired yet.
    Uninitialized,

    /// Platform resources are being acquired.
    Constructing,

    /// Mapped and signalled; `write`/`read` are valid.
    Ready,

    /// Teardown in progress.
    Destroying,

    /// Everything released. Terminal.
    Destroyed,
}

impl SegmentState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::Constructing => "Constructing",
            Self::Ready => "Ready",
            Self::Destroying => "Destroying",
            Self::Destroyed => "Destroyed",
        }
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: SegmentState) -> bool {
        matches!(
            (self, target),
            (Self::Uninitialized, Self::Constructing) |
            // Construction either completes or unwinds
            (Self::Constructing, Self::Ready) |
            (Self::Constructing, Self::Destroyed) |
            (Self::Ready, Self::Destroying) |
            (Self::Destroying, Self::Destroyed)
        )
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Destroyed)
    }
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State machine for one segment instance.
#[derive(Debug)]
pub struct SegmentLifecycle {
    mode: Mode,
    current_state: SegmentState,
}

impl SegmentLifecycle {
    /// Create a new lifecycle in the Uninitialized state.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            current_state: SegmentState::Uninitialized,
        }
    }

    /// Get the current state.
    pub fn state(&self) -> SegmentState {
        self.current_state
    }

    /// Get the role this lifecycle belongs to.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: SegmentState) -> Result<(), StateTransitionError> {
        if self.current_state.is_terminal() {
            return Err(StateTransitionError::TerminalState {
                role: self.mode,
                state: self.current_state.name(),
            });
        }

        if !self.current_state.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                role: self.mode,
                from: self.current_state.name(),
                to: target.name(),
            });
        }

        tracing::debug!(
            role = self.mode.role(),
            from = self.current_state.name(),
            to = target.name(),
            "Segment state transition"
        );

        self.current_state = target;

        Ok(())
    }

    /// Check if `write`/`read` may run.
    pub fn is_ready(&self) -> bool {
        matches!(self.current_state, SegmentState::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let lifecycle = SegmentLifecycle::new(Mode::Create);
        assert_eq!(lifecycle.state(), SegmentState::Uninitialized);
        assert!(!lifecycle.is_ready());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut lifecycle = SegmentLifecycle::new(Mode::Attach);

        assert!(lifecycle.transition_to(SegmentState::Constructing).is_ok());
        assert!(lifecycle.transition_to(SegmentState::Ready).is_ok());
        assert!(lifecycle.is_ready());
        assert!(lifecycle.transition_to(SegmentState::Destroying).is_ok());
        assert!(!lifecycle.is_ready());
        assert!(lifecycle.transition_to(SegmentState::Destroyed).is_ok());
        assert_eq!(lifecycle.state(), SegmentState::Destroyed);
    }

    #[test]
    fn test_failed_construction_unwinds() {
        let mut lifecycle = SegmentLifecycle::new(Mode::Create);
        lifecycle.transition_to(SegmentState::Constructing).unwrap();
        assert!(lifecycle.transition_to(SegmentState::Destroyed).is_ok());
        assert!(lifecycle.state().is_terminal());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut lifecycle = SegmentLifecycle::new(Mode::Create);

        // Uninitialized → Ready skips construction
        assert!(lifecycle.transition_to(SegmentState::Ready).is_err());
        assert_eq!(lifecycle.state(), SegmentState::Uninitialized);
    }

    #[test]
    fn test_no_way_back_from_destroyed() {
        let mut lifecycle = SegmentLifecycle::new(Mode::Create);
        lifecycle.transition_to(SegmentState::Constructing).unwrap();
        lifecycle.transition_to(SegmentState::Destroyed).unwrap();

        let err = lifecycle
            .transition_to(SegmentState::Constructing)
            .unwrap_err();
        assert!(matches!(err, StateTransitionError::TerminalState { .. }));
    }

    #[test]
    fn test_role_names() {
        assert_eq!(Mode::Create.to_string(), "creator");
        assert_eq!(Mode::Attach.to_string(), "attacher");
        assert!(Mode::Create.is_creator());
        assert!(!Mode::Attach.is_creator());
    }
}
