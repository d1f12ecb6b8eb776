//! Error types for the locker controller.

use bikelocker_core::{LockerState, SwitchId};
use bikelocker_hardware::HardwareError;
use std::time::Duration;

/// Why an interlock wait ended without observing the expected level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterlockError {
    #[error("{switch} did not read {expected} within {waited:?}")]
    Timeout {
        switch: SwitchId,
        expected: bool,
        waited: Duration,
    },

    #[error("Interlock wait cancelled")]
    Cancelled,
}

/// Tag registry conflicts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Locker already registered to tag {current}")]
    AlreadyOccupied { current: String },
}

/// Errors raised while dispatching events or running transitions.
#[derive(Debug, thiserror::Error)]
pub enum StateMachineError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: LockerState, to: LockerState },

    #[error("No fault to clear, locker is {state}")]
    NotFaulted { state: LockerState },

    #[error("Interlock failed: {0}")]
    Interlock(#[from] InterlockError),

    #[error("Actuator failed: {0}")]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl StateMachineError {
    /// Create a new invalid transition error.
    pub fn invalid_transition(from: LockerState, to: LockerState) -> Self {
        Self::InvalidTransition { from, to }
    }

    /// Whether the error came from the shutdown token rather than the plant.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Interlock(InterlockError::Cancelled))
    }
}

/// Errors from controller wiring and the command path.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("No {0} registered")]
    MissingDevice(&'static str),

    #[error("Invalid configuration: {0}")]
    Config(#[from] bikelocker_core::Error),

    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),

    #[error("Session driver is not running")]
    SessionStopped,

    #[error("Controller task failed: {0}")]
    TaskFailed(String),
}

/// Result type alias for state machine operations.
pub type Result<T> = std::result::Result<T, StateMachineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interlock_timeout_message() {
        let error = InterlockError::Timeout {
            switch: SwitchId::Lim4,
            expected: false,
            waited: Duration::from_secs(30),
        };
        assert_eq!(error.to_string(), "LIM4 did not read false within 30s");
    }

    #[test]
    fn test_cancelled_detection() {
        let error = StateMachineError::from(InterlockError::Cancelled);
        assert!(error.is_cancelled());

        let error = StateMachineError::from(HardwareError::injected("enable motor"));
        assert!(!error.is_cancelled());
    }

    #[test]
    fn test_invalid_transition_message() {
        let error = StateMachineError::invalid_transition(LockerState::Vacant, LockerState::Loading);
        assert_eq!(
            error.to_string(),
            "Invalid transition from Vacant to Loading"
        );
    }
}
