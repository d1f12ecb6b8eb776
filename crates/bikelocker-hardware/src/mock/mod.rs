//! Mock device implementations for testing and development.
//!
//! Every mock comes as a `(device, handle)` pair: the device is handed to the
//! controller, the handle stays with the test (or the simulator) to observe
//! commands, inject failures and drive inputs.

pub mod led_ring;
pub mod locker;
pub mod motor;
pub mod nfc;
pub mod plant;
pub mod solenoid;
pub mod switches;

// Re-export commonly used types
pub use led_ring::{LedStatus, MockLedRing, MockLedRingHandle};
pub use locker::{MockLocker, MockLockerHandles};
pub use motor::{MockMotor, MockMotorHandle, MotorStatus};
pub use nfc::{MockNfcReader, MockNfcReaderHandle};
pub use plant::{PlantHandle, PlantSimulator};
pub use solenoid::{MockSolenoid, MockSolenoidHandle, SolenoidStatus};
pub use switches::{MockSwitchBank, MockSwitchBankHandle};

use crate::types::ActuatorCommand;
use crate::{HardwareError, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Ordered record of the commands received by one or more mock actuators.
///
/// Share one log between the motor, solenoid and LED ring to assert on the
/// interleaving of a whole transition.
///
/// ```
/// use bikelocker_hardware::mock::CommandLog;
/// use bikelocker_hardware::types::ActuatorCommand;
///
/// let log = CommandLog::new();
/// log.record(ActuatorCommand::UnlockDoor);
/// log.record(ActuatorCommand::LockDoor);
/// assert_eq!(log.take(), vec![ActuatorCommand::UnlockDoor, ActuatorCommand::LockDoor]);
/// assert!(log.snapshot().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    entries: Arc<Mutex<Vec<ActuatorCommand>>>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, command: ActuatorCommand) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(command);
    }

    /// Copy of the commands recorded so far.
    pub fn snapshot(&self) -> Vec<ActuatorCommand> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Drain the recorded commands.
    pub fn take(&self) -> Vec<ActuatorCommand> {
        std::mem::take(
            &mut *self
                .entries
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

/// Failure budget shared between a mock device and its handle.
#[derive(Debug, Clone, Default)]
pub(crate) struct FailureInjector {
    remaining: Arc<AtomicU32>,
}

impl FailureInjector {
    const ALWAYS: u32 = u32::MAX;

    /// Fail the next `count` operations.
    pub(crate) fn arm(&self, count: u32) {
        self.remaining.store(count, Ordering::SeqCst);
    }

    /// Fail every operation until disarmed.
    pub(crate) fn arm_always(&self) {
        self.remaining.store(Self::ALWAYS, Ordering::SeqCst);
    }

    pub(crate) fn disarm(&self) {
        self.remaining.store(0, Ordering::SeqCst);
    }

    /// Consume one failure if armed.
    pub(crate) fn check(&self, operation: &str) -> Result<()> {
        let fired = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                Self::ALWAYS => Some(n),
                n => Some(n - 1),
            })
            .is_ok();

        if fired {
            Err(HardwareError::injected(operation))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_injector_counts_down() {
        let injector = FailureInjector::default();
        assert!(injector.check("op").is_ok());

        injector.arm(2);
        assert!(injector.check("op").is_err());
        assert!(injector.check("op").is_err());
        assert!(injector.check("op").is_ok());
    }

    #[test]
    fn test_failure_injector_always() {
        let injector = FailureInjector::default();
        injector.arm_always();
        for _ in 0..10 {
            assert!(injector.check("op").is_err());
        }
        injector.disarm();
        assert!(injector.check("op").is_ok());
    }

    #[test]
    fn test_command_log_shared_between_clones() {
        let log = CommandLog::new();
        let clone = log.clone();
        clone.record(ActuatorCommand::EnableMotor);
        assert_eq!(log.snapshot(), vec![ActuatorCommand::EnableMotor]);
    }
}
