//! Mock sled motor.
//!
//! The motor publishes its output status on a `watch` channel so that the
//! plant simulator can move the sled while the output is enabled.

use super::{CommandLog, FailureInjector};
use crate::Result;
use crate::traits::SledMotor;
use crate::types::{ActuatorCommand, DutyCycle, MotorDirection};
use tokio::sync::watch;

/// Output status of the motor driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorStatus {
    pub direction: MotorDirection,
    pub duty: DutyCycle,
    pub enabled: bool,
}

impl MotorStatus {
    /// Output enabled with a non-zero duty.
    pub fn is_driving(&self) -> bool {
        self.enabled && self.duty.percent() > 0
    }
}

impl Default for MotorStatus {
    fn default() -> Self {
        Self {
            direction: MotorDirection::Reverse,
            duty: DutyCycle::OFF,
            enabled: false,
        }
    }
}

/// Mock sled motor.
///
/// # Examples
///
/// ```
/// use bikelocker_hardware::mock::MockMotor;
/// use bikelocker_hardware::traits::SledMotor;
/// use bikelocker_hardware::types::{DutyCycle, MotorDirection};
///
/// #[tokio::main]
/// async fn main() -> bikelocker_hardware::Result<()> {
///     let (mut motor, handle) = MockMotor::new();
///
///     motor.set_direction(MotorDirection::Forward).await?;
///     motor.set_duty(DutyCycle::STANDARD).await?;
///     motor.enable().await?;
///
///     assert!(handle.status().is_driving());
///     assert_eq!(handle.status().direction, MotorDirection::Forward);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockMotor {
    status: watch::Sender<MotorStatus>,
    log: CommandLog,
    failures: FailureInjector,
}

impl MockMotor {
    /// Create a mock motor with its own command log.
    pub fn new() -> (Self, MockMotorHandle) {
        Self::with_log(CommandLog::new())
    }

    /// Create a mock motor recording into a shared command log.
    pub fn with_log(log: CommandLog) -> (Self, MockMotorHandle) {
        let (status, status_rx) = watch::channel(MotorStatus::default());
        let failures = FailureInjector::default();

        let handle = MockMotorHandle {
            status: status_rx,
            log: log.clone(),
            failures: failures.clone(),
        };

        (
            Self {
                status,
                log,
                failures,
            },
            handle,
        )
    }

    fn apply(&mut self, command: ActuatorCommand) -> Result<()> {
        self.failures.check(&command.to_string())?;

        self.status.send_modify(|status| match command {
            ActuatorCommand::SetDirection(direction) => status.direction = direction,
            ActuatorCommand::SetDuty(duty) => status.duty = duty,
            ActuatorCommand::EnableMotor => status.enabled = true,
            ActuatorCommand::DisableMotor => status.enabled = false,
            _ => {}
        });
        self.log.record(command);
        Ok(())
    }
}

impl SledMotor for MockMotor {
    async fn set_direction(&mut self, direction: MotorDirection) -> Result<()> {
        self.apply(ActuatorCommand::SetDirection(direction))
    }

    async fn set_duty(&mut self, duty: DutyCycle) -> Result<()> {
        self.apply(ActuatorCommand::SetDuty(duty))
    }

    async fn enable(&mut self) -> Result<()> {
        self.apply(ActuatorCommand::EnableMotor)
    }

    async fn disable(&mut self) -> Result<()> {
        self.apply(ActuatorCommand::DisableMotor)
    }
}

/// Handle for observing and sabotaging a mock motor.
#[derive(Debug, Clone)]
pub struct MockMotorHandle {
    status: watch::Receiver<MotorStatus>,
    log: CommandLog,
    failures: FailureInjector,
}

impl MockMotorHandle {
    /// Current output status.
    pub fn status(&self) -> MotorStatus {
        *self.status.borrow()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<MotorStatus> {
        self.status.clone()
    }

    /// Commands received so far.
    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.log.snapshot()
    }

    /// Fail the next `count` commands.
    pub fn fail_next(&self, count: u32) {
        self.failures.arm(count);
    }

    /// Fail every command until [`recover`](Self::recover) is called.
    pub fn fail_always(&self) {
        self.failures.arm_always();
    }

    pub fn recover(&self) {
        self.failures.disarm();
    }
}
