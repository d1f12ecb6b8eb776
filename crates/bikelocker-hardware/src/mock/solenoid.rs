//! Mock door solenoid.

use super::{CommandLog, FailureInjector};
use crate::Result;
use crate::traits::DoorSolenoid;
use crate::types::ActuatorCommand;
use tokio::sync::watch;

/// Bolt position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolenoidStatus {
    #[default]
    Locked,
    Unlocked,
}

/// Mock door solenoid.
#[derive(Debug)]
pub struct MockSolenoid {
    status: watch::Sender<SolenoidStatus>,
    log: CommandLog,
    failures: FailureInjector,
}

impl MockSolenoid {
    /// Create a locked solenoid with its own command log.
    pub fn new() -> (Self, MockSolenoidHandle) {
        Self::with_log(CommandLog::new())
    }

    /// Create a locked solenoid recording into a shared command log.
    pub fn with_log(log: CommandLog) -> (Self, MockSolenoidHandle) {
        let (status, status_rx) = watch::channel(SolenoidStatus::Locked);
        let failures = FailureInjector::default();

        let handle = MockSolenoidHandle {
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

    fn apply(&mut self, command: ActuatorCommand, next: SolenoidStatus) -> Result<()> {
        self.failures.check(&command.to_string())?;
        self.status.send_replace(next);
        self.log.record(command);
        Ok(())
    }
}

impl DoorSolenoid for MockSolenoid {
    async fn lock(&mut self) -> Result<()> {
        self.apply(ActuatorCommand::LockDoor, SolenoidStatus::Locked)
    }

    async fn unlock(&mut self) -> Result<()> {
        self.apply(ActuatorCommand::UnlockDoor, SolenoidStatus::Unlocked)
    }
}

/// Handle for observing and sabotaging a mock solenoid.
#[derive(Debug, Clone)]
pub struct MockSolenoidHandle {
    status: watch::Receiver<SolenoidStatus>,
    log: CommandLog,
    failures: FailureInjector,
}

impl MockSolenoidHandle {
    pub fn status(&self) -> SolenoidStatus {
        *self.status.borrow()
    }

    pub fn is_locked(&self) -> bool {
        self.status() == SolenoidStatus::Locked
    }

    pub fn subscribe(&self) -> watch::Receiver<SolenoidStatus> {
        self.status.clone()
    }

    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.log.snapshot()
    }

    /// Fail the next `count` commands.
    pub fn fail_next(&self, count: u32) {
        self.failures.arm(count);
    }

    pub fn fail_always(&self) {
        self.failures.arm_always();
    }

    pub fn recover(&self) {
        self.failures.disarm();
    }
}
