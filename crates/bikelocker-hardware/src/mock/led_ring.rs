//! Mock LED ring.

use super::{CommandLog, FailureInjector};
use crate::Result;
use crate::traits::LedRing;
use crate::types::{ActuatorCommand, LedColor, LedPattern};
use tokio::sync::watch;

/// What the ring is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedStatus {
    #[default]
    Off,
    Solid(LedColor),
    Pattern(LedPattern),
}

/// Mock LED ring.
#[derive(Debug)]
pub struct MockLedRing {
    status: watch::Sender<LedStatus>,
    log: CommandLog,
    failures: FailureInjector,
}

impl MockLedRing {
    pub fn new() -> (Self, MockLedRingHandle) {
        Self::with_log(CommandLog::new())
    }

    pub fn with_log(log: CommandLog) -> (Self, MockLedRingHandle) {
        let (status, status_rx) = watch::channel(LedStatus::Off);
        let failures = FailureInjector::default();

        let handle = MockLedRingHandle {
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

    fn apply(&mut self, command: ActuatorCommand, next: LedStatus) -> Result<()> {
        self.failures.check(&command.to_string())?;
        self.status.send_replace(next);
        self.log.record(command);
        Ok(())
    }
}

impl LedRing for MockLedRing {
    async fn start_pattern(&mut self, pattern: LedPattern) -> Result<()> {
        self.apply(
            ActuatorCommand::StartPattern(pattern),
            LedStatus::Pattern(pattern),
        )
    }

    async fn stop_pattern(&mut self) -> Result<()> {
        self.apply(ActuatorCommand::StopPattern, LedStatus::Off)
    }

    async fn set_solid(&mut self, color: LedColor) -> Result<()> {
        let next = match color {
            LedColor::Off => LedStatus::Off,
            color => LedStatus::Solid(color),
        };
        self.apply(ActuatorCommand::SetSolid(color), next)
    }
}

/// Handle for observing and sabotaging a mock LED ring.
#[derive(Debug, Clone)]
pub struct MockLedRingHandle {
    status: watch::Receiver<LedStatus>,
    log: CommandLog,
    failures: FailureInjector,
}

impl MockLedRingHandle {
    pub fn status(&self) -> LedStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LedStatus> {
        self.status.clone()
    }

    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.log.snapshot()
    }

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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_led_ring_pattern_and_solid() {
        let (mut ring, handle) = MockLedRing::new();
        assert_eq!(handle.status(), LedStatus::Off);

        ring.set_solid(LedColor::White).await.unwrap();
        assert_eq!(handle.status(), LedStatus::Solid(LedColor::White));

        ring.start_pattern(LedPattern::RainbowChase).await.unwrap();
        assert_eq!(
            handle.status(),
            LedStatus::Pattern(LedPattern::RainbowChase)
        );

        ring.stop_pattern().await.unwrap();
        assert_eq!(handle.status(), LedStatus::Off);
    }

    #[tokio::test]
    async fn test_solid_off_blanks_ring() {
        let (mut ring, handle) = MockLedRing::new();
        ring.set_solid(LedColor::Red).await.unwrap();
        ring.set_solid(LedColor::Off).await.unwrap();
        assert_eq!(handle.status(), LedStatus::Off);
    }

    #[tokio::test]
    async fn test_mock_led_ring_failure() {
        let (mut ring, handle) = MockLedRing::new();
        handle.fail_next(1);
        assert!(ring.start_pattern(LedPattern::RainbowChase).await.is_err());
        assert_eq!(handle.status(), LedStatus::Off);
    }
}
