//! Controller assembly.
//!
//! [`LockerController`] collects the devices for one bay, then
//! [`start`](LockerController::start) wires them together and spawns the two
//! long-running tasks:
//!
//! ```text
//! ┌──────────────┐ edges  ┌─────────────────┐ levels ┌───────────────────┐
//! │ Switch bank  │───────►│ Monitor task    │◄───────│                   │
//! └──────────────┘        └─────────────────┘        │ Session driver    │
//! ┌──────────────┐ poll                              │  └ state machine  │──► actuators
//! │ NFC reader   │◄──────────────────────────────────│                   │
//! └──────────────┘                                   └───────────────────┘
//!                                                             ▲
//!                          ControllerHandle ── commands ──────┘
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use bikelocker_controller::LockerController;
//! use bikelocker_core::LockerConfig;
//! use bikelocker_hardware::mock::MockLocker;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), bikelocker_controller::ControllerError> {
//! let bay = MockLocker::docked(Duration::from_millis(110));
//! let mut controller = LockerController::new(LockerConfig::default());
//! controller.register_motor(bay.motor);
//! controller.register_solenoid(bay.solenoid);
//! controller.register_led_ring(bay.led_ring);
//! controller.register_nfc(bay.nfc);
//! controller.register_switches(bay.switches);
//!
//! let handle = controller.start().await?;
//! println!("{}", handle.status().await?);
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::ControllerError;
use crate::monitor::{LimitSwitchMonitor, LimitSwitchMonitorHandle};
use crate::session::{CommandReply, SessionCommand, SessionDriver, SessionExit, SessionHandle};
use crate::state_machine::{
    Actuators, DispatchOutcome, LockerSignal, LockerStateMachine, LockerStatus,
};
use bikelocker_core::{LockerConfig, LockerState};
use bikelocker_hardware::{
    AnyLedRing, AnyMotor, AnyNfcReader, AnySolenoid, AnySwitchBank, LedColor, LedRing,
};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Devices and configuration for one locker bay, before start.
#[derive(Debug)]
pub struct LockerController {
    config: LockerConfig,
    motor: Option<AnyMotor>,
    solenoid: Option<AnySolenoid>,
    led_ring: Option<AnyLedRing>,
    nfc: Option<AnyNfcReader>,
    switches: Option<AnySwitchBank>,
}

impl LockerController {
    pub fn new(config: LockerConfig) -> Self {
        Self {
            config,
            motor: None,
            solenoid: None,
            led_ring: None,
            nfc: None,
            switches: None,
        }
    }

    pub fn register_motor(&mut self, device: impl Into<AnyMotor>) {
        self.motor = Some(device.into());
    }

    pub fn register_solenoid(&mut self, device: impl Into<AnySolenoid>) {
        self.solenoid = Some(device.into());
    }

    pub fn register_led_ring(&mut self, device: impl Into<AnyLedRing>) {
        self.led_ring = Some(device.into());
    }

    pub fn register_nfc(&mut self, device: impl Into<AnyNfcReader>) {
        self.nfc = Some(device.into());
    }

    pub fn register_switches(&mut self, device: impl Into<AnySwitchBank>) {
        self.switches = Some(device.into());
    }

    /// Bring the bay up.
    ///
    /// Blanks the ring, starts the limit switch monitor and spawns the
    /// session driver in `Vacant`. Reader initialization happens inside the
    /// driver, so a dead reader does not fail start; the monitor keeps
    /// running and the driver reports [`SessionExit::InitFailed`].
    ///
    /// # Errors
    ///
    /// - [`ControllerError::Config`] if the configuration is invalid.
    /// - [`ControllerError::MissingDevice`] if a device was not registered.
    /// - [`ControllerError::Hardware`] if the ring or the switch bank refuses
    ///   its first command.
    pub async fn start(self) -> Result<ControllerHandle, ControllerError> {
        self.config.validate()?;

        let motor = self.motor.ok_or(ControllerError::MissingDevice("motor"))?;
        let solenoid = self
            .solenoid
            .ok_or(ControllerError::MissingDevice("solenoid"))?;
        let mut led_ring = self
            .led_ring
            .ok_or(ControllerError::MissingDevice("led ring"))?;
        let nfc = self.nfc.ok_or(ControllerError::MissingDevice("nfc reader"))?;
        let switches = self
            .switches
            .ok_or(ControllerError::MissingDevice("switch bank"))?;

        led_ring.set_solid(LedColor::Off).await?;

        let cancel = CancellationToken::new();
        let (monitor, monitor_task) =
            LimitSwitchMonitor::new(switches, self.config.monitor.clone())
                .start(cancel.child_token())?;

        let machine = LockerStateMachine::new(
            Actuators {
                motor,
                solenoid,
                led_ring,
            },
            monitor.clone(),
            self.config.interlock.clone(),
            cancel.child_token(),
        );
        let (driver, session) =
            SessionDriver::new(machine, nfc, self.config.nfc.clone(), cancel.child_token());
        let driver_task = tokio::spawn(driver.run());

        info!(state = %session.state(), "Locker controller started");

        Ok(ControllerHandle {
            session,
            monitor,
            cancel,
            driver_task,
            monitor_task,
        })
    }
}

/// Running controller.
#[derive(Debug)]
pub struct ControllerHandle {
    session: SessionHandle,
    monitor: LimitSwitchMonitorHandle,
    cancel: CancellationToken,
    driver_task: JoinHandle<SessionExit>,
    monitor_task: JoinHandle<()>,
}

impl ControllerHandle {
    pub fn state(&self) -> LockerState {
        self.session.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<LockerState> {
        self.session.subscribe()
    }

    /// Queue an operator command and wait for its result.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::send`].
    pub async fn send(&self, command: SessionCommand) -> Result<CommandReply, ControllerError> {
        self.session.send(command).await
    }

    pub async fn status(&self) -> Result<LockerStatus, ControllerError> {
        self.session.status().await
    }

    pub async fn signal(&self, signal: LockerSignal) -> Result<DispatchOutcome, ControllerError> {
        self.session.signal(signal).await
    }

    /// Limit switch levels, readable even when the driver is gone.
    pub fn switches(&self) -> &LimitSwitchMonitorHandle {
        &self.monitor
    }

    /// Whether the session driver has exited.
    pub fn is_session_stopped(&self) -> bool {
        self.driver_task.is_finished()
    }

    /// Cancel both tasks and wait for them.
    ///
    /// A transition in progress is cut short at its next interlock poll and
    /// leaves the state unchanged.
    ///
    /// # Errors
    ///
    /// [`ControllerError::TaskFailed`] if a task panicked.
    pub async fn shutdown(self) -> Result<SessionExit, ControllerError> {
        self.cancel.cancel();

        let exit = self.driver_task.await.map_err(task_failed("session driver"))?;
        self.monitor_task
            .await
            .map_err(task_failed("limit switch monitor"))?;

        info!(?exit, "Locker controller stopped");
        Ok(exit)
    }
}

fn task_failed(task: &'static str) -> impl FnOnce(JoinError) -> ControllerError {
    move |err| {
        warn!(task, error = %err, "Task did not finish cleanly");
        ControllerError::TaskFailed(format!("{task}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bikelocker_hardware::mock::{LedStatus, MockLocker};
    use std::time::Duration;

    fn bay() -> MockLocker {
        MockLocker::docked(Duration::from_millis(110))
    }

    fn register_all(controller: &mut LockerController, bay: MockLocker) {
        controller.register_motor(bay.motor);
        controller.register_solenoid(bay.solenoid);
        controller.register_led_ring(bay.led_ring);
        controller.register_nfc(bay.nfc);
        controller.register_switches(bay.switches);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_shutdown() {
        let bay = bay();
        let mocks = bay.handles.clone();
        let mut controller = LockerController::new(LockerConfig::default());
        register_all(&mut controller, bay);

        let handle = controller.start().await.unwrap();
        assert_eq!(handle.state(), LockerState::Vacant);
        assert_eq!(mocks.led_ring.status(), LedStatus::Off);
        assert!(mocks.switches.edge_handler_installed());

        let status = handle.status().await.unwrap();
        assert!(status.switches.lim3);
        assert!(status.switches.lim4);

        assert_eq!(handle.shutdown().await.unwrap(), SessionExit::Cancelled);
    }

    #[tokio::test]
    async fn test_missing_device() {
        let bay = bay();
        let mut controller = LockerController::new(LockerConfig::default());
        controller.register_motor(bay.motor);
        controller.register_solenoid(bay.solenoid);
        controller.register_led_ring(bay.led_ring);
        controller.register_switches(bay.switches);

        let err = controller.start().await.unwrap_err();
        assert!(matches!(err, ControllerError::MissingDevice("nfc reader")));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = LockerConfig::default();
        config.interlock.poll_interval_ms = 0;
        let mut controller = LockerController::new(config);
        register_all(&mut controller, bay());

        let err = controller.start().await.unwrap_err();
        assert!(matches!(err, ControllerError::Config(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_reader_keeps_monitor_running() {
        let bay = bay();
        let mocks = bay.handles.clone();
        mocks.nfc.fail_init_always();
        let mut controller = LockerController::new(LockerConfig::default());
        register_all(&mut controller, bay);

        let handle = controller.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(handle.is_session_stopped());
        assert!(matches!(
            handle.status().await,
            Err(ControllerError::SessionStopped)
        ));

        mocks.switches.release(bikelocker_core::SwitchId::DOOR_CLOSED);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.switches().state(bikelocker_core::SwitchId::DOOR_CLOSED));

        assert_eq!(
            handle.shutdown().await.unwrap(),
            SessionExit::InitFailed { attempts: 5 }
        );
    }
}
