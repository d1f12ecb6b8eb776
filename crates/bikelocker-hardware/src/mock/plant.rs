//! Physical plant simulator.
//!
//! Closes the loop between the mock actuators and the mock limit switches so
//! that the controller can run whole cycles without hardware: the sled moves
//! while the motor is driven, at a speed proportional to the duty cycle, the door swings open shortly after the
//! bolt is released, and it is pushed shut once the sled has been out and
//! come back home.
//!
//! Driving the sled against a closed door is counted as a safety violation
//! and the sled does not move.

use super::motor::MotorStatus;
use super::solenoid::SolenoidStatus;
use super::switches::MockSwitchBankHandle;
use crate::types::MotorDirection;
use bikelocker_core::{SimulatorConfig, SwitchId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Simulation step.
pub const SIM_TICK: Duration = Duration::from_millis(50);

/// Simulated sled, door and switches.
#[derive(Debug)]
pub struct PlantSimulator {
    config: SimulatorConfig,
    motor: watch::Receiver<MotorStatus>,
    solenoid: watch::Receiver<SolenoidStatus>,
    switches: MockSwitchBankHandle,
    // 0 is home (LIM3), `sled_travel_ms` is fully out (LIM1).
    position_ms: u64,
    excursion: bool,
    blocked: bool,
    door_opens_at: Option<Instant>,
    door_closes_at: Option<Instant>,
    shared: Arc<PlantShared>,
}

#[derive(Debug, Default)]
struct PlantShared {
    violations: AtomicU64,
    position_ms: AtomicU64,
}

impl PlantSimulator {
    /// Build a simulator starting from the current switch levels.
    pub fn new(
        config: SimulatorConfig,
        motor: watch::Receiver<MotorStatus>,
        solenoid: watch::Receiver<SolenoidStatus>,
        switches: MockSwitchBankHandle,
    ) -> (Self, PlantHandle) {
        let position_ms = if switches.level(SwitchId::SLED_OUT) {
            config.sled_travel_ms
        } else if switches.level(SwitchId::SLED_IN) {
            0
        } else {
            config.sled_travel_ms / 2
        };

        let shared = Arc::new(PlantShared::default());
        shared.position_ms.store(position_ms, Ordering::SeqCst);

        let simulator = Self {
            config,
            motor,
            solenoid,
            switches,
            position_ms,
            excursion: false,
            blocked: false,
            door_opens_at: None,
            door_closes_at: None,
            shared: shared.clone(),
        };

        (simulator, PlantHandle { shared })
    }

    /// Run until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(SIM_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            sled_travel_ms = self.config.sled_travel_ms,
            "Plant simulator started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.step(Instant::now()),
            }
        }

        debug!("Plant simulator stopped");
    }

    fn step(&mut self, now: Instant) {
        let motor = *self.motor.borrow();
        let door_closed = self.switches.level(SwitchId::DOOR_CLOSED);

        self.move_sled(motor, door_closed);
        self.move_door(now, motor, door_closed);
    }

    fn move_sled(&mut self, motor: MotorStatus, door_closed: bool) {
        if !motor.is_driving() {
            self.blocked = false;
            return;
        }

        if door_closed {
            if !self.blocked {
                let total = self.shared.violations.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(
                    direction = %motor.direction,
                    violations = total,
                    "Sled driven against closed door"
                );
                self.blocked = true;
            }
            return;
        }
        self.blocked = false;

        let step = SIM_TICK.as_millis() as u64 * u64::from(motor.duty.percent()) / 100;
        self.position_ms = match motor.direction {
            MotorDirection::Forward => (self.position_ms + step).min(self.config.sled_travel_ms),
            MotorDirection::Reverse => self.position_ms.saturating_sub(step),
        };
        if self.position_ms > 0 {
            self.excursion = true;
        }

        self.shared
            .position_ms
            .store(self.position_ms, Ordering::SeqCst);
        self.switches.set(
            SwitchId::SLED_OUT,
            self.position_ms >= self.config.sled_travel_ms,
        );
        self.switches.set(SwitchId::SLED_IN, self.position_ms == 0);
    }

    fn move_door(&mut self, now: Instant, motor: MotorStatus, door_closed: bool) {
        if door_closed {
            let unlocked = *self.solenoid.borrow() == SolenoidStatus::Unlocked;
            match (unlocked, self.door_opens_at) {
                (true, None) => self.door_opens_at = Some(now + self.config.door_open_delay()),
                (true, Some(at)) if now >= at => {
                    self.door_opens_at = None;
                    self.switches.release(SwitchId::DOOR_CLOSED);
                    debug!("Door swung open");
                }
                (false, Some(_)) => self.door_opens_at = None,
                _ => {}
            }
        } else {
            let returned = self.excursion && self.position_ms == 0 && !motor.enabled;
            match (returned, self.door_closes_at) {
                (true, None) => self.door_closes_at = Some(now + self.config.door_close_delay()),
                (true, Some(at)) if now >= at => {
                    self.door_closes_at = None;
                    self.excursion = false;
                    self.switches.press(SwitchId::DOOR_CLOSED);
                    debug!("Door pushed shut");
                }
                (false, Some(_)) => self.door_closes_at = None,
                _ => {}
            }
        }
    }
}

/// Read-only view of a running simulator.
#[derive(Debug, Clone)]
pub struct PlantHandle {
    shared: Arc<PlantShared>,
}

impl PlantHandle {
    /// Times the sled was driven against a closed door.
    pub fn safety_violations(&self) -> u64 {
        self.shared.violations.load(Ordering::SeqCst)
    }

    /// Sled distance from home, in milliseconds of travel.
    pub fn sled_position_ms(&self) -> u64 {
        self.shared.position_ms.load(Ordering::SeqCst)
    }
}
