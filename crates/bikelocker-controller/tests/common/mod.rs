//! Common helpers for the controller integration tests.
//!
//! A [`Bay`] is a controller running against a docked mock locker, usually
//! with the plant simulator closing the loop between actuators and switches.
//! All tests run on a paused clock, so the multi-second sled moves and the
//! reader settle delay cost nothing.

#![allow(dead_code)]

use bikelocker_controller::{ControllerHandle, LockerController};
use bikelocker_core::{LockerConfig, LockerState, TagId};
use bikelocker_hardware::mock::{MockLocker, MockLockerHandles, PlantHandle};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Long enough for the settle delay, the empty poll that follows it and one
/// backoff.
pub const REPRESENT_GAP: Duration = Duration::from_secs(7);

/// Upper bound for any single dispatch in these tests.
pub const STATE_DEADLINE: Duration = Duration::from_secs(60);

pub fn owner() -> TagId {
    TagId::new(vec![0xAA, 0xBB]).unwrap()
}

pub fn stranger() -> TagId {
    TagId::new(vec![0xAA, 0xBC]).unwrap()
}

pub struct Bay {
    pub controller: ControllerHandle,
    pub mocks: MockLockerHandles,
    pub plant: Option<PlantHandle>,
    plant_cancel: CancellationToken,
}

impl Bay {
    /// Controller and plant with default settings.
    pub async fn start() -> Self {
        Self::start_with(LockerConfig::default(), true).await
    }

    pub async fn start_with(config: LockerConfig, with_plant: bool) -> Self {
        Self::start_armed(config, with_plant, |_| {}).await
    }

    /// Like [`start_with`](Self::start_with), with a hook to arm the mocks
    /// before the controller touches them.
    pub async fn start_armed(
        config: LockerConfig,
        with_plant: bool,
        arm: impl FnOnce(&MockLockerHandles),
    ) -> Self {
        let locker = MockLocker::docked(config.nfc.poll_timeout());
        let mocks = locker.handles.clone();
        arm(&mocks);
        let plant_cancel = CancellationToken::new();

        let plant = with_plant.then(|| {
            let (simulator, handle) = mocks.plant(config.simulator.clone());
            tokio::spawn(simulator.run(plant_cancel.clone()));
            handle
        });

        let mut controller = LockerController::new(config);
        controller.register_motor(locker.motor);
        controller.register_solenoid(locker.solenoid);
        controller.register_led_ring(locker.led_ring);
        controller.register_nfc(locker.nfc);
        controller.register_switches(locker.switches);

        Self {
            controller: controller.start().await.unwrap(),
            mocks,
            plant,
            plant_cancel,
        }
    }

    pub fn states(&self) -> watch::Receiver<LockerState> {
        self.controller.subscribe()
    }

    /// Hold `tag` on the reader until the machine reaches `expected`, then
    /// take it away and wait until the driver is ready for a new presentation.
    pub async fn tap(&self, tag: TagId, expected: LockerState) {
        let mut states = self.states();
        self.mocks.nfc.present(tag);
        wait_for_state(&mut states, expected).await;
        self.mocks.nfc.remove();
        tokio::time::sleep(REPRESENT_GAP).await;
    }

    pub fn safety_violations(&self) -> u64 {
        self.plant.as_ref().map_or(0, PlantHandle::safety_violations)
    }

    pub async fn stop(self) {
        self.controller.shutdown().await.unwrap();
        self.plant_cancel.cancel();
    }
}

pub async fn wait_for_state(states: &mut watch::Receiver<LockerState>, expected: LockerState) {
    tokio::time::timeout(STATE_DEADLINE, states.wait_for(|state| *state == expected))
        .await
        .unwrap_or_else(|_| panic!("never reached {expected}"))
        .unwrap();
}
