//! A complete set of mock collaborators for one locker bay.

use super::{
    CommandLog, MockLedRing, MockLedRingHandle, MockMotor, MockMotorHandle, MockNfcReader,
    MockNfcReaderHandle, MockSolenoid, MockSolenoidHandle, MockSwitchBank, MockSwitchBankHandle,
    PlantHandle, PlantSimulator,
};
use crate::devices::{AnyLedRing, AnyMotor, AnyNfcReader, AnySolenoid, AnySwitchBank};
use bikelocker_core::SimulatorConfig;
use std::time::Duration;

/// Mock devices for one bay, ready to hand to the controller.
#[derive(Debug)]
pub struct MockLocker {
    pub motor: AnyMotor,
    pub solenoid: AnySolenoid,
    pub led_ring: AnyLedRing,
    pub nfc: AnyNfcReader,
    pub switches: AnySwitchBank,
    pub handles: MockLockerHandles,
}

/// Control side of a [`MockLocker`].
#[derive(Debug, Clone)]
pub struct MockLockerHandles {
    pub motor: MockMotorHandle,
    pub solenoid: MockSolenoidHandle,
    pub led_ring: MockLedRingHandle,
    pub nfc: MockNfcReaderHandle,
    pub switches: MockSwitchBankHandle,
    /// Commands from all three actuators, in issue order.
    pub log: CommandLog,
}

impl MockLocker {
    /// Empty bay: sled home, door shut, bolt locked, nothing in the field.
    pub fn docked(nfc_poll_timeout: Duration) -> Self {
        let log = CommandLog::new();
        let (motor, motor_handle) = MockMotor::with_log(log.clone());
        let (solenoid, solenoid_handle) = MockSolenoid::with_log(log.clone());
        let (led_ring, led_handle) = MockLedRing::with_log(log.clone());
        let (nfc, nfc_handle) = MockNfcReader::with_poll_timeout(nfc_poll_timeout);
        let (switches, switch_handle) = MockSwitchBank::docked();

        Self {
            motor: motor.into(),
            solenoid: solenoid.into(),
            led_ring: led_ring.into(),
            nfc: nfc.into(),
            switches: switches.into(),
            handles: MockLockerHandles {
                motor: motor_handle,
                solenoid: solenoid_handle,
                led_ring: led_handle,
                nfc: nfc_handle,
                switches: switch_handle,
                log,
            },
        }
    }
}

impl MockLockerHandles {
    /// Couple the actuators to the switches through a plant simulator.
    pub fn plant(&self, config: SimulatorConfig) -> (PlantSimulator, PlantHandle) {
        PlantSimulator::new(
            config,
            self.motor.subscribe(),
            self.solenoid.subscribe(),
            self.switches.clone(),
        )
    }
}
