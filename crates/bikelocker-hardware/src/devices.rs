//! Enum wrappers for hardware device dispatch.
//!
//! Native `async fn` in traits is not object-safe, so the controller cannot
//! hold `Box<dyn SledMotor>`. These enums give it one concrete type per
//! collaborator while keeping the futures `Send`, which the session driver
//! needs to run on a spawned task.
//!
//! # Examples
//!
//! ```
//! use bikelocker_hardware::devices::AnyMotor;
//! use bikelocker_hardware::mock::MockMotor;
//!
//! let (motor, _handle) = MockMotor::new();
//! let motor = AnyMotor::Mock(motor);
//! ```

use crate::edge::EdgeNotifier;
use crate::mock::{MockLedRing, MockMotor, MockNfcReader, MockSolenoid, MockSwitchBank};
use crate::traits::{DoorSolenoid, LedRing, NfcReader, SledMotor, SwitchBank};
use crate::types::{DutyCycle, LedColor, LedPattern, MotorDirection, ReaderInfo, TagRead};
use crate::Result;
use bikelocker_core::SwitchId;

/// Sled motor dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyMotor {
    /// Mock motor for development and testing.
    Mock(MockMotor),
    // TODO: L9958 H-bridge variant behind `hardware-gpio` (DIR/EN pins).
}

impl SledMotor for AnyMotor {
    async fn set_direction(&mut self, direction: MotorDirection) -> Result<()> {
        match self {
            Self::Mock(device) => device.set_direction(direction).await,
        }
    }

    async fn set_duty(&mut self, duty: DutyCycle) -> Result<()> {
        match self {
            Self::Mock(device) => device.set_duty(duty).await,
        }
    }

    async fn enable(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.enable().await,
        }
    }

    async fn disable(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.disable().await,
        }
    }
}

/// Door solenoid dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnySolenoid {
    Mock(MockSolenoid),
}

impl DoorSolenoid for AnySolenoid {
    async fn lock(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.lock().await,
        }
    }

    async fn unlock(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.unlock().await,
        }
    }
}

/// LED ring dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyLedRing {
    Mock(MockLedRing),
}

impl LedRing for AnyLedRing {
    async fn start_pattern(&mut self, pattern: LedPattern) -> Result<()> {
        match self {
            Self::Mock(device) => device.start_pattern(pattern).await,
        }
    }

    async fn stop_pattern(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.stop_pattern().await,
        }
    }

    async fn set_solid(&mut self, color: LedColor) -> Result<()> {
        match self {
            Self::Mock(device) => device.set_solid(color).await,
        }
    }
}

/// NFC reader dispatch.
///
/// # Examples
///
/// ```
/// use bikelocker_hardware::devices::AnyNfcReader;
/// use bikelocker_hardware::mock::MockNfcReader;
/// use bikelocker_hardware::traits::NfcReader;
///
/// #[tokio::main]
/// async fn main() -> bikelocker_hardware::Result<()> {
///     let (reader, _handle) = MockNfcReader::new();
///     let reader = AnyNfcReader::Mock(reader);
///
///     let info = reader.get_reader_info().await?;
///     println!("Reader: {}", info.name);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyNfcReader {
    Mock(MockNfcReader),
}

impl NfcReader for AnyNfcReader {
    async fn init(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.init().await,
        }
    }

    async fn poll(&mut self) -> Result<Option<TagRead>> {
        match self {
            Self::Mock(device) => device.poll().await,
        }
    }

    async fn get_reader_info(&self) -> Result<ReaderInfo> {
        match self {
            Self::Mock(device) => device.get_reader_info().await,
        }
    }
}

/// Limit switch bank dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnySwitchBank {
    Mock(MockSwitchBank),
}

impl SwitchBank for AnySwitchBank {
    fn read_level(&self, switch: SwitchId) -> bool {
        match self {
            Self::Mock(device) => device.read_level(switch),
        }
    }

    fn install_edge_handler(&mut self, notifier: EdgeNotifier) -> Result<()> {
        match self {
            Self::Mock(device) => device.install_edge_handler(notifier),
        }
    }
}

impl From<MockMotor> for AnyMotor {
    fn from(device: MockMotor) -> Self {
        Self::Mock(device)
    }
}

impl From<MockSolenoid> for AnySolenoid {
    fn from(device: MockSolenoid) -> Self {
        Self::Mock(device)
    }
}

impl From<MockLedRing> for AnyLedRing {
    fn from(device: MockLedRing) -> Self {
        Self::Mock(device)
    }
}

impl From<MockNfcReader> for AnyNfcReader {
    fn from(device: MockNfcReader) -> Self {
        Self::Mock(device)
    }
}

impl From<MockSwitchBank> for AnySwitchBank {
    fn from(device: MockSwitchBank) -> Self {
        Self::Mock(device)
    }
}
