//! Hardware abstraction layer for the bike locker LV controller.
//!
//! The locker controller talks to five collaborators: the sled motor driver,
//! the door solenoid, the LED ring, the NFC reader and the bank of four limit
//! switches. This crate defines the contract for each of them and ships mock
//! implementations plus a plant simulator so the controller can run full
//! cycles without a board attached.
//!
//! # Design
//!
//! - **Async-first**: actuator and reader calls are native `async fn` in
//!   traits (Edition 2024 RPITIT).
//! - **Enum dispatch**: the traits are not object-safe, so the controller
//!   holds the [`devices`] wrappers.
//! - **Interrupt hand-off**: switch banks report edges through an
//!   [`EdgeNotifier`], which never blocks the caller.
//! - **Error-aware**: every fallible operation returns [`Result<T>`].
//!
//! # Example
//!
//! ```no_run
//! use bikelocker_hardware::traits::{DoorSolenoid, SwitchBank};
//! use bikelocker_hardware::error::Result;
//! use bikelocker_core::SwitchId;
//!
//! async fn release_door<D: DoorSolenoid, S: SwitchBank>(door: &mut D, switches: &S) -> Result<()> {
//!     door.unlock().await?;
//!     while switches.read_level(SwitchId::DOOR_CLOSED) {
//!         tokio::time::sleep(std::time::Duration::from_millis(100)).await;
//!     }
//!     door.lock().await
//! }
//! ```

pub mod devices;
pub mod edge;
pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use devices::{AnyLedRing, AnyMotor, AnyNfcReader, AnySolenoid, AnySwitchBank};
pub use edge::EdgeNotifier;
pub use error::{HardwareError, Result};
pub use traits::{DoorSolenoid, LedRing, NfcReader, SledMotor, SwitchBank};
pub use types::{
    ActuatorCommand, DutyCycle, LedColor, LedPattern, MotorDirection, ReaderInfo, TagRead,
};
