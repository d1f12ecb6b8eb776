//! Hardware device trait definitions.
//!
//! These traits are the contract between the locker controller and its
//! collaborators. Actuator calls are fire-and-forget: the returned future
//! completes once the command has been issued, never when the mechanism has
//! finished moving. Completion is always observed through the limit switches.
//!
//! All async traits use native `async fn` methods (Edition 2024 RPITIT), so
//! they are not object-safe; the controller dispatches through the enum
//! wrappers in [`devices`](crate::devices).

#![allow(async_fn_in_trait)]

use crate::edge::EdgeNotifier;
use crate::error::Result;
use crate::types::{DutyCycle, LedColor, LedPattern, MotorDirection, ReaderInfo, TagRead};
use bikelocker_core::SwitchId;

/// Sled motor driver (direction pin, PWM duty and output enable).
///
/// # Examples
///
/// ```no_run
/// use bikelocker_hardware::traits::SledMotor;
/// use bikelocker_hardware::types::{DutyCycle, MotorDirection};
/// use bikelocker_hardware::error::Result;
///
/// async fn drive_out<M: SledMotor>(motor: &mut M) -> Result<()> {
///     motor.set_direction(MotorDirection::Forward).await?;
///     motor.set_duty(DutyCycle::STANDARD).await?;
///     motor.enable().await
/// }
/// ```
pub trait SledMotor: Send + Sync {
    /// Select the direction used the next time the output is enabled.
    async fn set_direction(&mut self, direction: MotorDirection) -> Result<()>;

    /// Apply a new PWM duty cycle. Takes effect immediately if enabled.
    async fn set_duty(&mut self, duty: DutyCycle) -> Result<()>;

    /// Enable the motor output.
    async fn enable(&mut self) -> Result<()>;

    /// Disable the motor output.
    async fn disable(&mut self) -> Result<()>;
}

/// Door bolt solenoid.
///
/// The bolt is energized while unlocked, so callers must lock again as soon
/// as the door has been observed open.
pub trait DoorSolenoid: Send + Sync {
    /// De-energize the solenoid; the bolt latches the door.
    async fn lock(&mut self) -> Result<()>;

    /// Energize the solenoid; the bolt retracts.
    async fn unlock(&mut self) -> Result<()>;
}

/// Status LED ring.
///
/// Patterns are rendered by the driver itself; starting a pattern replaces
/// any solid color and vice versa.
pub trait LedRing: Send + Sync {
    /// Start an animated pattern.
    async fn start_pattern(&mut self, pattern: LedPattern) -> Result<()>;

    /// Stop the running pattern and blank the ring.
    async fn stop_pattern(&mut self) -> Result<()>;

    /// Show a solid color on every pixel.
    async fn set_solid(&mut self, color: LedColor) -> Result<()>;
}

/// NFC presence reader.
///
/// # Examples
///
/// ```no_run
/// use bikelocker_hardware::traits::NfcReader;
/// use bikelocker_hardware::error::Result;
///
/// async fn first_tag<R: NfcReader>(reader: &mut R) -> Result<String> {
///     reader.init().await?;
///     loop {
///         if let Some(read) = reader.poll().await? {
///             return Ok(read.tag.to_hex());
///         }
///     }
/// }
/// ```
pub trait NfcReader: Send + Sync {
    /// Bring up the reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader does not answer; callers retry.
    async fn init(&mut self) -> Result<()>;

    /// Listen for a tag for a bounded time.
    ///
    /// Returns `Ok(None)` when no tag answered within the listening window.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader is not initialized or the exchange with
    /// the reader failed.
    async fn poll(&mut self) -> Result<Option<TagRead>>;

    /// Get reader information.
    async fn get_reader_info(&self) -> Result<ReaderInfo>;
}

/// Bank of limit switch inputs.
///
/// Reads are synchronous pin reads returning the logical "pressed" level.
pub trait SwitchBank: Send + Sync {
    /// Read the current logical level of a switch.
    fn read_level(&self, switch: SwitchId) -> bool;

    /// Route edge interrupts for all switches to `notifier`.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::EdgeHandlerInstall`](crate::HardwareError::EdgeHandlerInstall)
    /// if the interrupt service could not be installed. Start-up must abort.
    fn install_edge_handler(&mut self, notifier: EdgeNotifier) -> Result<()>;
}
