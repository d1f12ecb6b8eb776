//! Common types shared across hardware device implementations.
//!
//! This module defines the values exchanged with the collaborator drivers:
//! motor directions, LED colors and patterns, tag reads and the actuator
//! command vocabulary used for manual overrides and command logs.

use crate::error::HardwareError;
use bikelocker_core::TagId;
use bikelocker_core::constants::{PWM_DUTY_RESOLUTION_BITS, STD_DUTY_CYCLE_PERCENT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// NFC reader information.
///
/// Contains reader-specific metadata such as supported protocols
/// and firmware version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderInfo {
    /// Reader name (e.g., "PN532").
    pub name: String,

    /// List of supported protocols (e.g., ["ISO14443A"]).
    pub protocols: Vec<String>,

    /// Optional firmware version string.
    pub firmware_version: Option<String>,
}

impl ReaderInfo {
    /// Create a new ReaderInfo.
    pub fn new(name: impl Into<String>, protocols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            protocols,
            firmware_version: None,
        }
    }

    /// Set the firmware version.
    pub fn with_firmware_version(mut self, firmware_version: impl Into<String>) -> Self {
        self.firmware_version = Some(firmware_version.into());
        self
    }
}

/// A tag detected by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRead {
    /// Identifier reported by the reader.
    pub tag: TagId,

    /// When the tag was read.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl TagRead {
    /// Create a tag read stamped with the current time.
    pub fn new(tag: TagId) -> Self {
        Self {
            tag,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Sled motor direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorDirection {
    /// Sled moves out of the bay.
    Forward,

    /// Sled moves back into the bay.
    Reverse,
}

impl MotorDirection {
    /// Map the console's numeric direction (`1` forward, `0` reverse).
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Forward),
            0 => Some(Self::Reverse),
            _ => None,
        }
    }
}

impl fmt::Display for MotorDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Reverse => write!(f, "reverse"),
        }
    }
}

/// Sled motor PWM duty cycle, 0 to 100 percent.
///
/// ```
/// use bikelocker_hardware::types::DutyCycle;
///
/// let half = DutyCycle::new(50).unwrap();
/// assert_eq!(half.to_bits(), 511);
/// assert!(DutyCycle::new(101).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DutyCycle(u8);

impl DutyCycle {
    /// Duty used whenever the sled is driven.
    pub const STANDARD: Self = Self(STD_DUTY_CYCLE_PERCENT);

    pub const OFF: Self = Self(0);

    /// # Errors
    ///
    /// Returns [`HardwareError::InvalidData`] above 100 percent.
    pub fn new(percent: u8) -> Result<Self, HardwareError> {
        if percent > 100 {
            return Err(HardwareError::invalid_data(format!(
                "duty cycle {percent}% outside 0..=100"
            )));
        }
        Ok(Self(percent))
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Compare value for the PWM timer, rounded down.
    pub fn to_bits(self) -> u32 {
        let full_scale = (1u32 << PWM_DUTY_RESOLUTION_BITS) - 1;
        full_scale * u32::from(self.0) / 100
    }
}

impl TryFrom<u8> for DutyCycle {
    type Error = HardwareError;

    fn try_from(percent: u8) -> Result<Self, Self::Error> {
        Self::new(percent)
    }
}

impl From<DutyCycle> for u8 {
    fn from(duty: DutyCycle) -> Self {
        duty.0
    }
}

impl fmt::Display for DutyCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Solid colors the LED ring can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum LedColor {
    /// LED off.
    Off,

    /// Full white, used as work light for the camera.
    White,

    /// Red LED.
    Red,

    /// Green LED.
    Green,

    /// Blue LED.
    Blue,

    /// Amber LED.
    Amber,

    /// Custom RGB color (red, green, blue).
    Custom(u8, u8, u8),
}

impl LedColor {
    /// Create a custom RGB LED color.
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::Custom(r, g, b)
    }

    /// Get the RGB components of the LED color.
    pub fn as_rgb(&self) -> (u8, u8, u8) {
        match self {
            Self::Off => (0, 0, 0),
            Self::White => (255, 255, 255),
            Self::Red => (255, 0, 0),
            Self::Green => (0, 255, 0),
            Self::Blue => (0, 0, 255),
            Self::Amber => (255, 191, 0),
            Self::Custom(r, g, b) => (*r, *g, *b),
        }
    }
}

/// Animated patterns rendered by the LED ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedPattern {
    /// Rainbow chase shown while the bike charges.
    RainbowChase,
}

/// One command sent to an actuator.
///
/// This is the vocabulary shared by manual overrides and the mock command
/// logs, so tests can assert on the exact sequence a transition produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorCommand {
    SetDirection(MotorDirection),
    SetDuty(DutyCycle),
    EnableMotor,
    DisableMotor,
    LockDoor,
    UnlockDoor,
    StartPattern(LedPattern),
    StopPattern,
    SetSolid(LedColor),
}

impl fmt::Display for ActuatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetDirection(direction) => write!(f, "set motor direction {direction}"),
            Self::SetDuty(duty) => write!(f, "set motor duty {duty}"),
            Self::EnableMotor => write!(f, "enable motor"),
            Self::DisableMotor => write!(f, "disable motor"),
            Self::LockDoor => write!(f, "lock door"),
            Self::UnlockDoor => write!(f, "unlock door"),
            Self::StartPattern(pattern) => write!(f, "start pattern {pattern:?}"),
            Self::StopPattern => write!(f, "stop pattern"),
            Self::SetSolid(color) => write!(f, "set solid {color:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_info() {
        let info = ReaderInfo::new("PN532", vec!["ISO14443A".to_string()])
            .with_firmware_version("1.6");

        assert_eq!(info.name, "PN532");
        assert_eq!(info.protocols, vec!["ISO14443A"]);
        assert_eq!(info.firmware_version, Some("1.6".to_string()));
    }

    #[test]
    fn test_motor_direction_from_level() {
        assert_eq!(MotorDirection::from_level(1), Some(MotorDirection::Forward));
        assert_eq!(MotorDirection::from_level(0), Some(MotorDirection::Reverse));
        assert_eq!(MotorDirection::from_level(2), None);
    }

    #[test]
    fn test_duty_cycle_bounds_and_bits() {
        assert_eq!(DutyCycle::OFF.to_bits(), 0);
        assert_eq!(DutyCycle::STANDARD.to_bits(), 1023);
        assert_eq!(DutyCycle::new(25).unwrap().to_bits(), 255);
        assert_eq!(DutyCycle::new(100).unwrap(), DutyCycle::STANDARD);

        let err = DutyCycle::new(150).unwrap_err();
        assert!(matches!(err, HardwareError::InvalidData { .. }));
        assert_eq!(err.to_string(), "Invalid data: duty cycle 150% outside 0..=100");
    }

    #[test]
    fn test_duty_cycle_deserialize_validates() {
        let duty: DutyCycle = serde_json::from_str("40").unwrap();
        assert_eq!(duty.percent(), 40);
        assert!(serde_json::from_str::<DutyCycle>("101").is_err());
        assert_eq!(
            serde_json::to_string(&ActuatorCommand::SetDuty(duty)).unwrap(),
            r#"{"set_duty":40}"#
        );
    }

    #[test]
    fn test_led_color_rgb() {
        assert_eq!(LedColor::White.as_rgb(), (255, 255, 255));
        assert_eq!(LedColor::Red.as_rgb(), (255, 0, 0));
        assert_eq!(LedColor::Off.as_rgb(), (0, 0, 0));
        assert_eq!(LedColor::rgb(1, 2, 3).as_rgb(), (1, 2, 3));
    }

    #[test]
    fn test_actuator_command_serialization() {
        let command = ActuatorCommand::SetDirection(MotorDirection::Forward);
        let json = serde_json::to_string(&command).unwrap();
        let deserialized: ActuatorCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(command, deserialized);
    }

    #[test]
    fn test_actuator_command_display() {
        assert_eq!(ActuatorCommand::UnlockDoor.to_string(), "unlock door");
        assert_eq!(
            ActuatorCommand::SetDirection(MotorDirection::Reverse).to_string(),
            "set motor direction reverse"
        );
        assert_eq!(
            ActuatorCommand::SetDuty(DutyCycle::STANDARD).to_string(),
            "set motor duty 100%"
        );
    }
}
