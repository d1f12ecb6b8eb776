//! Console command parsing.
//!
//! One command per line, words separated by whitespace. Parsing only maps
//! text to a typed [`Command`]; nothing runs until the caller executes it.

use bikelocker_core::{LockerState, TagId};
use bikelocker_hardware::{ActuatorCommand, DutyCycle, LedColor, LedPattern, MotorDirection};
use std::str::FromStr;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Raw actuator commands, sent in order, state untouched.
    Actuate(Vec<ActuatorCommand>),
    /// Run the transition into this state.
    Transition(LockerState),
    VisionDone,
    ClearFault(LockerState),
    Status,
    /// Put a tag in the simulated reader field.
    Tag(TagId),
    /// Take the tag out of the simulated reader field.
    RemoveTag,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCommandError {
    #[error("Unrecognized command")]
    Unrecognized,

    #[error("{command}: {reason}")]
    InvalidArgument { command: String, reason: String },
}

impl ParseCommandError {
    fn invalid(command: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            command: command.to_string(),
            reason: reason.into(),
        }
    }
}

fn actuate(commands: &[ActuatorCommand]) -> Command {
    Command::Actuate(commands.to_vec())
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(ParseCommandError::Unrecognized)?;
        let arg = words.next();
        if words.next().is_some() {
            return Err(ParseCommandError::invalid(name, "too many arguments"));
        }

        let needs_arg = |what: &str| {
            arg.ok_or_else(|| ParseCommandError::invalid(name, format!("expected {what}")))
        };

        let command = match name {
            "lock_solenoid" => actuate(&[ActuatorCommand::LockDoor]),
            "unlock_solenoid" => actuate(&[ActuatorCommand::UnlockDoor]),
            "sled_out" => actuate(&[
                ActuatorCommand::SetDirection(MotorDirection::Forward),
                ActuatorCommand::SetDuty(DutyCycle::STANDARD),
                ActuatorCommand::EnableMotor,
            ]),
            "sled_in" => actuate(&[
                ActuatorCommand::SetDirection(MotorDirection::Reverse),
                ActuatorCommand::SetDuty(DutyCycle::STANDARD),
                ActuatorCommand::EnableMotor,
            ]),
            "stop_sled" | "dis_mtr_output" => actuate(&[ActuatorCommand::DisableMotor]),
            "en_mtr_output" => actuate(&[ActuatorCommand::EnableMotor]),
            "set_mtr_dir" => {
                let direction = needs_arg("0 or 1")?
                    .parse::<u8>()
                    .ok()
                    .and_then(MotorDirection::from_level)
                    .ok_or_else(|| ParseCommandError::invalid(name, "direction must be 0 or 1"))?;
                actuate(&[ActuatorCommand::SetDirection(direction)])
            }
            "set_pwm" => {
                let duty = needs_arg("a duty cycle")?
                    .parse::<u8>()
                    .ok()
                    .and_then(|percent| DutyCycle::new(percent).ok())
                    .ok_or_else(|| ParseCommandError::invalid(name, "duty must be 0 to 100"))?;
                actuate(&[ActuatorCommand::SetDuty(duty)])
            }
            "rainbow_chase_start" => {
                actuate(&[ActuatorCommand::StartPattern(LedPattern::RainbowChase)])
            }
            "rainbow_chase_stop" => actuate(&[ActuatorCommand::StopPattern]),
            "white_leds" => actuate(&[ActuatorCommand::SetSolid(LedColor::White)]),
            "leds_off" => actuate(&[ActuatorCommand::SetSolid(LedColor::Off)]),
            "vision_done" => Command::VisionDone,
            "clear_fault" => {
                let state = needs_arg("a state")?
                    .parse::<LockerState>()
                    .map_err(|err| ParseCommandError::invalid(name, err.to_string()))?;
                Command::ClearFault(state)
            }
            "status" => Command::Status,
            "tag" => {
                let tag = needs_arg("a hex tag id")?
                    .parse::<TagId>()
                    .map_err(|err| ParseCommandError::invalid(name, err.to_string()))?;
                Command::Tag(tag)
            }
            "remove_tag" => Command::RemoveTag,
            "quit" | "exit" => Command::Quit,
            other => match other.strip_prefix("to_").map(LockerState::from_str) {
                Some(Ok(state)) if state != LockerState::Fault => Command::Transition(state),
                _ => return Err(ParseCommandError::Unrecognized),
            },
        };

        if arg.is_some() && !matches!(name, "set_mtr_dir" | "set_pwm" | "clear_fault" | "tag") {
            return Err(ParseCommandError::invalid(name, "takes no arguments"));
        }
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("lock_solenoid", vec![ActuatorCommand::LockDoor])]
    #[case("unlock_solenoid", vec![ActuatorCommand::UnlockDoor])]
    #[case("sled_out", vec![
        ActuatorCommand::SetDirection(MotorDirection::Forward),
        ActuatorCommand::SetDuty(DutyCycle::STANDARD),
        ActuatorCommand::EnableMotor,
    ])]
    #[case("sled_in", vec![
        ActuatorCommand::SetDirection(MotorDirection::Reverse),
        ActuatorCommand::SetDuty(DutyCycle::STANDARD),
        ActuatorCommand::EnableMotor,
    ])]
    #[case("stop_sled", vec![ActuatorCommand::DisableMotor])]
    #[case("en_mtr_output", vec![ActuatorCommand::EnableMotor])]
    #[case("dis_mtr_output", vec![ActuatorCommand::DisableMotor])]
    #[case("set_mtr_dir 1", vec![ActuatorCommand::SetDirection(MotorDirection::Forward)])]
    #[case("set_mtr_dir 0", vec![ActuatorCommand::SetDirection(MotorDirection::Reverse)])]
    #[case("set_pwm 0", vec![ActuatorCommand::SetDuty(DutyCycle::OFF)])]
    #[case("set_pwm 100", vec![ActuatorCommand::SetDuty(DutyCycle::STANDARD)])]
    #[case("rainbow_chase_start", vec![ActuatorCommand::StartPattern(LedPattern::RainbowChase)])]
    #[case("rainbow_chase_stop", vec![ActuatorCommand::StopPattern])]
    #[case("white_leds", vec![ActuatorCommand::SetSolid(LedColor::White)])]
    #[case("  leds_off  ", vec![ActuatorCommand::SetSolid(LedColor::Off)])]
    fn test_actuator_commands(#[case] line: &str, #[case] expected: Vec<ActuatorCommand>) {
        assert_eq!(line.parse::<Command>().unwrap(), Command::Actuate(expected));
    }

    #[test]
    fn test_set_pwm_keeps_percent() {
        let Command::Actuate(commands) = "set_pwm 35".parse::<Command>().unwrap() else {
            panic!("expected an actuator command");
        };
        assert_eq!(commands, vec![ActuatorCommand::SetDuty(DutyCycle::new(35).unwrap())]);
    }

    #[rstest]
    #[case("to_unlocked_empty", LockerState::UnlockedEmpty)]
    #[case("to_loading", LockerState::Loading)]
    #[case("to_closed", LockerState::Closed)]
    #[case("to_compvision", LockerState::CompVision)]
    #[case("to_charging", LockerState::Charging)]
    #[case("to_unlocked", LockerState::Unlocked)]
    #[case("to_unloading", LockerState::Unloading)]
    #[case("to_empty", LockerState::Empty)]
    #[case("to_vacant", LockerState::Vacant)]
    fn test_state_commands(#[case] line: &str, #[case] state: LockerState) {
        assert_eq!(line.parse::<Command>().unwrap(), Command::Transition(state));
    }

    #[test]
    fn test_session_and_simulator_commands() {
        assert_eq!("vision_done".parse::<Command>().unwrap(), Command::VisionDone);
        assert_eq!("status".parse::<Command>().unwrap(), Command::Status);
        assert_eq!("remove_tag".parse::<Command>().unwrap(), Command::RemoveTag);
        assert_eq!("quit".parse::<Command>().unwrap(), Command::Quit);
        assert_eq!(
            "clear_fault vacant".parse::<Command>().unwrap(),
            Command::ClearFault(LockerState::Vacant)
        );
        assert_eq!(
            "tag aabb".parse::<Command>().unwrap(),
            Command::Tag(TagId::new(vec![0xAA, 0xBB]).unwrap())
        );
    }

    #[rstest]
    #[case("")]
    #[case("open_sesame")]
    #[case("to_fault")]
    #[case("to_nowhere")]
    #[case("breathe_start")]
    #[case("LOCK_SOLENOID")]
    fn test_unrecognized(#[case] line: &str) {
        assert_eq!(line.parse::<Command>(), Err(ParseCommandError::Unrecognized));
        assert_eq!(ParseCommandError::Unrecognized.to_string(), "Unrecognized command");
    }

    #[rstest]
    #[case("set_mtr_dir")]
    #[case("set_mtr_dir 2")]
    #[case("set_mtr_dir forward")]
    #[case("set_pwm")]
    #[case("set_pwm 101")]
    #[case("set_pwm -5")]
    #[case("set_pwm half")]
    #[case("clear_fault")]
    #[case("clear_fault sideways")]
    #[case("tag")]
    #[case("tag xyz")]
    #[case("status now")]
    #[case("tag aa bb")]
    fn test_bad_arguments(#[case] line: &str) {
        assert!(matches!(
            line.parse::<Command>(),
            Err(ParseCommandError::InvalidArgument { .. })
        ));
    }
}
