//! Locker controller crate.
//!
//! This crate contains the locker lifecycle state machine, the tag registry,
//! the limit switch monitor with its interlock wait, and the NFC session
//! driver that ties them to a reader.

pub mod controller;
pub mod error;
pub mod interlock;
pub mod monitor;
pub mod registry;
pub mod session;
pub mod state_machine;

pub use controller::{ControllerHandle, LockerController};
pub use error::{ControllerError, InterlockError, RegistryError, StateMachineError};
pub use monitor::{LimitSwitchMonitor, LimitSwitchMonitorHandle, SwitchLevels};
pub use registry::{TagCheck, TagRegistry};
pub use session::{CommandReply, SessionCommand, SessionDriver, SessionExit, SessionHandle};
pub use state_machine::{
    Actuators, DispatchOutcome, FaultRecord, LockerSignal, LockerStateMachine, LockerStatus,
    StateTransition,
};
