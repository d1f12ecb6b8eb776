//! Shared domain types for the bike locker LV controller.
//!
//! Every other crate in the workspace speaks in terms of the types defined
//! here: the tag identity read from the NFC reader, the locker lifecycle
//! state, the limit switch identifiers and the runtime configuration.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::{InterlockConfig, LockerConfig, MonitorConfig, NfcConfig, SimulatorConfig};
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
