//! Timing and sizing constants for the locker controller.
//!
//! These are the defaults used by [`LockerConfig`](crate::LockerConfig). The
//! values come from the behavior of the deployed controller board: the limit
//! switch task, the PN532 polling loop and the sled motor driver.
//!
//! ```
//! use bikelocker_core::constants::*;
//! use std::time::Duration;
//!
//! let poll = Duration::from_millis(DEFAULT_INTERLOCK_POLL_MS);
//! assert_eq!(poll, Duration::from_millis(100));
//! assert_eq!(NFC_INIT_MAX_ATTEMPTS, 5);
//! ```

// ============================================================================
// Tag identifiers
// ============================================================================

/// Smallest tag identifier accepted from the reader, in bytes.
pub const MIN_TAG_LENGTH: usize = 1;

/// Largest tag identifier accepted from the reader, in bytes.
///
/// Matches the UID buffer handed to the NFC driver.
pub const MAX_TAG_LENGTH: usize = 10;

// ============================================================================
// Limit switches
// ============================================================================

/// Number of limit switches wired to the controller (LIM1..LIM4).
pub const LIMIT_SWITCH_COUNT: usize = 4;

/// Capacity of the edge notification queue between the interrupt side and the
/// monitor task.
pub const DEFAULT_EDGE_QUEUE_CAPACITY: usize = 10;

/// Delay after processing one edge notification, in milliseconds.
///
/// Keeps a bouncing switch from starving the other tasks. This is not a
/// debounce: the interlock wait always confirms with a direct read.
pub const DEFAULT_MONITOR_RATE_LIMIT_MS: u64 = 100;

// ============================================================================
// Interlock waits
// ============================================================================

/// Interval between synchronous switch reads while waiting on an interlock.
pub const DEFAULT_INTERLOCK_POLL_MS: u64 = 100;

/// Upper bound on a single interlock wait before the locker faults.
pub const DEFAULT_INTERLOCK_TIMEOUT_MS: u64 = 30_000;

// ============================================================================
// NFC session
// ============================================================================

/// Reader initialization attempts before the session driver gives up.
pub const NFC_INIT_MAX_ATTEMPTS: u32 = 5;

/// Pause between two reader initialization attempts.
pub const DEFAULT_NFC_INIT_RETRY_MS: u64 = 100;

/// Backoff after a poll that found no tag.
pub const DEFAULT_NFC_NO_TAG_BACKOFF_MS: u64 = 500;

/// Pause after dispatching a detection, before polling again.
pub const DEFAULT_NFC_SETTLE_DELAY_MS: u64 = 5_000;

/// Time the reader listens for a target during a single poll.
pub const DEFAULT_NFC_POLL_TIMEOUT_MS: u64 = 110;

/// Capacity of the operator command queue feeding the session driver.
pub const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 16;

// ============================================================================
// Sled motor
// ============================================================================

/// Duty cycle the sled is driven at, in percent.
pub const STD_DUTY_CYCLE_PERCENT: u8 = 100;

/// Resolution of the motor PWM timer.
pub const PWM_DUTY_RESOLUTION_BITS: u32 = 10;

// ============================================================================
// State machine
// ============================================================================

/// Maximum number of state transitions kept in the state machine history.
///
/// One occupancy cycle is nine transitions, so this holds roughly eleven
/// complete sessions.
pub const MAX_HISTORY_SIZE: usize = 100;

// ============================================================================
// Plant simulator
// ============================================================================

/// Time for the sled to travel between its two end stops.
pub const DEFAULT_SLED_TRAVEL_MS: u64 = 3_000;

/// Time between the bolt releasing and the user pulling the door open.
pub const DEFAULT_DOOR_OPEN_DELAY_MS: u64 = 1_000;

/// Time between the sled reaching home and the user pushing the door shut.
pub const DEFAULT_DOOR_CLOSE_DELAY_MS: u64 = 2_000;
