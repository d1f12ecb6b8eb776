use crate::{
    Result,
    constants::{LIMIT_SWITCH_COUNT, MAX_TAG_LENGTH, MIN_TAG_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// NFC tag identifier (1-10 bytes, as reported by the reader)
///
/// # Security
/// Equality runs in constant time so that checking a presented tag against the
/// registered owner does not leak how many leading bytes matched.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct TagId(Vec<u8>);

impl TagId {
    /// Create a tag identifier with length validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidTag` if the identifier is empty or longer than
    /// [`MAX_TAG_LENGTH`] bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if !(MIN_TAG_LENGTH..=MAX_TAG_LENGTH).contains(&bytes.len()) {
            return Err(Error::InvalidTag(format!(
                "Tag must be {MIN_TAG_LENGTH}-{MAX_TAG_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(TagId(bytes))
    }

    /// Build an identifier from a driver buffer and the length it reported.
    ///
    /// # Errors
    /// Returns `Error::InvalidTag` if `length` exceeds the buffer or the
    /// resulting identifier is out of range.
    pub fn from_buffer(buffer: &[u8], length: usize) -> Result<Self> {
        let bytes = buffer.get(..length).ok_or_else(|| {
            Error::InvalidTag(format!(
                "Reported length {length} exceeds buffer of {} bytes",
                buffer.len()
            ))
        })?;
        TagId::new(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Upper-case hex rendering without separators (e.g. `AABB`).
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl PartialEq for TagId {
    fn eq(&self, other: &Self) -> bool {
        // ct_eq on slices of different length is already false; the explicit
        // length check keeps the intent readable.
        self.0.len() == other.0.len() && bool::from(self.0.ct_eq(&other.0))
    }
}

impl Hash for TagId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for TagId {
    type Err = Error;

    /// Parse a hex string such as `AABB`, `aa:bb` or `AA BB`.
    fn from_str(s: &str) -> Result<Self> {
        let digits: String = s
            .chars()
            .filter(|c| !matches!(c, ':' | ' ' | '-'))
            .collect();
        if digits.is_empty() || digits.len() % 2 != 0 {
            return Err(Error::InvalidTag(format!("Odd or empty hex string: {s}")));
        }
        let bytes = (0..digits.len())
            .step_by(2)
            .map(|i| {
                digits
                    .get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| Error::InvalidTag(format!("Invalid hex in tag: {s}")))
            })
            .collect::<Result<Vec<u8>>>()?;
        TagId::new(bytes)
    }
}

/// Lifecycle state of the locker.
///
/// The normal states form a single cycle starting and ending at `Vacant`.
/// `Fault` sits outside the cycle and is only left by operator action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockerState {
    /// No bike, no registered tag, door locked.
    Vacant,

    /// Tag registered, door released so the owner can open it.
    UnlockedEmpty,

    /// Sled is out, waiting for the bike to be placed on it.
    Loading,

    /// Sled home with the bike, door shut.
    Closed,

    /// Work lights on for the camera to locate the charging port.
    CompVision,

    /// Bike charging, ring light animating.
    Charging,

    /// Owner returned, door released.
    Unlocked,

    /// Sled is out so the owner can take the bike.
    Unloading,

    /// Sled home without the bike, door shut.
    Empty,

    /// An interlock or actuator failed; motion stopped, waiting for an operator.
    Fault,
}

impl LockerState {
    /// The normal cycle, in order, starting at `Vacant`.
    pub const CYCLE: [LockerState; 9] = [
        LockerState::Vacant,
        LockerState::UnlockedEmpty,
        LockerState::Loading,
        LockerState::Closed,
        LockerState::CompVision,
        LockerState::Charging,
        LockerState::Unlocked,
        LockerState::Unloading,
        LockerState::Empty,
    ];

    /// Successor of this state in the cycle, `None` for `Fault`.
    ///
    /// ```
    /// use bikelocker_core::LockerState;
    ///
    /// assert_eq!(LockerState::Vacant.next(), Some(LockerState::UnlockedEmpty));
    /// assert_eq!(LockerState::Empty.next(), Some(LockerState::Vacant));
    /// assert_eq!(LockerState::Fault.next(), None);
    /// ```
    #[must_use]
    pub fn next(&self) -> Option<LockerState> {
        let index = Self::CYCLE.iter().position(|s| s == self)?;
        Some(Self::CYCLE[(index + 1) % Self::CYCLE.len()])
    }

    /// Check if moving to `target` respects the cycle order.
    ///
    /// A cycle state may only move to its successor or into `Fault`. From
    /// `Fault` an operator may restore any cycle state.
    ///
    /// ```
    /// use bikelocker_core::LockerState;
    ///
    /// assert!(LockerState::Loading.can_transition_to(&LockerState::Closed));
    /// assert!(LockerState::Loading.can_transition_to(&LockerState::Fault));
    /// assert!(!LockerState::Loading.can_transition_to(&LockerState::CompVision));
    /// assert!(LockerState::Fault.can_transition_to(&LockerState::Vacant));
    /// ```
    #[must_use]
    pub fn can_transition_to(&self, target: &LockerState) -> bool {
        match (self, target) {
            (LockerState::Fault, LockerState::Fault) => false,
            (LockerState::Fault, _) => true,
            (_, LockerState::Fault) => true,
            (from, to) => from.next() == Some(*to),
        }
    }

    /// States whose exit is triggered by the owner presenting a tag.
    #[must_use]
    pub fn is_tag_driven(&self) -> bool {
        matches!(
            self,
            LockerState::Vacant
                | LockerState::UnlockedEmpty
                | LockerState::Loading
                | LockerState::Charging
                | LockerState::Unlocked
                | LockerState::Unloading
        )
    }

    /// Name used on the console (`to_<name>` commands) and in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LockerState::Vacant => "vacant",
            LockerState::UnlockedEmpty => "unlocked_empty",
            LockerState::Loading => "loading",
            LockerState::Closed => "closed",
            LockerState::CompVision => "compvision",
            LockerState::Charging => "charging",
            LockerState::Unlocked => "unlocked",
            LockerState::Unloading => "unloading",
            LockerState::Empty => "empty",
            LockerState::Fault => "fault",
        }
    }
}

impl fmt::Display for LockerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockerState::Vacant => "Vacant",
            LockerState::UnlockedEmpty => "UnlockedEmpty",
            LockerState::Loading => "Loading",
            LockerState::Closed => "Closed",
            LockerState::CompVision => "CompVision",
            LockerState::Charging => "Charging",
            LockerState::Unlocked => "Unlocked",
            LockerState::Unloading => "Unloading",
            LockerState::Empty => "Empty",
            LockerState::Fault => "Fault",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for LockerState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let state = match normalized.as_str() {
            "vacant" => LockerState::Vacant,
            "unlocked_empty" | "unlockedempty" => LockerState::UnlockedEmpty,
            "loading" => LockerState::Loading,
            "closed" => LockerState::Closed,
            "compvision" | "comp_vision" => LockerState::CompVision,
            "charging" => LockerState::Charging,
            "unlocked" => LockerState::Unlocked,
            "unloading" => LockerState::Unloading,
            "empty" => LockerState::Empty,
            "fault" => LockerState::Fault,
            _ => return Err(Error::UnknownState(s.to_string())),
        };
        Ok(state)
    }
}

/// Limit switch identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SwitchId {
    /// Sled fully out.
    Lim1,
    /// Reserved, not used as an interlock.
    Lim2,
    /// Sled fully in.
    Lim3,
    /// Door closed.
    Lim4,
}

impl SwitchId {
    pub const ALL: [SwitchId; LIMIT_SWITCH_COUNT] =
        [SwitchId::Lim1, SwitchId::Lim2, SwitchId::Lim3, SwitchId::Lim4];

    /// Switch pressed when the sled reaches its outer end stop.
    pub const SLED_OUT: SwitchId = SwitchId::Lim1;

    /// Switch pressed when the sled is home inside the bay.
    pub const SLED_IN: SwitchId = SwitchId::Lim3;

    /// Switch pressed while the door is shut.
    pub const DOOR_CLOSED: SwitchId = SwitchId::Lim4;

    /// Zero-based index into per-switch tables.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            SwitchId::Lim1 => 0,
            SwitchId::Lim2 => 1,
            SwitchId::Lim3 => 2,
            SwitchId::Lim4 => 3,
        }
    }

    /// Human readable role of the switch.
    #[must_use]
    pub fn role(&self) -> &'static str {
        match self {
            SwitchId::Lim1 => "sled-out",
            SwitchId::Lim2 => "reserved",
            SwitchId::Lim3 => "sled-in",
            SwitchId::Lim4 => "door-closed",
        }
    }
}

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LIM{}", self.index() + 1)
    }
}

impl std::str::FromStr for SwitchId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LIM1" | "1" => Ok(SwitchId::Lim1),
            "LIM2" | "2" => Ok(SwitchId::Lim2),
            "LIM3" | "3" => Ok(SwitchId::Lim3),
            "LIM4" | "4" => Ok(SwitchId::Lim4),
            _ => Err(Error::UnknownSwitch(s.to_string())),
        }
    }
}

/// Identifier of one occupancy cycle, minted when a tag is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
