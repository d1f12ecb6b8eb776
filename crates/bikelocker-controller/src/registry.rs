//! Single-slot tag registry: whose bike occupies the locker.

use crate::error::RegistryError;
use bikelocker_core::{SessionId, TagId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of comparing a presented tag with the registered one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagCheck {
    /// Same length, same bytes.
    Matched,
    /// Anything else, including an empty slot.
    Different,
}

/// The occupant of the locker.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub tag: TagId,
    pub session: SessionId,
    pub registered_at: DateTime<Utc>,
}

/// Tag registry.
///
/// # Examples
///
/// ```
/// use bikelocker_controller::registry::{TagCheck, TagRegistry};
/// use bikelocker_core::TagId;
///
/// let mut registry = TagRegistry::new();
/// let owner = TagId::new(vec![0xAA, 0xBB]).unwrap();
///
/// registry.new_tag(owner.clone()).unwrap();
/// assert_eq!(registry.check_tag(&owner), TagCheck::Matched);
///
/// registry.delete_tag();
/// assert!(registry.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct TagRegistry {
    slot: Option<Registration>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tag` if the slot is empty.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyOccupied`] and leaves the slot
    /// untouched if a tag is already registered.
    pub fn new_tag(&mut self, tag: TagId) -> Result<(), RegistryError> {
        if let Some(current) = &self.slot {
            return Err(RegistryError::AlreadyOccupied {
                current: current.tag.to_hex(),
            });
        }

        self.slot = Some(Registration {
            tag,
            session: SessionId::new(),
            registered_at: Utc::now(),
        });
        Ok(())
    }

    pub fn check_tag(&self, tag: &TagId) -> TagCheck {
        match &self.slot {
            Some(registration) if registration.tag == *tag => TagCheck::Matched,
            _ => TagCheck::Different,
        }
    }

    /// Clear the slot. Idempotent.
    pub fn delete_tag(&mut self) -> Option<Registration> {
        self.slot.take()
    }

    pub fn current(&self) -> Option<&TagId> {
        self.slot.as_ref().map(|registration| &registration.tag)
    }

    pub fn registration(&self) -> Option<&Registration> {
        self.slot.as_ref()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.slot.as_ref().map(|registration| registration.session)
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tag(bytes: &[u8]) -> TagId {
        TagId::new(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_new_tag_on_empty_registry() {
        let mut registry = TagRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.session_id().is_none());

        registry.new_tag(tag(&[0xAA, 0xBB])).unwrap();
        assert_eq!(registry.current(), Some(&tag(&[0xAA, 0xBB])));
        assert!(registry.session_id().is_some());
    }

    #[test]
    fn test_new_tag_when_occupied_leaves_registry_unchanged() {
        let mut registry = TagRegistry::new();
        registry.new_tag(tag(&[0xAA, 0xBB])).unwrap();
        let session = registry.session_id();

        let err = registry.new_tag(tag(&[0x01])).unwrap_err();
        assert_eq!(
            err,
            RegistryError::AlreadyOccupied {
                current: "AABB".to_string()
            }
        );
        assert_eq!(registry.current(), Some(&tag(&[0xAA, 0xBB])));
        assert_eq!(registry.session_id(), session);
    }

    #[test]
    fn test_same_tag_twice_is_still_a_conflict() {
        let mut registry = TagRegistry::new();
        registry.new_tag(tag(&[0xAA])).unwrap();
        assert!(registry.new_tag(tag(&[0xAA])).is_err());
    }

    #[rstest]
    #[case::identical(&[0xAA, 0xBB], TagCheck::Matched)]
    #[case::last_byte(&[0xAA, 0xBC], TagCheck::Different)]
    #[case::first_byte(&[0xAB, 0xBB], TagCheck::Different)]
    #[case::shorter(&[0xAA], TagCheck::Different)]
    #[case::longer(&[0xAA, 0xBB, 0x00], TagCheck::Different)]
    fn test_check_tag(#[case] presented: &[u8], #[case] expected: TagCheck) {
        let mut registry = TagRegistry::new();
        registry.new_tag(tag(&[0xAA, 0xBB])).unwrap();
        assert_eq!(registry.check_tag(&tag(presented)), expected);
    }

    #[test]
    fn test_check_tag_on_empty_registry() {
        let registry = TagRegistry::new();
        assert_eq!(registry.check_tag(&tag(&[0xAA, 0xBB])), TagCheck::Different);
    }

    #[test]
    fn test_delete_tag_is_idempotent() {
        let mut registry = TagRegistry::new();
        registry.new_tag(tag(&[0x01, 0x02])).unwrap();

        let removed = registry.delete_tag().unwrap();
        assert_eq!(removed.tag, tag(&[0x01, 0x02]));
        assert!(registry.is_empty());

        assert!(registry.delete_tag().is_none());
        assert!(registry.is_empty());

        registry.new_tag(tag(&[0x03])).unwrap();
        assert_eq!(registry.current(), Some(&tag(&[0x03])));
    }

    #[test]
    fn test_each_registration_gets_a_fresh_session() {
        let mut registry = TagRegistry::new();
        registry.new_tag(tag(&[0x01])).unwrap();
        let first = registry.session_id();
        registry.delete_tag();
        registry.new_tag(tag(&[0x01])).unwrap();
        assert_ne!(registry.session_id(), first);
    }
}
