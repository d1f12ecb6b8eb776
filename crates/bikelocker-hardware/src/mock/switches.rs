//! Mock limit switch bank.
//!
//! Levels live in atomics shared with the handle. Changing a level through
//! the handle fires the installed edge notifier from the caller's context,
//! the same way a GPIO interrupt would.

use crate::edge::EdgeNotifier;
use crate::traits::SwitchBank;
use crate::{HardwareError, Result};
use bikelocker_core::SwitchId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

#[derive(Debug, Default)]
struct BankState {
    levels: [AtomicBool; 4],
    notifier: OnceLock<EdgeNotifier>,
}

impl BankState {
    fn level(&self, switch: SwitchId) -> bool {
        self.levels[switch.index()].load(Ordering::SeqCst)
    }
}

/// Mock bank of four limit switches.
///
/// # Examples
///
/// ```
/// use bikelocker_core::SwitchId;
/// use bikelocker_hardware::EdgeNotifier;
/// use bikelocker_hardware::mock::MockSwitchBank;
/// use bikelocker_hardware::traits::SwitchBank;
///
/// let (mut bank, handle) = MockSwitchBank::docked();
/// let (notifier, mut edges) = EdgeNotifier::channel(10);
/// bank.install_edge_handler(notifier).unwrap();
///
/// handle.release(SwitchId::DOOR_CLOSED);
/// assert!(!bank.read_level(SwitchId::DOOR_CLOSED));
/// assert_eq!(edges.try_recv().ok(), Some(SwitchId::DOOR_CLOSED));
/// ```
#[derive(Debug)]
pub struct MockSwitchBank {
    state: Arc<BankState>,
    install_failure: Option<SwitchId>,
}

impl MockSwitchBank {
    /// All switches released.
    pub fn new() -> (Self, MockSwitchBankHandle) {
        let state = Arc::new(BankState::default());
        let handle = MockSwitchBankHandle {
            state: state.clone(),
        };
        (
            Self {
                state,
                install_failure: None,
            },
            handle,
        )
    }

    /// Sled home and door shut: LIM3 and LIM4 pressed.
    pub fn docked() -> (Self, MockSwitchBankHandle) {
        let (bank, handle) = Self::new();
        handle.set_quiet(SwitchId::SLED_IN, true);
        handle.set_quiet(SwitchId::DOOR_CLOSED, true);
        (bank, handle)
    }

    /// Make edge handler installation fail for `switch`.
    pub fn fail_install(mut self, switch: SwitchId) -> Self {
        self.install_failure = Some(switch);
        self
    }
}

impl SwitchBank for MockSwitchBank {
    fn read_level(&self, switch: SwitchId) -> bool {
        self.state.level(switch)
    }

    fn install_edge_handler(&mut self, notifier: EdgeNotifier) -> Result<()> {
        if let Some(switch) = self.install_failure {
            return Err(HardwareError::edge_handler_install(
                switch,
                "injected install failure",
            ));
        }

        self.state.notifier.set(notifier).map_err(|_| {
            HardwareError::edge_handler_install(SwitchId::Lim1, "edge handler already installed")
        })
    }
}

/// Handle for driving a mock switch bank.
#[derive(Debug, Clone)]
pub struct MockSwitchBankHandle {
    state: Arc<BankState>,
}

impl MockSwitchBankHandle {
    pub fn level(&self, switch: SwitchId) -> bool {
        self.state.level(switch)
    }

    pub fn press(&self, switch: SwitchId) {
        self.set(switch, true);
    }

    pub fn release(&self, switch: SwitchId) {
        self.set(switch, false);
    }

    /// Set a level, firing an edge if it changed.
    pub fn set(&self, switch: SwitchId, pressed: bool) {
        let previous = self.state.levels[switch.index()].swap(pressed, Ordering::SeqCst);
        if previous != pressed {
            self.fire(switch);
        }
    }

    /// Toggle a switch `count` times in a row, ending on `settle`.
    ///
    /// Models contact bounce: the monitor sees a burst of edges.
    pub fn bounce(&self, switch: SwitchId, count: usize, settle: bool) {
        for _ in 0..count {
            let level = self.level(switch);
            self.set(switch, !level);
        }
        self.set(switch, settle);
    }

    /// Fire an edge without changing the level.
    pub fn fire(&self, switch: SwitchId) {
        if let Some(notifier) = self.state.notifier.get() {
            notifier.on_edge(switch);
        }
    }

    pub fn edge_handler_installed(&self) -> bool {
        self.state.notifier.get().is_some()
    }

    /// Edges dropped by the notifier because the queue was full.
    pub fn dropped_edges(&self) -> u64 {
        self.state.notifier.get().map_or(0, EdgeNotifier::dropped)
    }

    fn set_quiet(&self, switch: SwitchId, pressed: bool) {
        self.state.levels[switch.index()].store(pressed, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docked_levels() {
        let (bank, _handle) = MockSwitchBank::docked();
        assert!(!bank.read_level(SwitchId::Lim1));
        assert!(!bank.read_level(SwitchId::Lim2));
        assert!(bank.read_level(SwitchId::Lim3));
        assert!(bank.read_level(SwitchId::Lim4));
    }

    #[test]
    fn test_press_fires_edge_once() {
        let (mut bank, handle) = MockSwitchBank::new();
        let (notifier, mut rx) = EdgeNotifier::channel(10);
        bank.install_edge_handler(notifier).unwrap();
        assert!(handle.edge_handler_installed());

        handle.press(SwitchId::Lim1);
        handle.press(SwitchId::Lim1);

        assert_eq!(rx.try_recv().ok(), Some(SwitchId::Lim1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_edges_before_install_are_lost() {
        let (mut bank, handle) = MockSwitchBank::new();
        handle.press(SwitchId::Lim2);

        let (notifier, mut rx) = EdgeNotifier::channel(10);
        bank.install_edge_handler(notifier).unwrap();
        assert!(rx.try_recv().is_err());
        assert!(bank.read_level(SwitchId::Lim2));
    }

    #[test]
    fn test_bounce_overflows_small_queue() {
        let (mut bank, handle) = MockSwitchBank::new();
        let (notifier, _rx) = EdgeNotifier::channel(2);
        bank.install_edge_handler(notifier).unwrap();

        handle.bounce(SwitchId::Lim4, 6, true);
        assert!(handle.level(SwitchId::Lim4));
        assert!(handle.dropped_edges() > 0);
    }

    #[test]
    fn test_install_failure() {
        let (bank, _handle) = MockSwitchBank::new();
        let mut bank = bank.fail_install(SwitchId::Lim3);
        let (notifier, _rx) = EdgeNotifier::channel(10);

        let err = bank.install_edge_handler(notifier).unwrap_err();
        assert!(matches!(
            err,
            HardwareError::EdgeHandlerInstall {
                switch: SwitchId::Lim3,
                ..
            }
        ));
    }

    #[test]
    fn test_second_install_rejected() {
        let (mut bank, _handle) = MockSwitchBank::new();
        let (first, _rx1) = EdgeNotifier::channel(10);
        let (second, _rx2) = EdgeNotifier::channel(10);

        bank.install_edge_handler(first).unwrap();
        assert!(bank.install_edge_handler(second).is_err());
    }
}
