//! Limit switch monitor.
//!
//! Keeps a logical level per switch, updated from edge notifications by a
//! background task and readable synchronously from anywhere.
//!
//! ```text
//!   switch bank ISR ──on_edge──► bounded queue ──► monitor task ──► AtomicBool x4
//!                                                                      │
//!   interlock wait ──get_current_value──► switch bank (direct read)    ▼
//!                                                         state() / snapshot()
//! ```
//!
//! The interrupt side never blocks: when the queue is full the edge is
//! dropped. The snapshot may lag the pins by the rate-limit delay; the
//! interlock wait therefore always confirms through
//! [`get_current_value`](LimitSwitchMonitorHandle::get_current_value).

use crate::interlock::SwitchReader;
use bikelocker_core::constants::LIMIT_SWITCH_COUNT;
use bikelocker_core::{MonitorConfig, SwitchId};
use bikelocker_hardware::{AnySwitchBank, EdgeNotifier, Result, SwitchBank};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

#[derive(Debug)]
struct MonitorShared {
    bank: AnySwitchBank,
    levels: [AtomicBool; LIMIT_SWITCH_COUNT],
    edges: [AtomicU64; LIMIT_SWITCH_COUNT],
}

/// Levels of all four switches at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SwitchLevels {
    pub lim1: bool,
    pub lim2: bool,
    pub lim3: bool,
    pub lim4: bool,
}

impl SwitchLevels {
    pub fn get(&self, switch: SwitchId) -> bool {
        match switch {
            SwitchId::Lim1 => self.lim1,
            SwitchId::Lim2 => self.lim2,
            SwitchId::Lim3 => self.lim3,
            SwitchId::Lim4 => self.lim4,
        }
    }
}

/// Limit switch monitor, before start.
#[derive(Debug)]
pub struct LimitSwitchMonitor {
    bank: AnySwitchBank,
    config: MonitorConfig,
}

impl LimitSwitchMonitor {
    pub fn new(bank: AnySwitchBank, config: MonitorConfig) -> Self {
        Self { bank, config }
    }

    /// Install the edge handler, seed the snapshot and spawn the updater.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::EdgeHandlerInstall`](bikelocker_hardware::HardwareError::EdgeHandlerInstall)
    /// if the bank refuses the handler. Nothing is spawned in that case.
    pub fn start(
        mut self,
        cancel: CancellationToken,
    ) -> Result<(LimitSwitchMonitorHandle, JoinHandle<()>)> {
        let (notifier, edges) = EdgeNotifier::channel(self.config.queue_capacity);
        self.bank.install_edge_handler(notifier.clone())?;

        let levels = SwitchId::ALL.map(|switch| AtomicBool::new(self.bank.read_level(switch)));
        let shared = Arc::new(MonitorShared {
            bank: self.bank,
            levels,
            edges: Default::default(),
        });

        let handle = LimitSwitchMonitorHandle {
            shared: shared.clone(),
            notifier,
        };
        info!(levels = ?handle.snapshot(), "Limit switch monitor started");

        let task = tokio::spawn(Self::run(shared, edges, self.config.rate_limit(), cancel));
        Ok((handle, task))
    }

    async fn run(
        shared: Arc<MonitorShared>,
        mut edges: mpsc::Receiver<SwitchId>,
        rate_limit: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            let switch = tokio::select! {
                _ = cancel.cancelled() => break,
                next = edges.recv() => match next {
                    Some(switch) => switch,
                    None => break,
                },
            };

            let level = shared.bank.read_level(switch);
            shared.levels[switch.index()].store(level, Ordering::SeqCst);
            let count = shared.edges[switch.index()].fetch_add(1, Ordering::Relaxed) + 1;
            trace!(%switch, role = switch.role(), level, count, "Limit switch edge");

            if shared.levels[SwitchId::SLED_OUT.index()].load(Ordering::SeqCst)
                && shared.levels[SwitchId::SLED_IN.index()].load(Ordering::SeqCst)
            {
                warn!("Sled-out and sled-in switches both pressed");
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(rate_limit) => {}
            }
        }

        debug!("Limit switch monitor stopped");
    }
}

/// Read side of a running monitor.
#[derive(Debug, Clone)]
pub struct LimitSwitchMonitorHandle {
    shared: Arc<MonitorShared>,
    notifier: EdgeNotifier,
}

impl LimitSwitchMonitorHandle {
    /// Level as last recorded by the monitor task.
    pub fn state(&self, switch: SwitchId) -> bool {
        self.shared.levels[switch.index()].load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> SwitchLevels {
        SwitchLevels {
            lim1: self.state(SwitchId::Lim1),
            lim2: self.state(SwitchId::Lim2),
            lim3: self.state(SwitchId::Lim3),
            lim4: self.state(SwitchId::Lim4),
        }
    }

    /// Direct synchronous read of the pin.
    pub fn get_current_value(&self, switch: SwitchId) -> bool {
        self.shared.bank.read_level(switch)
    }

    /// Edges processed for `switch` since start.
    pub fn edge_count(&self, switch: SwitchId) -> u64 {
        self.shared.edges[switch.index()].load(Ordering::Relaxed)
    }

    /// Edges lost because the queue was full.
    pub fn dropped_edges(&self) -> u64 {
        self.notifier.dropped()
    }
}

impl SwitchReader for LimitSwitchMonitorHandle {
    fn get_current_value(&self, switch: SwitchId) -> bool {
        LimitSwitchMonitorHandle::get_current_value(self, switch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bikelocker_hardware::HardwareError;
    use bikelocker_hardware::mock::MockSwitchBank;

    fn config() -> MonitorConfig {
        MonitorConfig::default()
    }

    #[tokio::test]
    async fn test_start_seeds_snapshot() {
        let (bank, _switches) = MockSwitchBank::docked();
        let monitor = LimitSwitchMonitor::new(bank.into(), config());
        let (handle, _task) = monitor.start(CancellationToken::new()).unwrap();

        assert_eq!(
            handle.snapshot(),
            SwitchLevels {
                lim1: false,
                lim2: false,
                lim3: true,
                lim4: true,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_edge_updates_state() {
        let (bank, switches) = MockSwitchBank::docked();
        let (handle, _task) = LimitSwitchMonitor::new(bank.into(), config())
            .start(CancellationToken::new())
            .unwrap();

        switches.release(SwitchId::DOOR_CLOSED);
        assert!(!handle.get_current_value(SwitchId::DOOR_CLOSED));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.state(SwitchId::DOOR_CLOSED));
        assert_eq!(handle.edge_count(SwitchId::DOOR_CLOSED), 1);
        assert_eq!(handle.edge_count(SwitchId::SLED_OUT), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_spaces_updates() {
        let (bank, switches) = MockSwitchBank::new();
        let (handle, _task) = LimitSwitchMonitor::new(bank.into(), config())
            .start(CancellationToken::new())
            .unwrap();

        switches.press(SwitchId::Lim1);
        switches.press(SwitchId::Lim2);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.state(SwitchId::Lim1));
        assert!(!handle.state(SwitchId::Lim2));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.state(SwitchId::Lim2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounce_converges_despite_dropped_edges() {
        let (bank, switches) = MockSwitchBank::new();
        let monitor_config = MonitorConfig {
            queue_capacity: 2,
            ..config()
        };
        let (handle, _task) = LimitSwitchMonitor::new(bank.into(), monitor_config)
            .start(CancellationToken::new())
            .unwrap();

        switches.bounce(SwitchId::Lim3, 9, true);
        assert!(handle.dropped_edges() > 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(handle.state(SwitchId::Lim3));
        assert!(handle.get_current_value(SwitchId::Lim3));
    }

    #[tokio::test]
    async fn test_install_failure_aborts_start() {
        let (bank, _switches) = MockSwitchBank::new();
        let bank = bank.fail_install(SwitchId::Lim2);

        let result = LimitSwitchMonitor::new(bank.into(), config()).start(CancellationToken::new());
        assert!(matches!(
            result,
            Err(HardwareError::EdgeHandlerInstall {
                switch: SwitchId::Lim2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_cancel_stops_task() {
        let (bank, _switches) = MockSwitchBank::new();
        let cancel = CancellationToken::new();
        let (_handle, task) = LimitSwitchMonitor::new(bank.into(), config())
            .start(cancel.clone())
            .unwrap();

        cancel.cancel();
        task.await.unwrap();
    }
}
