//! Interlock wait.
//!
//! A transition only commits once the plant has confirmed each step through
//! a limit switch. The wait is cooperative: it polls the pin, sleeps between
//! reads, and gives up on a deadline or when the shutdown token fires.

use crate::error::InterlockError;
use bikelocker_core::SwitchId;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Synchronous access to the physical switch levels.
pub trait SwitchReader {
    fn get_current_value(&self, switch: SwitchId) -> bool;
}

/// Wait until `switch` reads `expected`.
///
/// The pin is read immediately and then every `poll_interval`. The last read
/// happens at the deadline, so a level reached exactly at `timeout` still
/// counts.
///
/// # Errors
///
/// - [`InterlockError::Timeout`] when the deadline passes first.
/// - [`InterlockError::Cancelled`] when `cancel` fires first.
///
/// # Examples
///
/// ```
/// use bikelocker_controller::interlock::{SwitchReader, wait_for_switch};
/// use bikelocker_core::SwitchId;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// struct AlwaysPressed;
///
/// impl SwitchReader for AlwaysPressed {
///     fn get_current_value(&self, _switch: SwitchId) -> bool {
///         true
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cancel = CancellationToken::new();
/// wait_for_switch(
///     &AlwaysPressed,
///     SwitchId::DOOR_CLOSED,
///     true,
///     Duration::from_millis(100),
///     Duration::from_secs(1),
///     &cancel,
/// )
/// .await
/// .unwrap();
/// # }
/// ```
pub async fn wait_for_switch<R>(
    reader: &R,
    switch: SwitchId,
    expected: bool,
    poll_interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), InterlockError>
where
    R: SwitchReader + ?Sized,
{
    let start = Instant::now();
    let deadline = start + timeout;

    loop {
        if reader.get_current_value(switch) == expected {
            debug!(%switch, expected, waited = ?start.elapsed(), "Interlock satisfied");
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(InterlockError::Timeout {
                switch,
                expected,
                waited: now - start,
            });
        }

        trace!(%switch, expected, "Interlock not yet satisfied");
        let nap = poll_interval.min(deadline - now);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(InterlockError::Cancelled),
            _ = tokio::time::sleep(nap) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakePin {
        level: AtomicBool,
        reads: AtomicUsize,
    }

    impl SwitchReader for FakePin {
        fn get_current_value(&self, _switch: SwitchId) -> bool {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.level.load(Ordering::SeqCst)
        }
    }

    const POLL: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn test_satisfied_immediately_reads_once() {
        let pin = FakePin::default();
        pin.level.store(true, Ordering::SeqCst);

        wait_for_switch(&pin, SwitchId::Lim1, true, POLL, POLL * 10, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(pin.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_within_one_poll_of_change() {
        let pin = Arc::new(FakePin::default());
        let setter = pin.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            setter.level.store(true, Ordering::SeqCst);
        });

        let start = Instant::now();
        wait_for_switch(
            pin.as_ref(),
            SwitchId::Lim1,
            true,
            POLL,
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(250));
        assert!(waited <= Duration::from_millis(250) + POLL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_switch_and_duration() {
        let pin = FakePin::default();
        let timeout = Duration::from_millis(1_000);

        let err = wait_for_switch(
            &pin,
            SwitchId::Lim4,
            true,
            POLL,
            timeout,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        match err {
            InterlockError::Timeout {
                switch,
                expected,
                waited,
            } => {
                assert_eq!(switch, SwitchId::Lim4);
                assert!(expected);
                assert!(waited >= timeout && waited < timeout + POLL);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_ends_wait() {
        let pin = FakePin::default();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let err = wait_for_switch(&pin, SwitchId::Lim3, true, POLL, Duration::from_secs(30), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, InterlockError::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_release() {
        let pin = FakePin::default();
        pin.level.store(false, Ordering::SeqCst);

        wait_for_switch(&pin, SwitchId::Lim4, false, POLL, POLL, &CancellationToken::new())
            .await
            .unwrap();
    }
}
