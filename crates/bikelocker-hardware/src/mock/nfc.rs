//! Mock NFC presence reader.
//!
//! The handle places a tag in the field or removes it; the reader reports
//! whatever is in the field each time it is polled, the way a passive
//! ISO14443A target keeps answering while it is held against the antenna.

use super::FailureInjector;
use crate::traits::NfcReader;
use crate::types::{ReaderInfo, TagRead};
use crate::{HardwareError, Result};
use bikelocker_core::TagId;
use bikelocker_core::constants::DEFAULT_NFC_POLL_TIMEOUT_MS;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Mock NFC reader.
///
/// # Examples
///
/// ```
/// use bikelocker_core::TagId;
/// use bikelocker_hardware::mock::MockNfcReader;
/// use bikelocker_hardware::traits::NfcReader;
///
/// #[tokio::main]
/// async fn main() -> bikelocker_hardware::Result<()> {
///     let (mut reader, handle) = MockNfcReader::new();
///     reader.init().await?;
///
///     let tag = TagId::new(vec![0x04, 0xAB, 0xCD, 0xEF]).unwrap();
///     handle.present(tag.clone());
///
///     let read = reader.poll().await?.expect("tag in field");
///     assert_eq!(read.tag, tag);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockNfcReader {
    // Held so the field outlives every handle.
    _field: Arc<watch::Sender<Option<TagId>>>,
    presence: watch::Receiver<Option<TagId>>,
    name: String,
    poll_timeout: Duration,
    initialized: bool,
    init_failures: FailureInjector,
    poll_failures: FailureInjector,
    init_attempts: Arc<AtomicU32>,
    polls: Arc<AtomicU64>,
}

impl MockNfcReader {
    /// Create a mock reader with the default listening window.
    pub fn new() -> (Self, MockNfcReaderHandle) {
        Self::with_poll_timeout(Duration::from_millis(DEFAULT_NFC_POLL_TIMEOUT_MS))
    }

    /// Create a mock reader that listens for `poll_timeout` per poll.
    pub fn with_poll_timeout(poll_timeout: Duration) -> (Self, MockNfcReaderHandle) {
        let (field, presence) = watch::channel(None);
        let field = Arc::new(field);
        let init_failures = FailureInjector::default();
        let poll_failures = FailureInjector::default();
        let init_attempts = Arc::new(AtomicU32::new(0));
        let polls = Arc::new(AtomicU64::new(0));

        let handle = MockNfcReaderHandle {
            field: field.clone(),
            init_failures: init_failures.clone(),
            poll_failures: poll_failures.clone(),
            init_attempts: init_attempts.clone(),
            polls: polls.clone(),
        };

        let reader = Self {
            _field: field,
            presence,
            name: "Mock PN532".to_string(),
            poll_timeout,
            initialized: false,
            init_failures,
            poll_failures,
            init_attempts,
            polls,
        };

        (reader, handle)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn in_field(&mut self) -> Option<TagRead> {
        self.presence.borrow_and_update().clone().map(TagRead::new)
    }
}

impl NfcReader for MockNfcReader {
    async fn init(&mut self) -> Result<()> {
        self.init_attempts.fetch_add(1, Ordering::SeqCst);
        self.init_failures
            .check("nfc init")
            .map_err(|e| HardwareError::initialization_failed(e.to_string()))?;
        self.initialized = true;
        Ok(())
    }

    async fn poll(&mut self) -> Result<Option<TagRead>> {
        self.polls.fetch_add(1, Ordering::SeqCst);

        if !self.initialized {
            return Err(HardwareError::disconnected(self.name.clone()));
        }
        self.poll_failures.check("nfc poll")?;

        if let Some(read) = self.in_field() {
            return Ok(Some(read));
        }

        // Listen for the rest of the window; a tag arriving mid-window answers.
        match tokio::time::timeout(self.poll_timeout, self.presence.changed()).await {
            Ok(Ok(())) => Ok(self.in_field()),
            Ok(Err(_)) | Err(_) => Ok(None),
        }
    }

    async fn get_reader_info(&self) -> Result<ReaderInfo> {
        Ok(
            ReaderInfo::new(self.name.clone(), vec!["ISO14443A".to_string()])
                .with_firmware_version("mock"),
        )
    }
}

/// Handle for controlling a mock NFC reader.
#[derive(Debug, Clone)]
pub struct MockNfcReaderHandle {
    field: Arc<watch::Sender<Option<TagId>>>,
    init_failures: FailureInjector,
    poll_failures: FailureInjector,
    init_attempts: Arc<AtomicU32>,
    polls: Arc<AtomicU64>,
}

impl MockNfcReaderHandle {
    /// Hold `tag` in the reader's field until [`remove`](Self::remove).
    pub fn present(&self, tag: TagId) {
        self.field.send_replace(Some(tag));
    }

    /// Take the tag out of the field.
    pub fn remove(&self) {
        self.field.send_replace(None);
    }

    /// Tag currently in the field.
    pub fn current(&self) -> Option<TagId> {
        self.field.borrow().clone()
    }

    /// Fail the next `count` init attempts.
    pub fn fail_init(&self, count: u32) {
        self.init_failures.arm(count);
    }

    /// Fail every init attempt.
    pub fn fail_init_always(&self) {
        self.init_failures.arm_always();
    }

    /// Fail the next `count` polls.
    pub fn fail_polls(&self, count: u32) {
        self.poll_failures.arm(count);
    }

    pub fn init_attempts(&self) -> u32 {
        self.init_attempts.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> u64 {
        self.polls.load(Ordering::SeqCst)
    }
}
