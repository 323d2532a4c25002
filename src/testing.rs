//! In-memory fakes for the device and persistence collaborators.
//!
//! Used across the crate's test modules to script acquisition, stop, upload
//! and metadata failures.

use crate::capture::{DeviceTrackHandle, DeviceTrackSource, Modality, OutputRef};
use crate::session::state::EvidenceRecord;
use crate::upload::{EvidenceIndex, EvidenceStorage, StoredObject};
use crate::utils::error::{AcquisitionError, MetadataError, StopError, UploadError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// How a fake handle behaves when stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopBehavior {
    Succeed,
    /// `stop()` errors, but a partial output is still recoverable.
    FailRecoverable,
    /// `stop()` errors and nothing is recoverable.
    FailUnrecoverable,
}

/// Scriptable device source for one modality.
pub(crate) struct FakeSource {
    modality: Modality,
    fail_acquire: bool,
    stop: StopBehavior,
    acquired: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl FakeSource {
    pub(crate) fn new(modality: Modality) -> Self {
        Self {
            modality,
            fail_acquire: false,
            stop: StopBehavior::Succeed,
            acquired: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn failing_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    pub(crate) fn with_stop(mut self, stop: StopBehavior) -> Self {
        self.stop = stop;
        self
    }

    pub(crate) fn acquired_count(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub(crate) fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceTrackSource for FakeSource {
    fn modality(&self) -> Modality {
        self.modality
    }

    async fn acquire(&self) -> Result<Box<dyn DeviceTrackHandle>, AcquisitionError> {
        if self.fail_acquire {
            return Err(AcquisitionError::Unavailable(self.modality.to_string()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeHandle {
            modality: self.modality,
            stop: self.stop,
            released: self.released.clone(),
        }))
    }
}

struct FakeHandle {
    modality: Modality,
    stop: StopBehavior,
    released: Arc<AtomicUsize>,
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeviceTrackHandle for FakeHandle {
    async fn start(&mut self) -> Result<(), AcquisitionError> {
        Ok(())
    }

    async fn stop(&mut self) -> Result<OutputRef, StopError> {
        match self.stop {
            StopBehavior::Succeed => Ok(OutputRef::new(format!(
                "/tmp/capture-{}.bin",
                self.modality
            ))),
            _ => Err(StopError(format!("{} encoder crashed", self.modality))),
        }
    }

    fn recover_partial(&mut self) -> Option<OutputRef> {
        match self.stop {
            StopBehavior::FailRecoverable => Some(OutputRef::new(format!(
                "/tmp/partial-{}.bin",
                self.modality
            ))),
            _ => None,
        }
    }
}

/// In-memory storage bucket; can be scripted to fail for destinations
/// containing a substring.
pub(crate) struct FakeStorage {
    fail_when: Option<String>,
    delay: Option<std::time::Duration>,
    attempts: Mutex<Vec<String>>,
    puts: Mutex<Vec<String>>,
}

impl FakeStorage {
    pub(crate) fn new() -> Self {
        Self {
            fail_when: None,
            delay: None,
            attempts: Mutex::new(Vec::new()),
            puts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_when(mut self, substring: &str) -> Self {
        self.fail_when = Some(substring.to_string());
        self
    }

    /// Make every `put` take this long, like a slow network.
    pub(crate) fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Destinations of every attempted upload, failed or not.
    pub(crate) fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }

    /// Destinations of uploads that succeeded.
    pub(crate) fn successful_puts(&self) -> Vec<String> {
        self.puts.lock().clone()
    }
}

#[async_trait]
impl EvidenceStorage for FakeStorage {
    async fn put(
        &self,
        _output: &OutputRef,
        destination: &str,
    ) -> Result<StoredObject, UploadError> {
        self.attempts.lock().push(destination.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(pattern) = &self.fail_when {
            if destination.contains(pattern.as_str()) {
                return Err(UploadError("simulated network failure".to_string()));
            }
        }
        self.puts.lock().push(destination.to_string());
        Ok(StoredObject {
            url: format!("https://storage.test/{destination}"),
            path: destination.to_string(),
        })
    }
}

/// In-memory metadata store.
pub(crate) struct FakeIndex {
    fail: bool,
    records: Mutex<Vec<EvidenceRecord>>,
}

impl FakeIndex {
    pub(crate) fn new() -> Self {
        Self {
            fail: false,
            records: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub(crate) fn records(&self) -> Vec<EvidenceRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl EvidenceIndex for FakeIndex {
    async fn create_record(
        &self,
        _user_id: &str,
        record: &EvidenceRecord,
    ) -> Result<String, MetadataError> {
        if self.fail {
            return Err(MetadataError("index offline".to_string()));
        }
        let mut records = self.records.lock();
        records.push(record.clone());
        Ok(format!("record-{}", records.len()))
    }
}
