//! Evidence persistence pipeline
//!
//! Two sub-steps per track: upload the recorded bytes, then write the
//! metadata record. The steps are deliberately not transactional — if the
//! metadata write fails after a successful upload, the uploaded bytes stay
//! where they are. Evidence preservation wins over tidiness.

use crate::capture::{Modality, OutputRef};
use crate::session::state::EvidenceRecord;
use crate::utils::error::{MetadataError, PersistError, UploadError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Result of uploading one object to durable storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    /// URL the uploaded bytes are reachable at
    pub url: String,

    /// Bucket-relative path of the object
    pub path: String,
}

/// Durable storage collaborator (e.g. a cloud bucket client).
#[async_trait]
pub trait EvidenceStorage: Send + Sync {
    /// Upload the referenced bytes to `destination`.
    async fn put(&self, output: &OutputRef, destination: &str)
        -> Result<StoredObject, UploadError>;
}

/// Metadata store collaborator (e.g. a document database client).
#[async_trait]
pub trait EvidenceIndex: Send + Sync {
    /// Write one evidence record; returns the new record's id.
    async fn create_record(
        &self,
        user_id: &str,
        record: &EvidenceRecord,
    ) -> Result<String, MetadataError>;
}

/// Output of one stopped track, ready for persistence.
#[derive(Debug, Clone)]
pub(crate) struct StoppedCapture {
    pub modality: Modality,
    pub output: OutputRef,
    pub duration_seconds: f64,
    pub is_partial: bool,
    /// When the track stopped, stamped by the controller before any upload.
    pub recorded_at: DateTime<Utc>,
}

/// Persists stopped tracks: bytes first, then the evidence record.
pub struct EvidencePipeline {
    storage: Arc<dyn EvidenceStorage>,
    index: Arc<dyn EvidenceIndex>,
    storage_prefix: String,
}

impl EvidencePipeline {
    pub fn new(
        storage: Arc<dyn EvidenceStorage>,
        index: Arc<dyn EvidenceIndex>,
        storage_prefix: String,
    ) -> Self {
        Self {
            storage,
            index,
            storage_prefix,
        }
    }

    /// Storage destination for one track's bytes.
    fn destination(&self, user_id: &str, alert_id: &str, session_id: Uuid, modality: Modality) -> String {
        format!(
            "{}/{}/{}/{}-{}.{}",
            self.storage_prefix,
            user_id,
            alert_id,
            session_id,
            modality,
            modality.extension()
        )
    }

    /// Upload one stopped track and write its evidence record.
    ///
    /// Invoked once per track; a failure here affects this track only.
    /// `duration_seconds` and `recorded_at` are copied into the record
    /// verbatim, so a slow upload never shifts the evidence timestamp.
    pub(crate) async fn persist(
        &self,
        user_id: &str,
        alert_id: &str,
        session_id: Uuid,
        capture: &StoppedCapture,
    ) -> Result<EvidenceRecord, PersistError> {
        let destination = self.destination(user_id, alert_id, session_id, capture.modality);

        let stored = self.storage.put(&capture.output, &destination).await?;
        tracing::info!(
            modality = %capture.modality,
            path = %stored.path,
            "evidence uploaded"
        );

        let record = EvidenceRecord {
            kind: capture.modality,
            url: stored.url,
            storage_path: stored.path,
            duration_seconds: capture.duration_seconds,
            is_partial: capture.is_partial,
            alert_id: alert_id.to_string(),
            recorded_at: capture.recorded_at,
        };

        match self.index.create_record(user_id, &record).await {
            Ok(record_id) => {
                tracing::info!(modality = %capture.modality, %record_id, "evidence record written");
                Ok(record)
            }
            Err(error) => {
                // Uploaded bytes are not rolled back; the object can be
                // re-indexed or orphaned later.
                tracing::warn!(
                    modality = %capture.modality,
                    %error,
                    storage_path = %record.storage_path,
                    "metadata write failed after upload, keeping uploaded bytes"
                );
                Err(error.into())
            }
        }
    }
}
