//! Error types and handling
//!
//! Failure taxonomy for the capture core. Every variant here is absorbed at
//! the narrowest possible scope (one track, or one persistence step) and
//! converted into an empty outcome for that track; none of them ever reach
//! the orchestrator's caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to obtain a device track handle for one modality.
///
/// Isolated to the failing track; the sibling track is unaffected.
#[derive(Error, Debug, Clone)]
pub enum AcquisitionError {
    #[error("permission denied for {0}")]
    PermissionDenied(String),

    #[error("device unavailable: {0}")]
    Unavailable(String),

    #[error("device busy: {0}")]
    Busy(String),

    #[error("acquisition failed: {0}")]
    Other(String),
}

/// Failure while finalizing a track.
///
/// Recoverable if the handle still exposes a partial output reference.
#[derive(Error, Debug, Clone)]
#[error("stop failed: {0}")]
pub struct StopError(pub String);

/// Failure to upload recorded bytes to durable storage.
#[derive(Error, Debug, Clone)]
#[error("upload failed: {0}")]
pub struct UploadError(pub String);

/// Failure to write the evidence metadata record after a successful upload.
///
/// Logged only; the uploaded bytes are never retracted.
#[derive(Error, Debug, Clone)]
#[error("metadata write failed: {0}")]
pub struct MetadataError(pub String);

/// Failure of the persistence step for one track.
#[derive(Error, Debug, Clone)]
pub enum PersistError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Failure description kept for the app layer's telemetry, never raised to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub code: String,
    pub message: String,
}

impl FailureReport {
    pub fn acquisition(error: &AcquisitionError) -> Self {
        let code = match error {
            AcquisitionError::PermissionDenied(_) => "PERMISSION_DENIED",
            AcquisitionError::Unavailable(_) => "DEVICE_UNAVAILABLE",
            AcquisitionError::Busy(_) => "DEVICE_BUSY",
            AcquisitionError::Other(_) => "ACQUISITION_FAILED",
        };
        Self {
            code: code.to_string(),
            message: error.to_string(),
        }
    }

    pub fn stop(error: &StopError) -> Self {
        Self {
            code: "STOP_FAILED".to_string(),
            message: error.to_string(),
        }
    }

    pub fn persist(error: &PersistError) -> Self {
        let code = match error {
            PersistError::Upload(_) => "UPLOAD_FAILED",
            PersistError::Metadata(_) => "METADATA_FAILED",
        };
        Self {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}
