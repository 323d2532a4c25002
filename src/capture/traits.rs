//! Capture trait definitions
//!
//! Platform-agnostic seam between the capture core and the device layer.
//! The surrounding app supplies one [`DeviceTrackSource`] per modality,
//! backed by whatever hardware APIs the platform exposes; the core never
//! touches hardware directly.

use crate::utils::error::{AcquisitionError, StopError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One of the two hardware media streams a session records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Audio,
    Video,
}

impl Modality {
    /// File extension used when building storage destination paths.
    pub fn extension(&self) -> &'static str {
        match self {
            Modality::Audio => "m4a",
            Modality::Video => "mp4",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Audio => write!(f, "audio"),
            Modality::Video => write!(f, "video"),
        }
    }
}

/// Opaque reference to recorded bytes on the local device.
///
/// Produced by a device handle when a track stops; consumed by the upload
/// pipeline. The core never inspects the bytes themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRef {
    /// Local path to the recorded media file.
    pub local_path: PathBuf,
}

impl OutputRef {
    pub fn new(local_path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: local_path.into(),
        }
    }
}

/// A live hardware capture handle for one modality.
///
/// Owned exclusively by one track controller. Dropping the handle releases
/// the underlying hardware, so every controller exit path releases exactly
/// once.
#[async_trait]
pub trait DeviceTrackHandle: Send {
    /// Begin recording.
    async fn start(&mut self) -> Result<(), AcquisitionError>;

    /// Stop recording and return a reference to the recorded bytes.
    async fn stop(&mut self) -> Result<OutputRef, StopError>;

    /// Best-effort recovery after a failed [`stop`](Self::stop): whatever
    /// partial output the device still exposes, if any.
    fn recover_partial(&mut self) -> Option<OutputRef>;
}

/// Factory for device track handles of one modality.
#[async_trait]
pub trait DeviceTrackSource: Send + Sync {
    /// The modality this source records.
    fn modality(&self) -> Modality;

    /// Acquire the hardware for this modality.
    async fn acquire(&self) -> Result<Box<dyn DeviceTrackHandle>, AcquisitionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modality_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Modality::Audio).unwrap(), "\"audio\"");
        assert_eq!(serde_json::to_string(&Modality::Video).unwrap(), "\"video\"");
    }

    #[test]
    fn modality_extensions() {
        assert_eq!(Modality::Audio.extension(), "m4a");
        assert_eq!(Modality::Video.extension(), "mp4");
    }
}
