//! Sentinel capture core
//!
//! Emergency evidence capture for the Sentinel safety app. When an alert
//! fires, this crate acquires the microphone and camera concurrently,
//! records each for a bounded duration, survives either stream failing on
//! its own, supports covert mid-recording cancellation, and persists
//! whatever was captured.
//!
//! The surrounding app supplies the hardware and persistence collaborators
//! (see [`capture::DeviceTrackSource`], [`upload::EvidenceStorage`],
//! [`upload::EvidenceIndex`]); the core owns only the orchestration.

pub mod capture;
pub mod session;
pub mod upload;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use capture::{DeviceTrackHandle, DeviceTrackSource, Modality, OutputRef};
pub use session::{
    CaptureConfig, CaptureEvent, CaptureOrchestrator, CaptureSession, EvidenceRecord, MediaTrack,
    SessionHandle, SessionResult, SessionStatus, TrackState,
};
pub use upload::{EvidenceIndex, EvidenceStorage, StoredObject};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing for binaries embedding the capture core.
///
/// Safe to skip when the host app installs its own subscriber.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentinel_capture=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
