//! Capture session module
//!
//! Implements the evidence-capture core:
//! - per-modality track controllers racing timeout against cancellation
//! - the orchestrator that runs both tracks and aggregates their outcomes
//! - the session/track state machine and evidence record types

pub mod orchestrator;
pub mod state;
pub(crate) mod track;

pub use orchestrator::{CaptureEvent, CaptureOrchestrator, SessionHandle};
pub use state::{
    CaptureConfig, CaptureSession, EvidenceRecord, MediaTrack, SessionResult, SessionStatus,
    TrackState,
};
