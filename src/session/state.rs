//! Session state management
//!
//! Defines the capture session state machine, per-track lifecycle states,
//! and the persisted evidence record shape.

use crate::capture::{Modality, OutputRef};
use crate::utils::error::FailureReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current state of one capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Tracks are recording (or still acquiring hardware)
    Active,
    /// Both tracks stopped; uploads in flight
    Finalizing,
    /// Both tracks terminal and persistence attempted
    Done,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// Lifecycle state of one media track within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackState {
    /// Controller not yet running
    NotStarted,
    /// Hardware acquired, recording
    Active,
    /// Recording ended with an output reference
    Stopped,
    /// Output persisted and evidence record written
    Uploaded,
    /// Output existed but persistence failed
    UploadFailed,
    /// Hardware could not be acquired (terminal, no output)
    AcquisitionFailed,
    /// Finalize failed and no partial output was recoverable (terminal)
    StopFailed,
}

impl TrackState {
    /// Whether this state ends the track's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrackState::Uploaded
                | TrackState::UploadFailed
                | TrackState::AcquisitionFailed
                | TrackState::StopFailed
        )
    }
}

/// The lifecycle of one modality within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaTrack {
    /// Which hardware stream this track records
    pub modality: Modality,

    /// Current lifecycle state
    pub state: TrackState,

    /// Wall-clock seconds actually recorded; may be less than planned
    pub captured_duration_seconds: f64,

    /// True iff the stop was triggered by cancellation rather than timeout
    pub is_partial: bool,

    /// Reference to the recorded bytes; set iff the track reached `Stopped`
    pub output_ref: Option<OutputRef>,

    /// Why the track produced nothing, when it didn't (telemetry only)
    pub failure: Option<FailureReport>,
}

impl MediaTrack {
    pub fn new(modality: Modality) -> Self {
        Self {
            modality,
            state: TrackState::NotStarted,
            captured_duration_seconds: 0.0,
            is_partial: false,
            output_ref: None,
            failure: None,
        }
    }
}

/// One end-to-end evidence-capture attempt tied to one alert
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSession {
    /// Unique session id
    pub session_id: Uuid,

    /// Owner of the evidence
    pub user_id: String,

    /// The safety alert this capture belongs to
    pub alert_id: String,

    /// How long each track should record absent cancellation
    pub planned_duration_seconds: u32,

    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// Session state; `Done` only after both tracks are terminal
    pub status: SessionStatus,

    /// Exactly two tracks, one per modality
    pub tracks: Vec<MediaTrack>,
}

impl CaptureSession {
    /// Create a new active session with both tracks not yet started.
    pub fn new(user_id: String, alert_id: String, planned_duration_seconds: u32) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id,
            alert_id,
            planned_duration_seconds,
            started_at: Utc::now(),
            status: SessionStatus::Active,
            tracks: vec![
                MediaTrack::new(Modality::Audio),
                MediaTrack::new(Modality::Video),
            ],
        }
    }
}

/// Persisted artifact of one successfully uploaded track
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRecord {
    /// Media kind of the artifact
    #[serde(rename = "type")]
    pub kind: Modality,

    /// Public (or signed) URL of the uploaded bytes
    pub url: String,

    /// Bucket-relative path of the uploaded bytes
    pub storage_path: String,

    /// Seconds of media captured; copied from the track, never recomputed
    pub duration_seconds: f64,

    /// Whether the capture was cut short by cancellation
    pub is_partial: bool,

    /// The alert this evidence belongs to
    pub alert_id: String,

    /// When the capture stopped
    pub recorded_at: DateTime<Utc>,
}

/// Result of a completed session, delivered once `Done`
///
/// Carries zero or more evidence records; failed tracks contribute nothing
/// but appear in `tracks` for telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    /// The session this result belongs to
    pub session_id: Uuid,

    /// The alert the session was capturing for
    pub alert_id: String,

    /// One record per track that stopped with output and uploaded
    pub records: Vec<EvidenceRecord>,

    /// Final per-track states, for telemetry
    pub tracks: Vec<MediaTrack>,
}

/// Configuration for starting a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Recording duration absent cancellation, in seconds
    pub planned_duration_seconds: u32,

    /// Leading path segment for storage destinations
    pub storage_prefix: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            planned_duration_seconds: 25,
            storage_prefix: "evidence".to_string(),
        }
    }
}
