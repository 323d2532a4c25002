//! Capture orchestrator
//!
//! Owns the session lifecycle: starts both track controllers concurrently,
//! fans cancellation out to them, aggregates their outcomes, and runs the
//! persistence pipeline for every track that produced output.
//!
//! The silent-failure contract lives here: `start()` and `cancel()` never
//! raise, and no internal failure is visible to the caller other than a
//! track contributing zero evidence records. The invoking UI must behave
//! identically whether capture fully succeeded, partially succeeded, or
//! failed entirely.

use super::state::{
    CaptureConfig, CaptureSession, MediaTrack, SessionResult, SessionStatus, TrackState,
};
use super::track::{TrackCapture, TrackController};
use crate::capture::{DeviceTrackSource, Modality};
use crate::upload::pipeline::StoppedCapture;
use crate::upload::{EvidenceIndex, EvidencePipeline, EvidenceStorage};
use crate::utils::error::{AcquisitionError, FailureReport, PersistError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Events emitted while a session runs, for app-layer telemetry
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Session created, controllers launched
    SessionStarted { session_id: Uuid },
    /// One track stopped with output
    TrackStopped {
        session_id: Uuid,
        modality: Modality,
        is_partial: bool,
    },
    /// One track produced nothing
    TrackFailed {
        session_id: Uuid,
        modality: Modality,
        code: String,
    },
    /// Both tracks terminal, persistence attempted, result available
    SessionDone {
        session_id: Uuid,
        record_count: usize,
    },
}

/// Caller-side handle to a running (or finished) capture session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: Uuid,
    alert_id: String,
    cancel: CancellationToken,
    result_rx: watch::Receiver<Option<SessionResult>>,
}

impl SessionHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Wait for the session to reach `Done` and return its result.
    ///
    /// Always resolves; never returns an error to the caller.
    pub async fn wait(&self) -> SessionResult {
        let mut rx = self.result_rx.clone();
        loop {
            {
                let value = rx.borrow();
                if let Some(result) = value.as_ref() {
                    return result.clone();
                }
            }
            if rx.changed().await.is_err() {
                // Aggregation task vanished without a result; report an
                // empty session rather than surfacing an error.
                return SessionResult {
                    session_id: self.session_id,
                    alert_id: self.alert_id.clone(),
                    records: Vec::new(),
                    tracks: Vec::new(),
                };
            }
        }
    }
}

struct ActiveSession {
    cancel: CancellationToken,
    status: SessionStatus,
}

/// Starts, cancels, and finalizes capture sessions.
///
/// Camera and microphone are exclusive resources: one controller per
/// modality at a time, enforced here rather than through any shared global
/// handle. A second concurrent session fails acquisition with
/// [`AcquisitionError::Busy`] on the contended modality.
pub struct CaptureOrchestrator {
    config: CaptureConfig,
    audio_source: Arc<dyn DeviceTrackSource>,
    video_source: Arc<dyn DeviceTrackSource>,
    pipeline: Arc<EvidencePipeline>,

    /// Per-modality exclusivity guards
    audio_slot: Arc<AsyncMutex<()>>,
    video_slot: Arc<AsyncMutex<()>>,

    /// Sessions not yet `Done`
    sessions: Arc<RwLock<HashMap<Uuid, ActiveSession>>>,

    /// Event broadcaster
    event_tx: broadcast::Sender<CaptureEvent>,
}

impl CaptureOrchestrator {
    pub fn new(
        audio_source: Arc<dyn DeviceTrackSource>,
        video_source: Arc<dyn DeviceTrackSource>,
        storage: Arc<dyn EvidenceStorage>,
        index: Arc<dyn EvidenceIndex>,
        config: CaptureConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        let pipeline = Arc::new(EvidencePipeline::new(
            storage,
            index,
            config.storage_prefix.clone(),
        ));
        Self {
            config,
            audio_source,
            video_source,
            pipeline,
            audio_slot: Arc::new(AsyncMutex::new(())),
            video_slot: Arc::new(AsyncMutex::new(())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
        }
    }

    /// Subscribe to capture events.
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.event_tx.subscribe()
    }

    /// Status of a session that has not yet finished, if known.
    pub fn status(&self, session_id: Uuid) -> Option<SessionStatus> {
        self.sessions.read().get(&session_id).map(|s| s.status)
    }

    /// Start a capture session for one alert.
    ///
    /// Returns immediately; both track controllers run as spawned tasks and
    /// the result is observed through [`SessionHandle::wait`]. Never raises.
    pub fn start(
        &self,
        user_id: impl Into<String>,
        alert_id: impl Into<String>,
        planned_duration_seconds: Option<u32>,
    ) -> SessionHandle {
        let requested_secs =
            planned_duration_seconds.unwrap_or(self.config.planned_duration_seconds);
        if requested_secs == 0 {
            tracing::warn!("planned duration of 0s requested, clamping to 1s");
        }
        let planned_secs = requested_secs.max(1);
        let session = CaptureSession::new(user_id.into(), alert_id.into(), planned_secs);
        let session_id = session.session_id;
        let alert_id = session.alert_id.clone();

        tracing::info!(
            %session_id,
            alert_id = %session.alert_id,
            planned_secs,
            "starting capture session"
        );

        let cancel = CancellationToken::new();
        let (result_tx, result_rx) = watch::channel(None);

        self.sessions.write().insert(
            session_id,
            ActiveSession {
                cancel: cancel.clone(),
                status: SessionStatus::Active,
            },
        );
        let _ = self
            .event_tx
            .send(CaptureEvent::SessionStarted { session_id });

        let runner = SessionRunner {
            session,
            cancel: cancel.clone(),
            planned: Duration::from_secs(u64::from(planned_secs)),
            audio_source: self.audio_source.clone(),
            video_source: self.video_source.clone(),
            audio_slot: self.audio_slot.clone(),
            video_slot: self.video_slot.clone(),
            pipeline: self.pipeline.clone(),
            sessions: self.sessions.clone(),
            event_tx: self.event_tx.clone(),
        };
        tokio::spawn(runner.run(result_tx));

        SessionHandle {
            session_id,
            alert_id,
            cancel,
            result_rx,
        }
    }

    /// Cancel a running session.
    ///
    /// Fans out to both tracks; each controller's own race resolves
    /// independently. Idempotent, non-blocking, and a no-op once the
    /// session is `Done`. Never raises.
    pub fn cancel(&self, handle: &SessionHandle) {
        if !self.sessions.read().contains_key(&handle.session_id) {
            tracing::debug!(session_id = %handle.session_id, "cancel after done, ignoring");
            return;
        }
        tracing::info!(session_id = %handle.session_id, "cancelling capture session");
        handle.cancel.cancel();
    }
}

/// The spawned aggregation task for one session.
struct SessionRunner {
    session: CaptureSession,
    cancel: CancellationToken,
    planned: Duration,
    audio_source: Arc<dyn DeviceTrackSource>,
    video_source: Arc<dyn DeviceTrackSource>,
    audio_slot: Arc<AsyncMutex<()>>,
    video_slot: Arc<AsyncMutex<()>>,
    pipeline: Arc<EvidencePipeline>,
    sessions: Arc<RwLock<HashMap<Uuid, ActiveSession>>>,
    event_tx: broadcast::Sender<CaptureEvent>,
}

impl SessionRunner {
    async fn run(mut self, result_tx: watch::Sender<Option<SessionResult>>) {
        let session_id = self.session.session_id;

        let audio = tokio::spawn(Self::run_track(
            Modality::Audio,
            self.audio_source.clone(),
            self.audio_slot.clone(),
            self.planned,
            self.cancel.clone(),
        ));
        let video = tokio::spawn(Self::run_track(
            Modality::Video,
            self.video_source.clone(),
            self.video_slot.clone(),
            self.planned,
            self.cancel.clone(),
        ));

        let (audio, video) = tokio::join!(audio, video);
        let audio = audio.unwrap_or_else(|e| Self::panicked(Modality::Audio, e));
        let video = video.unwrap_or_else(|e| Self::panicked(Modality::Video, e));

        // Both tracks terminal; session-level state is touched only from
        // here on, by this task alone.
        self.session.status = SessionStatus::Finalizing;
        if let Some(entry) = self.sessions.write().get_mut(&session_id) {
            entry.status = SessionStatus::Finalizing;
        }

        for capture in [&audio, &video] {
            self.emit_track_event(capture);
        }

        let ((audio_final, audio_rec), (video_final, video_rec)) =
            tokio::join!(self.finalize_track(audio), self.finalize_track(video));

        self.session.tracks = vec![audio_final.clone(), video_final.clone()];
        self.session.status = SessionStatus::Done;
        self.sessions.write().remove(&session_id);

        let mut records = Vec::new();
        records.extend(audio_rec);
        records.extend(video_rec);

        tracing::info!(
            %session_id,
            record_count = records.len(),
            "capture session done"
        );
        let _ = self.event_tx.send(CaptureEvent::SessionDone {
            session_id,
            record_count: records.len(),
        });

        let result = SessionResult {
            session_id,
            alert_id: self.session.alert_id.clone(),
            records,
            tracks: vec![audio_final, video_final],
        };
        let _ = result_tx.send(Some(result));
    }

    /// Run one modality's controller under its exclusivity slot.
    async fn run_track(
        modality: Modality,
        source: Arc<dyn DeviceTrackSource>,
        slot: Arc<AsyncMutex<()>>,
        planned: Duration,
        cancel: CancellationToken,
    ) -> TrackCapture {
        let _slot = match slot.try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!(%modality, "modality already in use by another session");
                return TrackCapture::AcquisitionFailed {
                    modality,
                    error: AcquisitionError::Busy(modality.to_string()),
                };
            }
        };
        TrackController::new(modality, planned, cancel).run(source).await
    }

    fn panicked(modality: Modality, error: tokio::task::JoinError) -> TrackCapture {
        tracing::warn!(%modality, %error, "track task aborted");
        TrackCapture::AcquisitionFailed {
            modality,
            error: AcquisitionError::Other(format!("track task aborted: {error}")),
        }
    }

    fn emit_track_event(&self, capture: &TrackCapture) {
        let session_id = self.session.session_id;
        let event = match capture {
            TrackCapture::Stopped {
                modality,
                is_partial,
                ..
            } => CaptureEvent::TrackStopped {
                session_id,
                modality: *modality,
                is_partial: *is_partial,
            },
            TrackCapture::AcquisitionFailed { modality, error } => CaptureEvent::TrackFailed {
                session_id,
                modality: *modality,
                code: FailureReport::acquisition(error).code,
            },
            TrackCapture::StopFailed { modality, error, .. } => CaptureEvent::TrackFailed {
                session_id,
                modality: *modality,
                code: FailureReport::stop(error).code,
            },
        };
        let _ = self.event_tx.send(event);
    }

    /// Persist one track's output (if any) and produce its final state.
    ///
    /// Runs independently per track; a persistence failure here never
    /// blocks or retries the sibling.
    async fn finalize_track(
        &self,
        capture: TrackCapture,
    ) -> (MediaTrack, Option<super::state::EvidenceRecord>) {
        let mut track = MediaTrack::new(capture.modality());
        match capture {
            TrackCapture::Stopped {
                modality,
                output,
                captured,
                is_partial,
                recorded_at,
            } => {
                track.state = TrackState::Stopped;
                track.captured_duration_seconds = captured.as_secs_f64();
                track.is_partial = is_partial;
                track.output_ref = Some(output.clone());

                let stopped = StoppedCapture {
                    modality,
                    output,
                    duration_seconds: track.captured_duration_seconds,
                    is_partial,
                    recorded_at,
                };
                match self
                    .pipeline
                    .persist(
                        &self.session.user_id,
                        &self.session.alert_id,
                        self.session.session_id,
                        &stopped,
                    )
                    .await
                {
                    Ok(record) => {
                        track.state = TrackState::Uploaded;
                        (track, Some(record))
                    }
                    Err(error) => {
                        track.state = TrackState::UploadFailed;
                        track.failure = Some(FailureReport::persist(&error));
                        if let PersistError::Metadata(_) = error {
                            // Bytes made it to storage; only the record is
                            // missing. Kept for a later re-index.
                            tracing::debug!(%modality, "uploaded bytes orphaned without record");
                        }
                        (track, None)
                    }
                }
            }
            TrackCapture::AcquisitionFailed { error, .. } => {
                track.state = TrackState::AcquisitionFailed;
                track.failure = Some(FailureReport::acquisition(&error));
                (track, None)
            }
            TrackCapture::StopFailed {
                captured,
                is_partial,
                error,
                ..
            } => {
                track.state = TrackState::StopFailed;
                track.captured_duration_seconds = captured.as_secs_f64();
                track.is_partial = is_partial;
                track.failure = Some(FailureReport::stop(&error));
                (track, None)
            }
        }
    }
}
