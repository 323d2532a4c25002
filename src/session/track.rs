//! Media track controller
//!
//! Drives one device track handle through its full lifecycle: acquire,
//! record until timeout or cancellation, stop, and report a tagged outcome.
//! One controller runs per modality, independently of its sibling; nothing
//! a controller does can fail the session or the other track.

use crate::capture::{DeviceTrackSource, Modality, OutputRef};
use crate::utils::error::{AcquisitionError, StopError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Terminal outcome of one track controller run.
///
/// Every run ends in exactly one of these; errors never propagate past the
/// controller.
#[derive(Debug, Clone)]
pub(crate) enum TrackCapture {
    /// Recording ended with a usable output reference.
    Stopped {
        modality: Modality,
        output: OutputRef,
        captured: Duration,
        is_partial: bool,
        /// Wall-clock instant the stop was initiated; flows into the
        /// evidence record unchanged, independent of how long the upload
        /// takes afterwards.
        recorded_at: DateTime<Utc>,
    },
    /// Hardware could not be acquired; nothing was recorded.
    AcquisitionFailed {
        modality: Modality,
        error: AcquisitionError,
    },
    /// The handle stopped abnormally and no partial output was recoverable.
    StopFailed {
        modality: Modality,
        captured: Duration,
        is_partial: bool,
        error: StopError,
    },
}

impl TrackCapture {
    pub(crate) fn modality(&self) -> Modality {
        match self {
            TrackCapture::Stopped { modality, .. } => *modality,
            TrackCapture::AcquisitionFailed { modality, .. } => *modality,
            TrackCapture::StopFailed { modality, .. } => *modality,
        }
    }
}

/// Runs the lifecycle of one modality's capture.
pub(crate) struct TrackController {
    modality: Modality,
    planned: Duration,
    cancel: CancellationToken,
}

impl TrackController {
    pub(crate) fn new(modality: Modality, planned: Duration, cancel: CancellationToken) -> Self {
        Self {
            modality,
            planned,
            cancel,
        }
    }

    /// Acquire, record until timeout or cancellation, stop, finalize.
    ///
    /// The handle is owned by this scope and dropped on every exit path,
    /// which releases the hardware exactly once.
    pub(crate) async fn run(self, source: Arc<dyn DeviceTrackSource>) -> TrackCapture {
        let modality = self.modality;

        let mut handle = match source.acquire().await {
            Ok(handle) => handle,
            Err(error) => {
                tracing::warn!(%modality, %error, "track acquisition failed");
                return TrackCapture::AcquisitionFailed { modality, error };
            }
        };

        if let Err(error) = handle.start().await {
            tracing::warn!(%modality, %error, "track failed to start");
            return TrackCapture::AcquisitionFailed { modality, error };
        }

        tracing::debug!(%modality, planned_secs = self.planned.as_secs(), "track recording");
        let started = Instant::now();

        // Single select: whichever branch wins initiates the one and only
        // stop. A cancellation arriving after the timeout fired (or vice
        // versa) is inert because the race has already resolved.
        let is_partial = tokio::select! {
            _ = tokio::time::sleep(self.planned) => false,
            _ = self.cancel.cancelled() => true,
        };

        let captured = started.elapsed().min(self.planned);
        let recorded_at = Utc::now();

        match handle.stop().await {
            Ok(output) => {
                tracing::info!(
                    %modality,
                    captured_secs = captured.as_secs_f64(),
                    is_partial,
                    "track stopped"
                );
                TrackCapture::Stopped {
                    modality,
                    output,
                    captured,
                    is_partial,
                    recorded_at,
                }
            }
            Err(error) => {
                // The stop itself failed; salvage whatever the device still
                // exposes before declaring the track empty.
                if let Some(output) = handle.recover_partial() {
                    tracing::warn!(%modality, %error, "stop failed, recovered partial output");
                    TrackCapture::Stopped {
                        modality,
                        output,
                        captured,
                        is_partial,
                        recorded_at,
                    }
                } else {
                    tracing::warn!(%modality, %error, "stop failed, no output recoverable");
                    TrackCapture::StopFailed {
                        modality,
                        captured,
                        is_partial,
                        error,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSource, StopBehavior};

    fn secs(d: Duration) -> f64 {
        d.as_secs_f64()
    }

    #[tokio::test(start_paused = true)]
    async fn natural_timeout_yields_full_capture() {
        let source = Arc::new(FakeSource::new(Modality::Audio));
        let controller = TrackController::new(
            Modality::Audio,
            Duration::from_secs(25),
            CancellationToken::new(),
        );

        let outcome = controller.run(source.clone()).await;
        match outcome {
            TrackCapture::Stopped {
                captured,
                is_partial,
                ..
            } => {
                assert!((secs(captured) - 25.0).abs() < 1.0);
                assert!(!is_partial);
            }
            other => panic!("expected Stopped, got {:?}", other),
        }
        assert_eq!(source.released_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_wins_the_race() {
        let source = Arc::new(FakeSource::new(Modality::Video));
        let token = CancellationToken::new();
        let controller =
            TrackController::new(Modality::Video, Duration::from_secs(25), token.clone());

        let task = tokio::spawn(controller.run(source.clone()));
        tokio::time::sleep(Duration::from_secs(10)).await;
        token.cancel();

        match task.await.unwrap() {
            TrackCapture::Stopped {
                captured,
                is_partial,
                ..
            } => {
                assert!((secs(captured) - 10.0).abs() < 1.0);
                assert!(is_partial);
            }
            other => panic!("expected Stopped, got {:?}", other),
        }
        assert_eq!(source.released_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_timestamp_reflects_the_stop_instant() {
        let source = Arc::new(FakeSource::new(Modality::Audio));
        let controller = TrackController::new(
            Modality::Audio,
            Duration::from_secs(5),
            CancellationToken::new(),
        );

        let before = Utc::now();
        match controller.run(source).await {
            TrackCapture::Stopped { recorded_at, .. } => {
                let after = Utc::now();
                assert!(recorded_at >= before);
                assert!(recorded_at <= after);
            }
            other => panic!("expected Stopped, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_token_stops_immediately() {
        let source = Arc::new(FakeSource::new(Modality::Audio));
        let token = CancellationToken::new();
        token.cancel();

        let controller = TrackController::new(Modality::Audio, Duration::from_secs(25), token);
        match controller.run(source).await {
            TrackCapture::Stopped {
                captured,
                is_partial,
                ..
            } => {
                assert!(secs(captured) < 1.0);
                assert!(is_partial);
            }
            other => panic!("expected Stopped, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn acquisition_failure_is_terminal_and_empty() {
        let source = Arc::new(FakeSource::new(Modality::Video).failing_acquire());
        let controller = TrackController::new(
            Modality::Video,
            Duration::from_secs(25),
            CancellationToken::new(),
        );

        match controller.run(source.clone()).await {
            TrackCapture::AcquisitionFailed { modality, .. } => {
                assert_eq!(modality, Modality::Video);
            }
            other => panic!("expected AcquisitionFailed, got {:?}", other),
        }
        // Nothing was acquired, so nothing to release.
        assert_eq!(source.released_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_failure_recovers_partial_output() {
        let source =
            Arc::new(FakeSource::new(Modality::Audio).with_stop(StopBehavior::FailRecoverable));
        let controller = TrackController::new(
            Modality::Audio,
            Duration::from_secs(5),
            CancellationToken::new(),
        );

        match controller.run(source.clone()).await {
            TrackCapture::Stopped { output, .. } => {
                assert!(output
                    .local_path
                    .to_string_lossy()
                    .contains("partial"));
            }
            other => panic!("expected recovered Stopped, got {:?}", other),
        }
        assert_eq!(source.released_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_failure_without_recovery_yields_empty_outcome() {
        let source =
            Arc::new(FakeSource::new(Modality::Audio).with_stop(StopBehavior::FailUnrecoverable));
        let controller = TrackController::new(
            Modality::Audio,
            Duration::from_secs(5),
            CancellationToken::new(),
        );

        match controller.run(source.clone()).await {
            TrackCapture::StopFailed { is_partial, .. } => assert!(!is_partial),
            other => panic!("expected StopFailed, got {:?}", other),
        }
        // Handle still released even though stop failed.
        assert_eq!(source.released_count(), 1);
    }
}
