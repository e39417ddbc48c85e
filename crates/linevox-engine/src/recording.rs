//! Recording control at the host boundary.
//!
//! The engine never touches audio files itself; it drives the host's
//! record-start/stop primitive through [`RecordingSink`] and keeps the
//! session's recording bookkeeping consistent. Recording is a side effect
//! of detection, not a precondition: a failing sink leaves classification
//! running.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use linevox_foundation::{RecordingFormat, SharedClock, SinkError};
use linevox_telemetry::DetectorMetrics;

use crate::notify::NotificationEvent;
use crate::session::DetectionSession;

/// Host-provided recording primitive.
pub trait RecordingSink: Send + Sync {
    fn start(
        &self,
        session_id: &str,
        file_path: &str,
        format: RecordingFormat,
    ) -> Result<(), SinkError>;

    fn stop(&self, session_id: &str) -> Result<(), SinkError>;
}

pub(crate) struct RecordingController {
    sink: Arc<dyn RecordingSink>,
    clock: SharedClock,
    metrics: DetectorMetrics,
}

impl RecordingController {
    pub(crate) fn new(
        sink: Arc<dyn RecordingSink>,
        clock: SharedClock,
        metrics: DetectorMetrics,
    ) -> Self {
        Self {
            sink,
            clock,
            metrics,
        }
    }

    /// Begin recording for a session whose speech was just confirmed.
    ///
    /// No-op when auto-record is off or a recording is already running.
    /// Returns the RecordingStarted event to emit on success; on sink
    /// failure the session stays not-recording and detection continues.
    pub(crate) fn start(&self, session: &mut DetectionSession) -> Option<NotificationEvent> {
        if !session.params.auto_record || session.is_recording {
            return None;
        }

        let now_unix = self.clock.unix_seconds();
        let file_path = recording_filename(session, now_unix);

        if let Err(e) = self.sink.start(
            &session.session_id,
            &file_path,
            session.params.recording_format,
        ) {
            tracing::error!(
                session_id = %session.session_id,
                file_path = %file_path,
                error = %e,
                "failed to start recording"
            );
            self.metrics.recording_failures.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        tracing::info!(session_id = %session.session_id, file_path = %file_path, "started recording");

        session.recording_file = Some(file_path);
        session.is_recording = true;
        session.recording_started_at = Some(self.clock.now());

        Some(NotificationEvent::recording_started(
            &session.session_id,
            session.params.leg,
            now_unix,
        ))
    }

    /// Stop an in-progress recording.
    ///
    /// The RecordingStopped event is returned regardless of sink stop
    /// success; duration accounting is best effort.
    pub(crate) fn stop(&self, session: &mut DetectionSession) -> Option<NotificationEvent> {
        if !session.is_recording {
            return None;
        }

        let duration_secs = session
            .recording_started_at
            .map(|started| self.clock.now().duration_since(started).as_secs() as i64)
            .unwrap_or(0);

        if let Err(e) = self.sink.stop(&session.session_id) {
            tracing::error!(
                session_id = %session.session_id,
                error = %e,
                "failed to stop recording"
            );
            self.metrics.recording_failures.fetch_add(1, Ordering::Relaxed);
        } else {
            tracing::info!(
                session_id = %session.session_id,
                file = session.recording_file.as_deref().unwrap_or(""),
                duration_secs,
                "stopped recording"
            );
        }

        session.is_recording = false;
        session.recording_file = None;
        session.recording_started_at = None;

        Some(NotificationEvent::recording_stopped(
            &session.session_id,
            session.params.leg,
            duration_secs,
            self.clock.unix_seconds(),
        ))
    }
}

/// `{path}/{prefix}_{session_id}_{unix_seconds}.{ext}`
fn recording_filename(session: &DetectionSession, unix_seconds: i64) -> String {
    format!(
        "{}/{}_{}_{}.{}",
        session.params.recording_path,
        session.params.recording_prefix,
        session.session_id,
        unix_seconds,
        session.params.recording_format.extension()
    )
}
