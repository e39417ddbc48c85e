use std::time::{Duration, Instant};

use serde::Serialize;

use linevox_foundation::Leg;
use linevox_vad::{RuntimeParameters, SpeechDetector};

/// All mutable state for one monitored call leg.
///
/// Owned by its registry entry behind a per-session lock; only the frame
/// path and lifecycle operations for this id ever touch it, and never
/// concurrently.
pub struct DetectionSession {
    pub(crate) session_id: String,
    pub(crate) params: RuntimeParameters,
    pub(crate) detector: SpeechDetector,

    pub(crate) is_recording: bool,
    pub(crate) recording_file: Option<String>,
    pub(crate) recording_started_at: Option<Instant>,

    pub(crate) last_notification_at: Option<Instant>,
}

impl std::fmt::Debug for DetectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionSession")
            .field("session_id", &self.session_id)
            .field("params", &self.params)
            .field("is_recording", &self.is_recording)
            .field("recording_file", &self.recording_file)
            .field("recording_started_at", &self.recording_started_at)
            .field("last_notification_at", &self.last_notification_at)
            .finish_non_exhaustive()
    }
}

impl DetectionSession {
    pub fn new(session_id: impl Into<String>, params: RuntimeParameters, detector: SpeechDetector) -> Self {
        Self {
            session_id: session_id.into(),
            params,
            detector,
            is_recording: false,
            recording_file: None,
            recording_started_at: None,
            last_notification_at: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn params(&self) -> &RuntimeParameters {
        &self.params
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn recording_file(&self) -> Option<&str> {
        self.recording_file.as_deref()
    }

    /// Whether a VoiceStarted/VoiceEnded notification may fire now.
    pub(crate) fn notify_eligible(&self, now: Instant, debounce: Duration) -> bool {
        match self.last_notification_at {
            Some(last) => now.duration_since(last) >= debounce,
            None => true,
        }
    }

    pub(crate) fn mark_notified(&mut self, now: Instant) {
        self.last_notification_at = Some(now);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            leg: self.params.leg,
            voice_confirmed: self.detector.voice_confirmed(),
            is_recording: self.is_recording,
            frames_seen: self.detector.frames_seen(),
            energy_threshold: self.params.energy_threshold,
            max_silence_ms: self.params.max_silence_ms,
        }
    }
}

/// Point-in-time view of a session for the status surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub leg: Leg,
    pub voice_confirmed: bool,
    pub is_recording: bool,
    pub frames_seen: u64,
    pub energy_threshold: f32,
    pub max_silence_ms: u64,
}
