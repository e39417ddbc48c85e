use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared counters for cross-thread detector monitoring.
///
/// Everything is atomic with `Relaxed` ordering so the frame path and the
/// status path never contend on a lock.
#[derive(Clone)]
pub struct DetectorMetrics {
    // Frame accounting
    pub frames_processed: Arc<AtomicU64>,
    pub frames_dropped: Arc<AtomicU64>, // malformed or addressed to an unknown session
    pub last_energy_millis: Arc<AtomicU64>, // normalized RMS * 1000

    // Session lifecycle
    pub sessions_started: Arc<AtomicU64>,
    pub sessions_stopped: Arc<AtomicU64>,
    pub active_sessions: Arc<AtomicUsize>,

    // Detection events
    pub voice_started_events: Arc<AtomicU64>,
    pub voice_ended_events: Arc<AtomicU64>,
    pub words_detected: Arc<AtomicU64>,
    pub spans_discarded: Arc<AtomicU64>, // overlong spans rejected as noise

    // Recording
    pub recordings_started: Arc<AtomicU64>,
    pub recordings_stopped: Arc<AtomicU64>,
    pub recording_failures: Arc<AtomicU64>,

    // Notification delivery
    pub notifications_enqueued: Arc<AtomicU64>,
    pub notifications_delivered: Arc<AtomicU64>,
    pub notifications_failed: Arc<AtomicU64>,
    pub notifications_dropped: Arc<AtomicU64>, // queue overflow, oldest evicted

    pub last_event_at: Arc<RwLock<Option<Instant>>>,
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self {
            frames_processed: Arc::new(AtomicU64::new(0)),
            frames_dropped: Arc::new(AtomicU64::new(0)),
            last_energy_millis: Arc::new(AtomicU64::new(0)),

            sessions_started: Arc::new(AtomicU64::new(0)),
            sessions_stopped: Arc::new(AtomicU64::new(0)),
            active_sessions: Arc::new(AtomicUsize::new(0)),

            voice_started_events: Arc::new(AtomicU64::new(0)),
            voice_ended_events: Arc::new(AtomicU64::new(0)),
            words_detected: Arc::new(AtomicU64::new(0)),
            spans_discarded: Arc::new(AtomicU64::new(0)),

            recordings_started: Arc::new(AtomicU64::new(0)),
            recordings_stopped: Arc::new(AtomicU64::new(0)),
            recording_failures: Arc::new(AtomicU64::new(0)),

            notifications_enqueued: Arc::new(AtomicU64::new(0)),
            notifications_delivered: Arc::new(AtomicU64::new(0)),
            notifications_failed: Arc::new(AtomicU64::new(0)),
            notifications_dropped: Arc::new(AtomicU64::new(0)),

            last_event_at: Arc::new(RwLock::new(None)),
        }
    }
}

impl DetectorMetrics {
    pub fn record_frame(&self, energy: f32) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        self.last_energy_millis
            .store((energy * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn record_dropped_frame(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_stopped(&self) {
        self.sessions_stopped.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                n.checked_sub(1)
            });
    }

    pub fn mark_event(&self, now: Instant) {
        *self.last_event_at.write() = Some(now);
    }
}
