//! Lifecycle API and the per-frame hot path.
//!
//! `process_frame` is the only code that runs on the host's audio threads.
//! It takes the registry's short map guard for one lookup, then holds only
//! the target session's lock while classifying the frame and mapping the
//! detector's decision onto recording and notification side effects. It
//! never awaits, never performs I/O, and in steady state never allocates.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use linevox_foundation::{
    real_clock, ConfigError, GlobalConfig, Leg, RegistryError, SharedClock,
};
use linevox_telemetry::DetectorMetrics;
use linevox_vad::{DetectorConfig, EnergyAnalyzer, RuntimeParameters, SpeechDetector};

use crate::notify::{
    EventKind, HttpNotifier, NotificationDispatcher, NotificationEvent, NotificationTransport,
};
use crate::recording::{RecordingController, RecordingSink};
use crate::registry::SessionRegistry;
use crate::session::{DetectionSession, SessionSnapshot};

/// Result of a start request. Starting an already-monitored session is an
/// outcome, not an error: detection is idempotent per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyActive,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub sessions: Vec<SessionSnapshot>,
    pub auto_record: bool,
    pub recording_path: String,
}

pub struct EngineBuilder {
    config: GlobalConfig,
    sink: Arc<dyn RecordingSink>,
    clock: Option<SharedClock>,
    transport: Option<Arc<dyn NotificationTransport>>,
    metrics: Option<DetectorMetrics>,
}

impl EngineBuilder {
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn NotificationTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_metrics(mut self, metrics: DetectorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the engine and spawn its notification worker. Must be called
    /// within a tokio runtime.
    pub fn build(self) -> Result<DetectionEngine, ConfigError> {
        let clock = self.clock.unwrap_or_else(real_clock);
        let metrics = self.metrics.unwrap_or_default();

        let transport = match self.transport {
            Some(t) => Some(t),
            None => match &self.config.api_url {
                Some(url) => {
                    let notifier = HttpNotifier::new(url.clone(), self.config.api_key.clone())
                        .map_err(|e| ConfigError::Load(e.to_string()))?;
                    Some(Arc::new(notifier) as Arc<dyn NotificationTransport>)
                }
                // No collector configured: detection runs, nothing is sent.
                None => None,
            },
        };

        let dispatcher = transport.map(|t| {
            NotificationDispatcher::spawn(t, self.config.notify_queue_depth, metrics.clone())
        });

        Ok(DetectionEngine {
            controller: RecordingController::new(self.sink, clock.clone(), metrics.clone()),
            registry: SessionRegistry::new(),
            analyzer: EnergyAnalyzer::new(),
            debounce: Duration::from_millis(self.config.debounce_ms),
            dispatcher,
            metrics,
            clock,
            config: self.config,
        })
    }
}

pub struct DetectionEngine {
    config: GlobalConfig,
    registry: SessionRegistry,
    controller: RecordingController,
    dispatcher: Option<NotificationDispatcher>,
    analyzer: EnergyAnalyzer,
    clock: SharedClock,
    metrics: DetectorMetrics,
    debounce: Duration,
}

impl DetectionEngine {
    pub fn builder(config: GlobalConfig, sink: Arc<dyn RecordingSink>) -> EngineBuilder {
        EngineBuilder {
            config,
            sink,
            clock: None,
            transport: None,
            metrics: None,
        }
    }

    pub fn metrics(&self) -> &DetectorMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Begin monitoring a session. `overrides` is a whitespace-separated
    /// `key=value` list layered over the global configuration; a malformed
    /// override rejects the start.
    pub fn start_session(
        &self,
        session_id: &str,
        overrides: &str,
    ) -> Result<StartOutcome, ConfigError> {
        let params = RuntimeParameters::resolve(&self.config, overrides)?;
        let detector_config = DetectorConfig::from_params(
            &params,
            self.config.frame_size_samples,
            self.config.sample_rate_hz,
        );
        let detector = SpeechDetector::new(detector_config, self.clock.clone());
        let session = DetectionSession::new(session_id, params, detector);

        match self.registry.insert(session) {
            Ok(handle) => {
                let session = handle.lock();
                tracing::info!(
                    session_id,
                    leg = %session.params.leg,
                    auto_record = session.params.auto_record,
                    energy_threshold = session.params.energy_threshold,
                    max_silence_ms = session.params.max_silence_ms,
                    "voice detection started"
                );
                self.metrics.record_session_started();
                Ok(StartOutcome::Started)
            }
            // Insert only fails when the id is already registered.
            Err(_) => {
                tracing::warn!(session_id, "voice detection already active");
                Ok(StartOutcome::AlreadyActive)
            }
        }
    }

    /// Stop monitoring. Claims the registry slot first so late frames are
    /// dropped, then stops any in-progress recording (emitting
    /// RecordingStopped) before the session is destroyed.
    pub fn stop_session(&self, session_id: &str) -> Result<(), RegistryError> {
        let handle = self.registry.remove(session_id)?;
        {
            let mut session = handle.lock();
            if let Some(event) = self.controller.stop(&mut session) {
                self.record_recording_stopped();
                self.emit(event);
            }
        }
        self.metrics.record_session_stopped();
        tracing::info!(session_id, "voice detection stopped");
        Ok(())
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            sessions: self.registry.snapshots(),
            auto_record: self.config.auto_record,
            recording_path: self.config.recording_path.clone(),
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }

    /// Classify one frame for a session. Malformed frames and frames for
    /// unknown (stopped) sessions are dropped; nothing here can fail a
    /// session.
    pub fn process_frame(&self, session_id: &str, frame_leg: Leg, samples: &[i16]) {
        let Some(handle) = self.registry.get(session_id) else {
            self.metrics.record_dropped_frame();
            tracing::debug!(session_id, "frame for unknown session dropped");
            return;
        };

        if samples.is_empty() {
            self.metrics.record_dropped_frame();
            tracing::debug!(session_id, "empty frame dropped");
            return;
        }

        let mut session = handle.lock();

        if !session.params.leg.monitors(frame_leg) {
            tracing::trace!(session_id, frame_leg = %frame_leg, "frame for unmonitored leg skipped");
            return;
        }

        let energy = self.analyzer.normalized_rms(samples);
        let now = self.clock.now();
        let decision = session.detector.process(energy);
        self.metrics.record_frame(energy);

        if decision.is_noop() {
            return;
        }
        self.metrics.mark_event(now);

        // Optimistic low-latency onset signal: fires on the first energetic
        // frame, before confirmation, so a span that never confirms may
        // still have announced itself.
        if decision.onset_candidate && session.notify_eligible(now, self.debounce) {
            session.mark_notified(now);
            self.metrics
                .voice_started_events
                .fetch_add(1, Ordering::Relaxed);
            self.emit(NotificationEvent::voice(
                EventKind::VoiceStarted,
                &session.session_id,
                session.params.leg,
                energy,
                self.clock.unix_seconds(),
            ));
        }

        if decision.confirmed {
            if let Some(event) = self.controller.start(&mut session) {
                self.metrics
                    .recordings_started
                    .fetch_add(1, Ordering::Relaxed);
                self.emit(event);
            }
        }

        if decision.span_discarded {
            tracing::debug!(
                session_id,
                "overlong speech span discarded as noise, no event emitted"
            );
            self.metrics
                .spans_discarded
                .fetch_add(1, Ordering::Relaxed);
            if let Some(event) = self.controller.stop(&mut session) {
                self.record_recording_stopped();
                self.emit(event);
            }
        }

        if let Some(word_ms) = decision.word_ms {
            self.metrics
                .words_detected
                .fetch_add(1, Ordering::Relaxed);
            self.emit(NotificationEvent::word_detected(
                &session.session_id,
                session.params.leg,
                word_ms,
                self.clock.unix_seconds(),
            ));
        }

        if decision.span_ended {
            if let Some(event) = self.controller.stop(&mut session) {
                self.record_recording_stopped();
                self.emit(event);
            }
            if session.notify_eligible(now, self.debounce) {
                session.mark_notified(now);
                self.metrics
                    .voice_ended_events
                    .fetch_add(1, Ordering::Relaxed);
                self.emit(NotificationEvent::voice(
                    EventKind::VoiceEnded,
                    &session.session_id,
                    session.params.leg,
                    energy,
                    self.clock.unix_seconds(),
                ));
            }
        }
    }

    /// Stop every session (ending recordings) and drain the notification
    /// queue.
    pub async fn shutdown(&self) {
        for handle in self.registry.drain() {
            let mut session = handle.lock();
            if let Some(event) = self.controller.stop(&mut session) {
                self.record_recording_stopped();
                self.emit(event);
            }
            self.metrics.record_session_stopped();
        }

        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.shutdown().await;
        }
    }

    fn emit(&self, event: NotificationEvent) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.emit(event);
        }
    }

    fn record_recording_stopped(&self) {
        self.metrics
            .recordings_stopped
            .fetch_add(1, Ordering::Relaxed);
    }
}
