//! Debounced, non-blocking delivery of lifecycle events to the external
//! collector.
//!
//! `emit` runs on the audio thread and only pushes into a pre-sized queue;
//! the outbound POST happens on a tokio worker with a bounded timeout and no
//! retries. When the queue is full the oldest pending event is dropped and
//! counted, so a slow collector can never stall frame delivery.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use linevox_foundation::{Leg, NotifyError};
use linevox_telemetry::DetectorMetrics;

/// Outbound request timeout; a collector slower than this loses the event.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    VoiceStarted,
    VoiceEnded,
    RecordingStarted,
    RecordingStopped,
    WordDetected,
}

impl EventKind {
    /// Numeric `voice_detected` code on the wire.
    pub fn wire_code(&self) -> u8 {
        match self {
            EventKind::VoiceEnded => 0,
            EventKind::VoiceStarted => 1,
            EventKind::RecordingStarted => 2,
            EventKind::RecordingStopped => 3,
            EventKind::WordDetected => 4,
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            EventKind::VoiceEnded => "voice_ended",
            EventKind::VoiceStarted => "voice_started",
            EventKind::RecordingStarted => "recording_started",
            EventKind::RecordingStopped => "recording_stopped",
            EventKind::WordDetected => "word_detected",
        }
    }
}

/// One lifecycle event bound for the collector.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub session_id: String,
    pub leg: Leg,
    pub timestamp: i64,
    /// Normalized energy scaled to 0..1000 for Voice* events; mirrors the
    /// type-dependent payload for the other kinds.
    pub energy_level: i64,
    pub recording_duration_secs: Option<i64>,
    pub word_duration_ms: Option<u64>,
}

impl NotificationEvent {
    pub fn voice(kind: EventKind, session_id: &str, leg: Leg, energy: f32, timestamp: i64) -> Self {
        Self {
            kind,
            session_id: session_id.to_string(),
            leg,
            timestamp,
            energy_level: (energy * 1000.0) as i64,
            recording_duration_secs: None,
            word_duration_ms: None,
        }
    }

    pub fn recording_started(session_id: &str, leg: Leg, timestamp: i64) -> Self {
        Self {
            kind: EventKind::RecordingStarted,
            session_id: session_id.to_string(),
            leg,
            timestamp,
            energy_level: 0,
            recording_duration_secs: None,
            word_duration_ms: None,
        }
    }

    pub fn recording_stopped(
        session_id: &str,
        leg: Leg,
        duration_secs: i64,
        timestamp: i64,
    ) -> Self {
        Self {
            kind: EventKind::RecordingStopped,
            session_id: session_id.to_string(),
            leg,
            timestamp,
            energy_level: duration_secs,
            recording_duration_secs: Some(duration_secs),
            word_duration_ms: None,
        }
    }

    pub fn word_detected(session_id: &str, leg: Leg, word_ms: u64, timestamp: i64) -> Self {
        Self {
            kind: EventKind::WordDetected,
            session_id: session_id.to_string(),
            leg,
            timestamp,
            energy_level: word_ms as i64,
            recording_duration_secs: None,
            word_duration_ms: Some(word_ms),
        }
    }
}

/// JSON document POSTed to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePayload {
    pub uuid: String,
    pub leg: String,
    pub voice_detected: u8,
    pub energy_level: i64,
    pub timestamp: i64,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_duration: Option<u64>,
}

impl From<&NotificationEvent> for WirePayload {
    fn from(event: &NotificationEvent) -> Self {
        Self {
            uuid: event.session_id.clone(),
            leg: event.leg.as_str().to_string(),
            voice_detected: event.kind.wire_code(),
            energy_level: event.energy_level,
            timestamp: event.timestamp,
            event_type: event.kind.wire_name().to_string(),
            recording_duration: event.recording_duration_secs,
            word_duration: event.word_duration_ms,
        }
    }
}

/// Delivery backend. Production uses HTTP; tests capture in memory.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn deliver(&self, payload: &WirePayload) -> Result<(), NotifyError>;
}

/// POSTs payloads to the configured collector endpoint.
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl NotificationTransport for HttpNotifier {
    async fn deliver(&self, payload: &WirePayload) -> Result<(), NotifyError> {
        let mut request = self.client.post(&self.url).json(payload);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                NotifyError::Timeout
            } else {
                NotifyError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        tracing::trace!(status = status.as_u16(), event = %payload.event_type, "notification delivered");
        Ok(())
    }
}

struct DispatcherShared {
    queue: Mutex<VecDeque<NotificationEvent>>,
    capacity: usize,
    wakeup: Notify,
    closed: AtomicBool,
    transport: Arc<dyn NotificationTransport>,
    metrics: DetectorMetrics,
}

pub struct NotificationDispatcher {
    shared: Arc<DispatcherShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationDispatcher {
    /// Spawn the delivery worker. Must be called within a tokio runtime.
    pub fn spawn(
        transport: Arc<dyn NotificationTransport>,
        capacity: usize,
        metrics: DetectorMetrics,
    ) -> Self {
        let shared = Arc::new(DispatcherShared {
            queue: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            capacity: capacity.max(1),
            wakeup: Notify::new(),
            closed: AtomicBool::new(false),
            transport,
            metrics,
        });

        let worker = tokio::spawn(run_worker(shared.clone()));

        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Hand an event to the delivery worker. Never blocks; a full queue
    /// evicts the oldest pending event.
    pub fn emit(&self, event: NotificationEvent) {
        if self.shared.closed.load(Ordering::Acquire) {
            return;
        }

        {
            let mut queue = self.shared.queue.lock();
            if queue.len() == self.shared.capacity {
                let evicted = queue.pop_front();
                self.shared
                    .metrics
                    .notifications_dropped
                    .fetch_add(1, Ordering::Relaxed);
                self.shared
                    .metrics
                    .notifications_failed
                    .fetch_add(1, Ordering::Relaxed);
                if let Some(evicted) = evicted {
                    tracing::warn!(
                        session_id = %evicted.session_id,
                        event = evicted.kind.wire_name(),
                        "notification queue full, dropped oldest event"
                    );
                }
            }
            queue.push_back(event);
        }

        self.shared
            .metrics
            .notifications_enqueued
            .fetch_add(1, Ordering::Relaxed);
        self.shared.wakeup.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Stop accepting events, drain what is queued, and wait for the worker.
    pub async fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.wakeup.notify_one();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn run_worker(shared: Arc<DispatcherShared>) {
    tracing::debug!("notification worker started");

    loop {
        let next = shared.queue.lock().pop_front();

        match next {
            Some(event) => {
                let payload = WirePayload::from(&event);
                match shared.transport.deliver(&payload).await {
                    Ok(()) => {
                        shared
                            .metrics
                            .notifications_delivered
                            .fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        shared
                            .metrics
                            .notifications_failed
                            .fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            session_id = %event.session_id,
                            event = event.kind.wire_name(),
                            error = %e,
                            "notification delivery failed"
                        );
                    }
                }
            }
            None => {
                if shared.closed.load(Ordering::Acquire) {
                    break;
                }
                shared.wakeup.notified().await;
            }
        }
    }

    tracing::debug!("notification worker stopped");
}
