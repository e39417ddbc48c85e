//! Per-session speech segmentation state machine.
//!
//! Consumes one normalized energy value per frame and tracks three regions:
//! idle, confirming (energetic frames seen but onset not yet confirmed), and
//! active confirmed speech. Inside the active region two counters segment the
//! span into words and detect its end by prolonged silence. The machine owns
//! no side effects; each frame yields a [`FrameDecision`] that the caller
//! maps onto recording and notification actions.

use std::time::Instant;

use serde::Serialize;

use linevox_foundation::SharedClock;

use crate::params::RuntimeParameters;

/// Detector configuration with the frame duration fixed at session start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    pub energy_threshold: f32,
    pub confirm_hits: u32,
    pub min_word_ms: u64,
    pub max_word_ms: u64,
    pub between_words_silence_ms: u64,
    pub max_silence_ms: u64,
    pub frame_duration_ms: u64,
}

impl DetectorConfig {
    pub fn from_params(
        params: &RuntimeParameters,
        frame_size_samples: usize,
        sample_rate_hz: u32,
    ) -> Self {
        Self {
            energy_threshold: params.energy_threshold,
            confirm_hits: params.confirm_hits,
            min_word_ms: params.min_word_ms,
            max_word_ms: params.max_word_ms,
            between_words_silence_ms: params.between_words_silence_ms,
            max_silence_ms: params.max_silence_ms,
            frame_duration_ms: (frame_size_samples as u64 * 1000) / sample_rate_hz as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VadState {
    Idle,
    Confirming,
    Active,
}

/// What one frame asked the caller to do. At most two fields are set per
/// frame (onset and confirmation can land together when `confirm_hits <= 1`).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameDecision {
    /// Energetic frame before confirmation; eligible for an optimistic
    /// VoiceStarted notification, subject to the caller's debounce.
    pub onset_candidate: bool,
    /// Speech confirmed on this frame; recording should start.
    pub confirmed: bool,
    /// A word boundary was crossed; payload is the word duration in ms.
    pub word_ms: Option<u64>,
    /// Confirmed span ended by prolonged silence; recording stops and
    /// VoiceEnded fires.
    pub span_ended: bool,
    /// Confirmed span exceeded the word-length ceiling and was discarded as
    /// noise; recording stops, no detection event fires.
    pub span_discarded: bool,
}

impl FrameDecision {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

pub struct SpeechDetector {
    config: DetectorConfig,
    clock: SharedClock,

    frames_seen: u64,
    consecutive_hits: u32,
    silence_frames: u32,
    current_word_ms: u64,
    word_started_at: Option<Instant>,
    voice_confirmed: bool,
    last_voice_at: Option<Instant>,
}

impl SpeechDetector {
    pub fn new(config: DetectorConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            frames_seen: 0,
            consecutive_hits: 0,
            silence_frames: 0,
            current_word_ms: 0,
            word_started_at: None,
            voice_confirmed: false,
            last_voice_at: None,
        }
    }

    /// Advance the machine by one frame of the given energy.
    pub fn process(&mut self, energy: f32) -> FrameDecision {
        let mut decision = FrameDecision::default();
        self.frames_seen += 1;
        let now = self.clock.now();

        if energy > self.config.energy_threshold {
            if !self.voice_confirmed {
                self.consecutive_hits += 1;
                decision.onset_candidate = true;

                if self.consecutive_hits >= self.config.confirm_hits {
                    self.voice_confirmed = true;
                    self.consecutive_hits = 0;
                    self.silence_frames = 0;
                    self.current_word_ms = 0;
                    self.word_started_at = Some(now);
                    self.last_voice_at = Some(now);
                    decision.confirmed = true;
                }
            } else {
                self.consecutive_hits = 0;
                self.last_voice_at = Some(now);
                self.current_word_ms += self.config.frame_duration_ms;

                if self.current_word_ms > self.config.max_word_ms {
                    // Nothing speaks this long in one breath; treat the whole
                    // span as noise.
                    self.voice_confirmed = false;
                    self.word_started_at = None;
                    decision.span_discarded = true;
                }
            }
        } else {
            self.consecutive_hits = 0;

            if self.voice_confirmed {
                self.silence_frames += 1;
                let silence_ms = self.silence_frames as u64 * self.config.frame_duration_ms;

                if silence_ms > self.config.max_silence_ms {
                    self.voice_confirmed = false;
                    self.word_started_at = None;
                    decision.span_ended = true;
                } else if silence_ms > self.config.between_words_silence_ms
                    && self.current_word_ms >= self.config.min_word_ms
                {
                    if let Some(started) = self.word_started_at {
                        tracing::trace!(
                            elapsed_ms = now.duration_since(started).as_millis() as u64,
                            word_ms = self.current_word_ms,
                            "word boundary"
                        );
                    }
                    decision.word_ms = Some(self.current_word_ms);
                    self.word_started_at = Some(now);
                    self.current_word_ms = 0;
                }
            }
        }

        decision
    }

    pub fn state(&self) -> VadState {
        if self.voice_confirmed {
            VadState::Active
        } else if self.consecutive_hits > 0 {
            VadState::Confirming
        } else {
            VadState::Idle
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn voice_confirmed(&self) -> bool {
        self.voice_confirmed
    }

    pub fn consecutive_hits(&self) -> u32 {
        self.consecutive_hits
    }

    pub fn last_voice_at(&self) -> Option<Instant> {
        self.last_voice_at
    }
}
