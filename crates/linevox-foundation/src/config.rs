//! Process-wide configuration, loaded once at startup and read-only after.
//!
//! There is no global singleton: the engine receives a [`GlobalConfig`] value
//! at construction and per-session overrides are layered on top of it when a
//! detection session starts.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which side(s) of the call a session monitors.
///
/// Frames arrive tagged `A` or `B`; a session configured with `Both` feeds
/// frames from either side into the same state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    A,
    B,
    Both,
}

impl Leg {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "a" => Some(Leg::A),
            "b" => Some(Leg::B),
            "both" => Some(Leg::Both),
            _ => None,
        }
    }

    /// Whether a frame tagged `frame_leg` belongs to this monitoring mode.
    pub fn monitors(&self, frame_leg: Leg) -> bool {
        matches!(self, Leg::Both) || *self == frame_leg
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Leg::A => "a",
            Leg::B => "b",
            Leg::Both => "both",
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container format passed to the host recording sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingFormat {
    Wav,
    Mp3,
    Ogg,
}

impl RecordingFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Some(RecordingFormat::Wav),
            "mp3" => Some(RecordingFormat::Mp3),
            "ogg" => Some(RecordingFormat::Ogg),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            RecordingFormat::Wav => "wav",
            RecordingFormat::Mp3 => "mp3",
            RecordingFormat::Ogg => "ogg",
        }
    }
}

impl fmt::Display for RecordingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Process-lifetime defaults for the detection engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Notification collector endpoint. No outbound calls when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Bearer credential for the collector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub recording_path: String,
    pub recording_prefix: String,
    pub energy_threshold: f32,
    pub frame_size_samples: usize,
    pub sample_rate_hz: u32,
    /// Minimum spacing between VoiceStarted/VoiceEnded notifications per
    /// session.
    pub debounce_ms: u64,
    pub max_silence_ms: u64,
    pub auto_record: bool,
    pub recording_format: RecordingFormat,
    /// Bounded notification queue depth; overflow drops the oldest event.
    pub notify_queue_depth: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            recording_path: "/tmp".to_string(),
            recording_prefix: "voice_detection".to_string(),
            energy_threshold: 0.05,
            frame_size_samples: 160,
            sample_rate_hz: 8000,
            debounce_ms: 500,
            max_silence_ms: 2000,
            auto_record: true,
            recording_format: RecordingFormat::Wav,
            notify_queue_depth: 64,
        }
    }
}

impl GlobalConfig {
    /// Duration of one frame at the negotiated frame size and sample rate.
    pub fn frame_duration_ms(&self) -> u64 {
        (self.frame_size_samples as u64 * 1000) / self.sample_rate_hz as u64
    }

    /// Load from an optional TOML file with a `LINEVOX_*` environment
    /// overlay. Missing keys fall back to the documented defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(p) = path {
            builder = builder.add_source(config::File::from(p));
        }
        builder
            .add_source(config::Environment::with_prefix("LINEVOX"))
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| ConfigError::Load(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_telephony_narrowband() {
        let cfg = GlobalConfig::default();
        assert_eq!(cfg.frame_size_samples, 160);
        assert_eq!(cfg.sample_rate_hz, 8000);
        assert_eq!(cfg.frame_duration_ms(), 20);
        assert_eq!(cfg.recording_format, RecordingFormat::Wav);
        assert!(cfg.api_url.is_none());
    }

    #[test]
    fn leg_parsing_is_case_insensitive() {
        assert_eq!(Leg::parse("A"), Some(Leg::A));
        assert_eq!(Leg::parse("both"), Some(Leg::Both));
        assert_eq!(Leg::parse("c"), None);
    }

    #[test]
    fn leg_both_monitors_either_side() {
        assert!(Leg::Both.monitors(Leg::A));
        assert!(Leg::Both.monitors(Leg::B));
        assert!(Leg::A.monitors(Leg::A));
        assert!(!Leg::A.monitors(Leg::B));
    }

    #[test]
    fn load_overlays_file_on_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "api_url = \"http://collector.example/events\"\nenergy_threshold = 0.1"
        )
        .unwrap();

        let cfg = GlobalConfig::load(Some(file.path())).unwrap();
        assert_eq!(
            cfg.api_url.as_deref(),
            Some("http://collector.example/events")
        );
        assert_eq!(cfg.energy_threshold, 0.1);
        // Untouched keys keep their defaults.
        assert_eq!(cfg.debounce_ms, 500);
    }
}
