//! Per-session runtime parameters, resolved once at session start.
//!
//! Resolution layers a whitespace-separated `key=value` override string over
//! the global configuration, which itself sits over the engine defaults.
//! Unknown keys are ignored for forward compatibility (logged at warn);
//! malformed values reject the whole resolution, and with it the session
//! start. This is the only point where bad configuration is observable.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use linevox_foundation::{ConfigError, GlobalConfig, Leg, RecordingFormat};

use crate::constants::{
    DEFAULT_BETWEEN_WORDS_SILENCE_MS, DEFAULT_CONFIRM_HITS, DEFAULT_MAX_WORD_MS,
    DEFAULT_MIN_WORD_MS,
};

/// Immutable per-session detection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeParameters {
    pub energy_threshold: f32,
    pub confirm_hits: u32,
    pub min_word_ms: u64,
    pub max_word_ms: u64,
    pub between_words_silence_ms: u64,
    pub max_silence_ms: u64,
    pub auto_record: bool,
    pub recording_format: RecordingFormat,
    pub recording_path: String,
    pub recording_prefix: String,
    pub leg: Leg,
}

impl RuntimeParameters {
    /// Parameters as the global configuration dictates, before overrides.
    pub fn from_global(global: &GlobalConfig) -> Self {
        Self {
            energy_threshold: global.energy_threshold,
            confirm_hits: DEFAULT_CONFIRM_HITS,
            min_word_ms: DEFAULT_MIN_WORD_MS,
            max_word_ms: DEFAULT_MAX_WORD_MS,
            between_words_silence_ms: DEFAULT_BETWEEN_WORDS_SILENCE_MS,
            max_silence_ms: global.max_silence_ms,
            auto_record: global.auto_record,
            recording_format: global.recording_format,
            recording_path: global.recording_path.clone(),
            recording_prefix: global.recording_prefix.clone(),
            leg: Leg::A,
        }
    }

    /// Resolve session parameters from the global configuration and an
    /// override string such as `"hits=3 leg=both max_silence=1500"`.
    pub fn resolve(global: &GlobalConfig, overrides: &str) -> Result<Self, ConfigError> {
        let mut params = Self::from_global(global);

        for token in overrides.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                tracing::warn!(token, "ignoring malformed runtime override");
                continue;
            };

            match key {
                "energy_threshold" => params.energy_threshold = parse_number(key, value)?,
                "hits" => params.confirm_hits = parse_number(key, value)?,
                "min_word_length" => params.min_word_ms = parse_number(key, value)?,
                "maximum_word_length" => params.max_word_ms = parse_number(key, value)?,
                "between_words_silence" => {
                    params.between_words_silence_ms = parse_number(key, value)?
                }
                "max_silence" => params.max_silence_ms = parse_number(key, value)?,
                "auto_record" => params.auto_record = parse_flag(key, value)?,
                "recording_format" => {
                    params.recording_format = RecordingFormat::parse(value)
                        .ok_or_else(|| ConfigError::invalid(key, value))?
                }
                "recording_path" => params.recording_path = value.to_string(),
                "recording_prefix" => params.recording_prefix = value.to_string(),
                "leg" => {
                    params.leg =
                        Leg::parse(value).ok_or_else(|| ConfigError::invalid(key, value))?
                }
                _ => tracing::warn!(key, "ignoring unrecognized runtime override key"),
            }
        }

        Ok(params)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, value))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(ConfigError::invalid(key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_overrides_keep_global_values() {
        let global = GlobalConfig::default();
        let params = RuntimeParameters::resolve(&global, "").unwrap();
        assert_eq!(params, RuntimeParameters::from_global(&global));
    }

    #[test]
    fn override_equal_to_default_is_a_no_op() {
        let global = GlobalConfig::default();
        let bare = RuntimeParameters::resolve(&global, "").unwrap();
        let explicit = RuntimeParameters::resolve(&global, "hits=2").unwrap();
        assert_eq!(bare, explicit);
    }

    #[test]
    fn overrides_layer_over_globals() {
        let global = GlobalConfig {
            energy_threshold: 0.1,
            ..Default::default()
        };
        let params = RuntimeParameters::resolve(
            &global,
            "hits=4 leg=both max_silence=1500 recording_format=ogg auto_record=false",
        )
        .unwrap();

        assert_eq!(params.energy_threshold, 0.1); // from global
        assert_eq!(params.confirm_hits, 4);
        assert_eq!(params.leg, Leg::Both);
        assert_eq!(params.max_silence_ms, 1500);
        assert_eq!(params.recording_format, RecordingFormat::Ogg);
        assert!(!params.auto_record);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let global = GlobalConfig::default();
        let params = RuntimeParameters::resolve(&global, "future_knob=7 hits=3").unwrap();
        assert_eq!(params.confirm_hits, 3);
    }

    #[test]
    fn malformed_numeric_value_rejects_resolution() {
        let global = GlobalConfig::default();
        let err = RuntimeParameters::resolve(&global, "hits=abc").unwrap_err();
        assert_eq!(err, ConfigError::invalid("hits", "abc"));
    }

    #[test]
    fn invalid_leg_rejects_resolution() {
        let global = GlobalConfig::default();
        assert!(RuntimeParameters::resolve(&global, "leg=c").is_err());
    }

    #[test]
    fn invalid_format_rejects_resolution() {
        let global = GlobalConfig::default();
        assert!(RuntimeParameters::resolve(&global, "recording_format=flac").is_err());
    }

    #[test]
    fn auto_record_accepts_numeric_and_boolean_forms() {
        let global = GlobalConfig::default();
        assert!(
            RuntimeParameters::resolve(&global, "auto_record=1")
                .unwrap()
                .auto_record
        );
        assert!(
            !RuntimeParameters::resolve(&global, "auto_record=false")
                .unwrap()
                .auto_record
        );
        assert!(RuntimeParameters::resolve(&global, "auto_record=maybe").is_err());
    }

    #[test]
    fn token_without_equals_is_skipped() {
        let global = GlobalConfig::default();
        let params = RuntimeParameters::resolve(&global, "garbage hits=5").unwrap();
        assert_eq!(params.confirm_hits, 5);
    }
}
