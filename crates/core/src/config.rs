use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_FRAME_LENGTH_MS: f64 = 25.0;
pub const DEFAULT_FRAME_SHIFT_MS: f64 = 10.0;
pub const DEFAULT_PITCH_MIN_HZ: f64 = 50.0;
pub const DEFAULT_PITCH_MAX_HZ: f64 = 400.0;
pub const DEFAULT_MIN_SEGMENT_DURATION_S: f64 = 1.0;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;
pub const DEFAULT_PAIN_SENSITIVITY: f64 = 0.7;
pub const DEFAULT_DISTRESS_SENSITIVITY: f64 = 0.8;
pub const DEFAULT_ANXIETY_SENSITIVITY: f64 = 1.0;

pub const ENV_SAMPLE_RATE: &str = "VOICE_BIOMARKER_SAMPLE_RATE";
pub const ENV_WORKERS: &str = "VOICE_BIOMARKER_WORKERS";
pub const ENV_QUEUE_CAPACITY: &str = "VOICE_BIOMARKER_QUEUE_CAPACITY";

/// Confidence thresholds for the five intensity buckets, lowest first.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntensityThresholds {
    pub very_low: f64,
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub very_high: f64,
}

impl IntensityThresholds {
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.very_low,
            self.low,
            self.medium,
            self.high,
            self.very_high,
        ]
    }
}

impl Default for IntensityThresholds {
    fn default() -> Self {
        Self {
            very_low: 0.2,
            low: 0.4,
            medium: 0.6,
            high: 0.8,
            very_high: 0.9,
        }
    }
}

/// Relative weight of each feature family.
///
/// Reserved: validated and serialized with the rest of the configuration, but
/// no analysis stage reads it. The rule table uses fixed thresholds.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureWeights {
    pub pitch: f64,
    pub energy: f64,
    pub spectral: f64,
    pub voice_quality: f64,
}

impl FeatureWeights {
    pub fn total(&self) -> f64 {
        self.pitch + self.energy + self.spectral + self.voice_quality
    }
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            pitch: 0.3,
            energy: 0.25,
            spectral: 0.2,
            voice_quality: 0.25,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub frame_length_ms: f64,
    pub frame_shift_ms: f64,
    pub pitch_min_hz: f64,
    pub pitch_max_hz: f64,
    pub enable_medical_emotions: bool,
    pub enable_temporal_analysis: bool,
    pub min_segment_duration_s: f64,
    pub confidence_threshold: f64,
    pub intensity_thresholds: IntensityThresholds,
    pub pain_detection_sensitivity: f64,
    pub distress_detection_sensitivity: f64,
    pub anxiety_detection_sensitivity: f64,
    pub feature_weights: FeatureWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_length_ms: DEFAULT_FRAME_LENGTH_MS,
            frame_shift_ms: DEFAULT_FRAME_SHIFT_MS,
            pitch_min_hz: DEFAULT_PITCH_MIN_HZ,
            pitch_max_hz: DEFAULT_PITCH_MAX_HZ,
            enable_medical_emotions: true,
            enable_temporal_analysis: true,
            min_segment_duration_s: DEFAULT_MIN_SEGMENT_DURATION_S,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            intensity_thresholds: IntensityThresholds::default(),
            pain_detection_sensitivity: DEFAULT_PAIN_SENSITIVITY,
            distress_detection_sensitivity: DEFAULT_DISTRESS_SENSITIVITY,
            anxiety_detection_sensitivity: DEFAULT_ANXIETY_SENSITIVITY,
            feature_weights: FeatureWeights::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if !(self.frame_length_ms > 0.0) || !(self.frame_shift_ms > 0.0) {
            return Err(ConfigError::InvalidFraming);
        }
        if !(self.pitch_min_hz > 0.0) || !(self.pitch_max_hz > self.pitch_min_hz) {
            return Err(ConfigError::InvalidPitchBand {
                min_hz: self.pitch_min_hz,
                max_hz: self.pitch_max_hz,
            });
        }
        if !(self.min_segment_duration_s > 0.0) {
            return Err(ConfigError::InvalidSegmentDuration);
        }
        check_unit("confidence_threshold", self.confidence_threshold)?;
        check_unit("pain_detection_sensitivity", self.pain_detection_sensitivity)?;
        check_unit(
            "distress_detection_sensitivity",
            self.distress_detection_sensitivity,
        )?;
        check_unit(
            "anxiety_detection_sensitivity",
            self.anxiety_detection_sensitivity,
        )?;

        let thresholds = self.intensity_thresholds.as_array();
        for t in thresholds {
            check_unit("intensity_thresholds", t)?;
        }
        if thresholds.windows(2).any(|w| w[1] < w[0]) {
            return Err(ConfigError::UnorderedIntensityThresholds);
        }

        let w = self.feature_weights;
        if [w.pitch, w.energy, w.spectral, w.voice_quality]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
            || !(w.total() > 0.0)
        {
            return Err(ConfigError::InvalidFeatureWeights);
        }
        Ok(())
    }
}

/// Milliseconds to a sample count, never below one sample.
pub(crate) fn ms_to_samples(ms: f64, sample_rate: u32) -> usize {
    seconds_to_samples(ms / 1000.0, sample_rate)
}

pub(crate) fn seconds_to_samples(seconds: f64, sample_rate: u32) -> usize {
    ((seconds * f64::from(sample_rate)).round() as usize).max(1)
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { field, value })
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl PoolConfig {
    pub fn new(workers: usize, queue_capacity: usize) -> Result<Self, ConfigError> {
        if workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(Self {
            workers,
            queue_capacity,
        })
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            workers,
            queue_capacity: workers.saturating_mul(4),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("sample rate must be > 0 Hz")]
    ZeroSampleRate,
    #[error("frame length and frame shift must be > 0 ms")]
    InvalidFraming,
    #[error("pitch band must satisfy 0 < min < max (got {min_hz}..{max_hz} Hz)")]
    InvalidPitchBand { min_hz: f64, max_hz: f64 },
    #[error("min segment duration must be > 0 s")]
    InvalidSegmentDuration,
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },
    #[error("intensity thresholds must be non-decreasing")]
    UnorderedIntensityThresholds,
    #[error("feature weights must be finite, non-negative and not all zero")]
    InvalidFeatureWeights,
    #[error("worker count must be > 0")]
    ZeroWorkers,
    #[error("queue capacity must be > 0")]
    ZeroQueueCapacity,
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnvValue { key: String, value: String },
    #[error("malformed config: {0}")]
    Malformed(String),
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// CLI value first, then the environment; `None` when neither is set.
pub fn resolve_parsed<T: FromStr>(
    cli_value: Option<T>,
    env_key: &str,
    env: &impl Env,
) -> Result<Option<T>, ConfigError> {
    match cli_value {
        Some(v) => Ok(Some(v)),
        None => match env.var(env_key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidEnvValue {
                    key: env_key.to_owned(),
                    value: raw,
                }),
            None => Ok(None),
        },
    }
}

pub fn resolve_parsed_with_default<T: FromStr>(
    cli_value: Option<T>,
    env_key: &str,
    env: &impl Env,
    default: T,
) -> Result<T, ConfigError> {
    Ok(resolve_parsed(cli_value, env_key, env)?.unwrap_or(default))
}
