use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};

pub const FRAME_SIZE: usize = 1024;
pub const SILENCE_THRESHOLD: f32 = 0.008;
pub const SILENCE_GUARD_RATIO: f64 = 0.15;
pub const MFCC_COEFFICIENTS: usize = 13;
pub const MEL_BANDS: usize = 26;
pub const RMS_ZCR_RECORDING: Duration = Duration::from_secs(10);
pub const MFCC_RECORDING: Duration = Duration::from_secs(8);
pub const DEFAULT_STRATEGY: &str = "rms-zcr";
pub const ENV_STRATEGY: &str = "VOICE_STRESS_STRATEGY";

/// Which per-frame feature set drives the stress estimate.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureStrategy {
    #[default]
    RmsZcr,
    Mfcc,
}

impl FeatureStrategy {
    pub fn recording_duration(self) -> Duration {
        match self {
            FeatureStrategy::RmsZcr => RMS_ZCR_RECORDING,
            FeatureStrategy::Mfcc => MFCC_RECORDING,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureStrategy::RmsZcr => "rms-zcr",
            FeatureStrategy::Mfcc => "mfcc",
        }
    }
}

impl fmt::Display for FeatureStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rms-zcr" | "rms_zcr" | "rmszcr" => Ok(FeatureStrategy::RmsZcr),
            "mfcc" => Ok(FeatureStrategy::Mfcc),
            other => Err(ConfigError::UnknownStrategy(other.to_owned())),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    pub strategy: FeatureStrategy,
    pub frame_size: usize,
    pub silence_threshold: f32,
    pub recording: Duration,
}

impl AnalysisConfig {
    pub fn new(strategy: FeatureStrategy) -> Self {
        Self {
            strategy,
            frame_size: FRAME_SIZE,
            silence_threshold: SILENCE_THRESHOLD,
            recording: strategy.recording_duration(),
        }
    }

    pub fn mfcc_for(&self, sample_rate: u32) -> MfccConfig {
        MfccConfig {
            sample_rate,
            frame_size: self.frame_size,
            coefficients: MFCC_COEFFICIENTS,
            mel_bands: MEL_BANDS,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::new(FeatureStrategy::default())
    }
}

/// Parameters of one MFCC extraction run. Built per recording, never shared
/// between recordings.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MfccConfig {
    pub sample_rate: u32,
    pub frame_size: usize,
    pub coefficients: usize,
    pub mel_bands: usize,
}

/// A stress reading on the 0–100 scale, from any modality (face, speech,
/// wearable).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct StressPercent(u8);

impl StressPercent {
    pub fn new(value: u32) -> Result<Self, ConfigError> {
        if value > 100 {
            return Err(ConfigError::ScoreOutOfRange(value));
        }
        Ok(Self(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown feature strategy {0:?} (expected rms-zcr or mfcc)")]
    UnknownStrategy(String),
    #[error("stress score must be within 0..=100, got {0}")]
    ScoreOutOfRange(u32),
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

pub fn resolve_strategy(
    cli_value: Option<String>,
    env: &impl Env,
) -> Result<FeatureStrategy, ConfigError> {
    match cli_value.or_else(|| env.var(ENV_STRATEGY)) {
        Some(v) => v.parse(),
        None => DEFAULT_STRATEGY.parse(),
    }
}
