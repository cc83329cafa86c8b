mod scorer;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use scorer::{rms_zcr_raw_stress, StressScorer};

/// Voice state inferred from one recording.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Silent,
    Calm,
    Neutral,
    Excited,
    Anxious,
    Stressed,
}

impl Emotion {
    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Silent => "silent",
            Emotion::Calm => "calm",
            Emotion::Neutral => "neutral",
            Emotion::Excited => "excited",
            Emotion::Anxious => "anxious",
            Emotion::Stressed => "stressed",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal conditions worth showing next to a result.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StressWarning {
    InsufficientSpeech,
    SpectralFeaturesUnavailable,
}

impl StressWarning {
    pub fn message(self) -> &'static str {
        match self {
            StressWarning::InsufficientSpeech => {
                "Too little speech detected, please speak clearly for the whole recording."
            }
            StressWarning::SpectralFeaturesUnavailable => {
                "Basic analysis only: spectral features were unavailable for this recording."
            }
        }
    }
}

impl fmt::Display for StressWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StressResult {
    pub emotion: Emotion,
    /// Always within `[0, 0.97]`.
    pub stress_score: f64,
    /// Fraction of voiced frames, `[0, 1]`.
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<StressWarning>,
}

impl StressResult {
    /// Stress on the 0–100 scale used for fusion.
    pub fn speech_score(&self) -> u8 {
        (self.stress_score * 100.0).round().clamp(0.0, 100.0) as u8
    }
}
