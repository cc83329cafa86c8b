use crate::analysis::{AggregateStatistics, CepstralSummary};
use crate::config::SILENCE_GUARD_RATIO;
use crate::emotion::{Emotion, StressResult, StressWarning};

const LOG_TARGET: &str = "emotion::scorer";

pub const MAX_STRESS: f64 = 0.97;
const SILENT_STRESS: f64 = 0.10;
const MIN_SPEECH_STRESS: f64 = 0.05;

// Calibrated ceilings: RMS 0.18 is loud speech, ZCR 0.12 a high-tension voice.
const RMS_CEILING: f64 = 0.18;
const ZCR_CEILING: f64 = 0.12;

/// Maps aggregate features to a bounded stress estimate. Never fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct StressScorer;

impl StressScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, stats: &AggregateStatistics) -> StressResult {
        let voiced_ratio = sanitize(stats.voiced_ratio()).clamp(0.0, 1.0);
        if voiced_ratio < SILENCE_GUARD_RATIO {
            tracing::debug!(target: LOG_TARGET, voiced_ratio, "insufficient speech");
            return StressResult {
                emotion: Emotion::Silent,
                stress_score: SILENT_STRESS,
                confidence: voiced_ratio,
                warning: Some(StressWarning::InsufficientSpeech),
            };
        }

        let result = match stats {
            AggregateStatistics::RmsZcr {
                avg_rms, avg_zcr, ..
            } => score_rms_zcr(sanitize(*avg_rms), sanitize(*avg_zcr), voiced_ratio),
            AggregateStatistics::Mfcc {
                cepstral: Some(summary),
                ..
            } => score_cepstral(summary, voiced_ratio),
            AggregateStatistics::Mfcc { cepstral: None, .. } => voiced_ratio_fallback(voiced_ratio),
        };

        tracing::debug!(
            target: LOG_TARGET,
            emotion = %result.emotion,
            stress = result.stress_score,
            confidence = result.confidence,
            "scored recording"
        );
        result
    }
}

/// The weighted loudness/tension blend before emotion biasing.
pub fn rms_zcr_raw_stress(avg_rms: f64, avg_zcr: f64) -> f64 {
    let norm_rms = (avg_rms / RMS_CEILING).min(1.0);
    let norm_zcr = (avg_zcr / ZCR_CEILING).min(1.0);
    0.55 * norm_rms + 0.45 * norm_zcr
}

fn score_rms_zcr(avg_rms: f64, avg_zcr: f64, voiced_ratio: f64) -> StressResult {
    let norm_rms = (avg_rms / RMS_CEILING).min(1.0);
    let norm_zcr = (avg_zcr / ZCR_CEILING).min(1.0);
    let raw = rms_zcr_raw_stress(avg_rms, avg_zcr);
    let high_energy = norm_rms > 0.5;
    let high_zcr = norm_zcr > 0.5;

    let (emotion, base) = match (high_energy, high_zcr) {
        (true, true) => (Emotion::Stressed, 0.78),
        (true, false) => (Emotion::Excited, 0.42),
        (false, true) => (Emotion::Anxious, 0.60),
        (false, false) if norm_rms < 0.20 && norm_zcr < 0.25 => (Emotion::Calm, 0.08),
        (false, false) => (Emotion::Neutral, 0.32),
    };

    StressResult {
        emotion,
        stress_score: (base + 0.15 * raw).clamp(0.0, MAX_STRESS),
        confidence: round2(voiced_ratio),
        warning: None,
    }
}

fn score_cepstral(summary: &CepstralSummary, voiced_ratio: f64) -> StressResult {
    let avg_magnitude = sanitize(summary.avg_magnitude);
    let avg_c0 = sanitize(summary.avg_c0);
    let variance = sanitize(summary.mid_band_variance);
    let avg_c1 = sanitize(summary.avg_c1);

    let norm_magnitude = (avg_magnitude / 20.0).min(1.0);
    let norm_energy = (avg_c0.abs() / 150.0).min(1.0);
    let norm_variance = (variance / 50.0).min(1.0);
    let norm_pitch = (avg_c1 / 12.0).min(1.0);

    let mut base = 0.35 * norm_magnitude + 0.35 * norm_variance + 0.15 * norm_energy + 0.15 * norm_pitch;
    if base < 0.1 && avg_magnitude > 0.05 {
        base = (base * 1.5).max(0.1);
    }

    // Emotion thresholds run on their own scale: signed c0 over 8, variance over 0.5.
    let class_energy = (avg_c0 / 8.0).min(1.0);
    let class_variance = (variance / 0.5).min(1.0);
    let high_energy = class_energy > 0.5;
    let high_variance = class_variance > 0.5;
    let high_stress = base > 0.6;

    let (emotion, bias) = if high_stress && high_variance {
        (Emotion::Stressed, 0.15)
    } else if high_energy && !high_stress {
        (Emotion::Excited, 0.0)
    } else if high_variance && !high_energy {
        (Emotion::Anxious, 0.10)
    } else if base < 0.20 && class_energy < 0.25 {
        (Emotion::Calm, (-base * 0.2).max(-0.05))
    } else {
        (Emotion::Neutral, 0.0)
    };

    StressResult {
        emotion,
        stress_score: (base + bias).clamp(MIN_SPEECH_STRESS, MAX_STRESS),
        confidence: round2(voiced_ratio),
        warning: None,
    }
}

fn voiced_ratio_fallback(voiced_ratio: f64) -> StressResult {
    tracing::warn!(target: LOG_TARGET, voiced_ratio, "no cepstral frames, using voiced-ratio estimate");
    StressResult {
        emotion: if voiced_ratio > 0.5 {
            Emotion::Neutral
        } else {
            Emotion::Silent
        },
        stress_score: (0.1 + 0.4 * voiced_ratio).min(0.3),
        confidence: voiced_ratio,
        warning: Some(StressWarning::SpectralFeaturesUnavailable),
    }
}

fn sanitize(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
