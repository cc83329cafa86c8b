use crate::analysis::features::{FeatureSet, FrameFeatures};
use crate::config::FeatureStrategy;
use serde::{Deserialize, Serialize};

/// Whole-recording summary of cepstral frames. Only voiced frames count.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct CepstralSummary {
    pub frames: usize,
    /// Mean of `|c1..c12|`, pooled over frames and coefficients.
    pub avg_magnitude: f64,
    /// Mean of c0 (log energy), signed.
    pub avg_c0: f64,
    /// Population variance across frames of the per-frame mean `|c2..c6|`.
    pub mid_band_variance: f64,
    /// Mean of `|c1|`.
    pub avg_c1: f64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum AggregateStatistics {
    RmsZcr {
        frames: usize,
        voiced_ratio: f64,
        avg_rms: f64,
        avg_zcr: f64,
    },
    Mfcc {
        frames: usize,
        voiced_ratio: f64,
        /// `None` when no usable voiced cepstral frame was collected.
        cepstral: Option<CepstralSummary>,
    },
}

impl AggregateStatistics {
    pub fn from_features(set: &FeatureSet) -> Self {
        let frames = set.frames.len();
        let voiced_ratio = set.voiced_ratio();
        match set.strategy {
            FeatureStrategy::RmsZcr => {
                let (sum_rms, sum_zcr) = set
                    .frames
                    .iter()
                    .filter_map(|f| match f {
                        FrameFeatures::RmsZcr { rms, zcr, .. } => Some((*rms, *zcr)),
                        FrameFeatures::Mfcc { .. } => None,
                    })
                    .fold((0.0, 0.0), |(r, z), (rms, zcr)| (r + rms, z + zcr));
                let (avg_rms, avg_zcr) = if frames == 0 {
                    (0.0, 0.0)
                } else {
                    (sum_rms / frames as f64, sum_zcr / frames as f64)
                };
                AggregateStatistics::RmsZcr {
                    frames,
                    voiced_ratio,
                    avg_rms,
                    avg_zcr,
                }
            }
            FeatureStrategy::Mfcc => AggregateStatistics::Mfcc {
                frames,
                voiced_ratio,
                cepstral: summarize_cepstra(&set.cepstra()),
            },
        }
    }

    pub fn voiced_ratio(&self) -> f64 {
        match self {
            AggregateStatistics::RmsZcr { voiced_ratio, .. }
            | AggregateStatistics::Mfcc { voiced_ratio, .. } => *voiced_ratio,
        }
    }

    pub fn frames(&self) -> usize {
        match self {
            AggregateStatistics::RmsZcr { frames, .. } | AggregateStatistics::Mfcc { frames, .. } => {
                *frames
            }
        }
    }
}

/// Reduces voiced-frame cepstra. Vectors shorter than seven coefficients are
/// ignored; an empty input yields `None`, never an average of nothing.
pub fn summarize_cepstra(vectors: &[&[f64]]) -> Option<CepstralSummary> {
    let usable: Vec<&[f64]> = vectors.iter().copied().filter(|v| v.len() >= 7).collect();
    if usable.is_empty() {
        return None;
    }
    let n = usable.len() as f64;

    let avg_c0 = usable.iter().map(|v| v[0]).sum::<f64>() / n;
    let avg_c1 = usable.iter().map(|v| v[1].abs()).sum::<f64>() / n;

    let (magnitude_sum, magnitude_count) = usable.iter().fold((0.0, 0usize), |(s, c), v| {
        let tail = &v[1..v.len().min(13)];
        (s + tail.iter().map(|x| x.abs()).sum::<f64>(), c + tail.len())
    });
    let avg_magnitude = magnitude_sum / magnitude_count as f64;

    let mid_band: Vec<f64> = usable
        .iter()
        .map(|v| v[2..=6].iter().map(|x| x.abs()).sum::<f64>() / 5.0)
        .collect();
    let mid_mean = mid_band.iter().sum::<f64>() / n;
    let mid_band_variance = mid_band.iter().map(|m| (m - mid_mean).powi(2)).sum::<f64>() / n;

    Some(CepstralSummary {
        frames: usable.len(),
        avg_magnitude,
        avg_c0,
        mid_band_variance,
        avg_c1,
    })
}
