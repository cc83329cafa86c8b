use crate::analysis::frames::FrameSegmenter;
use crate::analysis::mfcc::{CepstralTransform, MfccError, MfccPlan};
use crate::config::{AnalysisConfig, FeatureStrategy, MFCC_COEFFICIENTS};
use crate::decode::Waveform;

const LOG_TARGET: &str = "analysis::features";

pub fn rms(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_sq / frame.len() as f64).sqrt()
}

/// Sign flips between adjacent samples, divided by the frame length.
/// Zero counts as positive.
pub fn zero_crossing_rate(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / frame.len() as f64
}

#[derive(Clone, Debug, PartialEq)]
pub enum Cepstrum {
    /// Frame under the silence threshold; no transform was run.
    Silent,
    Coefficients(Vec<f64>),
    Failed(MfccError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum FrameFeatures {
    RmsZcr { rms: f64, zcr: f64, voiced: bool },
    Mfcc { rms: f64, voiced: bool, cepstrum: Cepstrum },
}

impl FrameFeatures {
    pub fn voiced(&self) -> bool {
        match self {
            FrameFeatures::RmsZcr { voiced, .. } | FrameFeatures::Mfcc { voiced, .. } => *voiced,
        }
    }

    pub fn rms(&self) -> f64 {
        match self {
            FrameFeatures::RmsZcr { rms, .. } | FrameFeatures::Mfcc { rms, .. } => *rms,
        }
    }
}

/// Per-frame features of a whole recording.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureSet {
    pub strategy: FeatureStrategy,
    pub frames: Vec<FrameFeatures>,
    /// First spectral failure seen, if any. A degraded set contributes no
    /// cepstral vectors at all.
    pub spectral_failure: Option<MfccError>,
}

impl FeatureSet {
    pub fn voiced_count(&self) -> usize {
        self.frames.iter().filter(|f| f.voiced()).count()
    }

    pub fn voiced_ratio(&self) -> f64 {
        if self.frames.is_empty() {
            return 0.0;
        }
        self.voiced_count() as f64 / self.frames.len() as f64
    }

    /// Cepstral vectors of voiced frames, or nothing when the transform failed.
    pub fn cepstra(&self) -> Vec<&[f64]> {
        if self.spectral_failure.is_some() {
            return Vec::new();
        }
        self.frames
            .iter()
            .filter_map(|f| match f {
                FrameFeatures::Mfcc {
                    voiced: true,
                    cepstrum: Cepstrum::Coefficients(c),
                    ..
                } => Some(c.as_slice()),
                _ => None,
            })
            .collect()
    }
}

/// Per-frame feature strategy, fixed when the extractor is built.
pub enum FeatureExtractor {
    RmsZcr {
        silence_threshold: f32,
    },
    Mfcc {
        silence_threshold: f32,
        expected_coefficients: usize,
        transform: Option<Box<dyn CepstralTransform>>,
    },
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureExtractor::RmsZcr { silence_threshold } => f
                .debug_struct("RmsZcr")
                .field("silence_threshold", silence_threshold)
                .finish(),
            FeatureExtractor::Mfcc {
                silence_threshold,
                expected_coefficients,
                transform,
            } => f
                .debug_struct("Mfcc")
                .field("silence_threshold", silence_threshold)
                .field("expected_coefficients", expected_coefficients)
                .field("transform_available", &transform.is_some())
                .finish(),
        }
    }
}

impl FeatureExtractor {
    /// Builds the extractor for one recording at `sample_rate`.
    pub fn for_recording(config: &AnalysisConfig, sample_rate: u32) -> Self {
        match config.strategy {
            FeatureStrategy::RmsZcr => FeatureExtractor::RmsZcr {
                silence_threshold: config.silence_threshold,
            },
            FeatureStrategy::Mfcc => {
                let mfcc = config.mfcc_for(sample_rate);
                let transform = match MfccPlan::new(mfcc) {
                    Ok(plan) => Some(Box::new(plan) as Box<dyn CepstralTransform>),
                    Err(e) => {
                        tracing::warn!(target: LOG_TARGET, error = %e, ?mfcc, "mfcc plan unavailable");
                        None
                    }
                };
                FeatureExtractor::Mfcc {
                    silence_threshold: config.silence_threshold,
                    expected_coefficients: mfcc.coefficients,
                    transform,
                }
            }
        }
    }

    pub fn with_transform(silence_threshold: f32, transform: Box<dyn CepstralTransform>) -> Self {
        FeatureExtractor::Mfcc {
            silence_threshold,
            expected_coefficients: MFCC_COEFFICIENTS,
            transform: Some(transform),
        }
    }

    pub fn strategy(&self) -> FeatureStrategy {
        match self {
            FeatureExtractor::RmsZcr { .. } => FeatureStrategy::RmsZcr,
            FeatureExtractor::Mfcc { .. } => FeatureStrategy::Mfcc,
        }
    }

    pub fn extract_frame(&self, frame: &[f32]) -> FrameFeatures {
        let rms = rms(frame);
        match self {
            FeatureExtractor::RmsZcr { silence_threshold } => FrameFeatures::RmsZcr {
                rms,
                zcr: zero_crossing_rate(frame),
                voiced: rms > f64::from(*silence_threshold),
            },
            FeatureExtractor::Mfcc {
                silence_threshold,
                expected_coefficients,
                transform,
            } => {
                let voiced = rms > f64::from(*silence_threshold);
                let cepstrum = if !voiced {
                    Cepstrum::Silent
                } else {
                    match transform {
                        None => Cepstrum::Failed(MfccError::Unavailable),
                        Some(t) => match validate(t.cepstrum(frame), *expected_coefficients) {
                            Ok(c) => Cepstrum::Coefficients(c),
                            Err(e) => Cepstrum::Failed(e),
                        },
                    }
                };
                FrameFeatures::Mfcc {
                    rms,
                    voiced,
                    cepstrum,
                }
            }
        }
    }

    pub fn extract(&self, waveform: &Waveform, segmenter: FrameSegmenter) -> FeatureSet {
        let frames: Vec<FrameFeatures> = segmenter
            .segment(waveform.samples())
            .map(|f| self.extract_frame(f))
            .collect();

        let mut failures = frames.iter().filter_map(|f| match f {
            FrameFeatures::Mfcc {
                cepstrum: Cepstrum::Failed(e),
                ..
            } => Some(e),
            _ => None,
        });
        let spectral_failure = failures.next().cloned();
        if let Some(e) = &spectral_failure {
            tracing::warn!(
                target: LOG_TARGET,
                error = %e,
                failed_frames = failures.count() + 1,
                "spectral features unavailable, falling back to voiced ratio"
            );
        }

        FeatureSet {
            strategy: self.strategy(),
            frames,
            spectral_failure,
        }
    }
}

fn validate(result: Result<Vec<f64>, MfccError>, expected: usize) -> Result<Vec<f64>, MfccError> {
    let coefficients = result?;
    if coefficients.len() != expected {
        return Err(MfccError::CoefficientCount {
            expected,
            got: coefficients.len(),
        });
    }
    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(MfccError::NonFinite);
    }
    Ok(coefficients)
}
