//! Mel-frequency cepstral coefficients for a single analysis frame.
//!
//! Hann window, power spectrum, triangular mel filterbank, `ln(1 + x)`
//! compression and an unnormalised DCT-II (scale 2). The scale of the
//! resulting coefficients is what the stress thresholds are tuned against,
//! so changing any of these steps shifts every downstream score.

use crate::config::MfccConfig;
use rustfft::{num_complex::Complex32, Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MfccError {
    #[error("spectral transform unavailable")]
    Unavailable,

    #[error("invalid mfcc configuration: {0}")]
    InvalidConfig(String),

    #[error("frame has {got} samples, expected {expected}")]
    FrameLength { expected: usize, got: usize },

    #[error("expected {expected} coefficients, got {got}")]
    CoefficientCount { expected: usize, got: usize },

    #[error("transform produced non-finite coefficients")]
    NonFinite,
}

/// Anything that turns one frame of samples into a cepstral vector.
pub trait CepstralTransform: Send + Sync {
    fn cepstrum(&self, frame: &[f32]) -> Result<Vec<f64>, MfccError>;
}

/// Precomputed FFT plan, window, filterbank and DCT basis for one
/// [`MfccConfig`].
pub struct MfccPlan {
    config: MfccConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    filterbank: Vec<Vec<f64>>,
    dct: Vec<Vec<f64>>,
}

impl std::fmt::Debug for MfccPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MfccPlan")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MfccPlan {
    pub fn new(config: MfccConfig) -> Result<Self, MfccError> {
        if config.sample_rate == 0 {
            return Err(MfccError::InvalidConfig("sample rate must be > 0".into()));
        }
        if config.frame_size < 2 {
            return Err(MfccError::InvalidConfig("frame size must be >= 2".into()));
        }
        if config.mel_bands == 0 || config.coefficients == 0 || config.coefficients > config.mel_bands {
            return Err(MfccError::InvalidConfig(format!(
                "need 0 < coefficients ({}) <= mel bands ({})",
                config.coefficients, config.mel_bands
            )));
        }

        let fft = FftPlanner::<f32>::new().plan_fft_forward(config.frame_size);
        Ok(Self {
            config,
            fft,
            window: hann_window(config.frame_size),
            filterbank: mel_filterbank(config.sample_rate, config.frame_size, config.mel_bands),
            dct: dct_basis(config.coefficients, config.mel_bands),
        })
    }

    pub fn config(&self) -> &MfccConfig {
        &self.config
    }

    fn power_spectrum(&self, frame: &[f32]) -> Vec<f64> {
        let mut buf: Vec<Complex32> = frame
            .iter()
            .zip(&self.window)
            .map(|(&s, &w)| Complex32::new(s * w, 0.0))
            .collect();
        self.fft.process(&mut buf);
        buf.iter()
            .take(self.config.frame_size / 2 + 1)
            .map(|c| f64::from(c.norm_sqr()))
            .collect()
    }
}

impl CepstralTransform for MfccPlan {
    fn cepstrum(&self, frame: &[f32]) -> Result<Vec<f64>, MfccError> {
        if frame.len() != self.config.frame_size {
            return Err(MfccError::FrameLength {
                expected: self.config.frame_size,
                got: frame.len(),
            });
        }

        let power = self.power_spectrum(frame);
        let log_mel: Vec<f64> = self
            .filterbank
            .iter()
            .map(|filter| {
                let energy: f64 = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
                energy.ln_1p()
            })
            .collect();

        Ok(self
            .dct
            .iter()
            .map(|basis| 2.0 * basis.iter().zip(&log_mel).map(|(b, m)| b * m).sum::<f64>())
            .collect())
    }
}

fn hann_window(n: usize) -> Vec<f32> {
    let denom = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / denom).cos())
        .collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    1125.0 * (1.0 + hz / 700.0).ln()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * ((mel / 1125.0).exp() - 1.0)
}

/// Triangular filters evenly spaced on the mel scale between 0 Hz and Nyquist,
/// each with unit peak, expressed as weights over the `n/2 + 1` FFT bins.
fn mel_filterbank(sample_rate: u32, frame_size: usize, bands: usize) -> Vec<Vec<f64>> {
    let bins = frame_size / 2 + 1;
    let nyquist = f64::from(sample_rate) / 2.0;
    let top = hz_to_mel(nyquist);
    let edges: Vec<usize> = (0..bands + 2)
        .map(|i| {
            let hz = mel_to_hz(top * i as f64 / (bands + 1) as f64);
            let bin = ((frame_size + 1) as f64 * hz / f64::from(sample_rate)).floor() as usize;
            bin.min(bins - 1)
        })
        .collect();

    edges
        .windows(3)
        .map(|w| {
            let (left, center, right) = (w[0], w[1], w[2]);
            let mut filter = vec![0.0; bins];
            for (bin, weight) in filter.iter_mut().enumerate().take(right + 1).skip(left) {
                if bin < center {
                    *weight = (bin - left) as f64 / (center - left) as f64;
                } else if bin == center {
                    *weight = 1.0;
                } else {
                    *weight = (right - bin) as f64 / (right - center) as f64;
                }
            }
            filter
        })
        .collect()
}

fn dct_basis(coefficients: usize, bands: usize) -> Vec<Vec<f64>> {
    (0..coefficients)
        .map(|k| {
            (0..bands)
                .map(|m| (PI * k as f64 * (2 * m + 1) as f64 / (2 * bands) as f64).cos())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, FeatureStrategy};

    fn plan(sample_rate: u32) -> MfccPlan {
        MfccPlan::new(AnalysisConfig::new(FeatureStrategy::Mfcc).mfcc_for(sample_rate))
            .expect("valid config")
    }

    fn sine(freq: f32, amp: f32, sample_rate: u32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn produces_thirteen_finite_coefficients() {
        let p = plan(16_000);
        let c = p.cepstrum(&sine(440.0, 0.3, 16_000, 1024)).unwrap();
        assert_eq!(c.len(), 13);
        assert!(c.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn silence_has_zero_cepstrum() {
        let c = plan(16_000).cepstrum(&[0.0; 1024]).unwrap();
        assert!(c.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn louder_frame_raises_c0() {
        let p = plan(16_000);
        let quiet = p.cepstrum(&sine(300.0, 0.01, 16_000, 1024)).unwrap();
        let loud = p.cepstrum(&sine(300.0, 0.5, 16_000, 1024)).unwrap();
        assert!(loud[0] > quiet[0]);
        assert!(loud[0] > 0.0);
    }

    #[test]
    fn wrong_frame_length_rejected() {
        let err = plan(16_000).cepstrum(&[0.1; 100]).unwrap_err();
        assert_eq!(err, MfccError::FrameLength { expected: 1024, got: 100 });
    }

    #[test]
    fn invalid_configs_rejected() {
        let mut cfg = AnalysisConfig::new(FeatureStrategy::Mfcc).mfcc_for(0);
        assert!(matches!(MfccPlan::new(cfg), Err(MfccError::InvalidConfig(_))));

        cfg.sample_rate = 16_000;
        cfg.coefficients = 40;
        assert!(matches!(MfccPlan::new(cfg), Err(MfccError::InvalidConfig(_))));
    }

    #[test]
    fn filterbank_weights_bounded() {
        let bank = mel_filterbank(16_000, 1024, 26);
        assert_eq!(bank.len(), 26);
        assert!(bank.iter().all(|f| f.len() == 513));
        assert!(bank.iter().flatten().all(|w| (0.0..=1.0).contains(w)));
        assert!(bank.iter().all(|f| f.iter().any(|w| *w > 0.0)));
    }
}
