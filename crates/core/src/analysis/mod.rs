mod aggregate;
mod features;
mod frames;
mod mfcc;

pub use aggregate::{summarize_cepstra, AggregateStatistics, CepstralSummary};
pub use features::{
    rms, zero_crossing_rate, Cepstrum, FeatureExtractor, FeatureSet, FrameFeatures,
};
pub use frames::FrameSegmenter;
pub use mfcc::{CepstralTransform, MfccError, MfccPlan};
