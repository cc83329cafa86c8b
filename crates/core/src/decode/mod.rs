#[cfg(feature = "ffmpeg-sidecar")]
mod ffmpeg;
mod container;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(feature = "ffmpeg-sidecar")]
pub use ffmpeg::FfmpegAudioDecoder;
pub use container::SymphoniaDecoder;

const LOG_TARGET: &str = "decode";

/// Mono PCM samples in `[-1.0, 1.0]` at a fixed sample rate.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Waveform {
    sample_rate: u32,
    samples: Vec<f32>,
}

impl Waveform {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        duration_from_samples(self.sample_rate, self.samples.len())
    }

    /// Drops everything past `max`, the way a recorder stops at its time limit.
    pub fn truncated(mut self, max: Duration) -> Self {
        let limit = samples_for_duration(self.sample_rate, max);
        if self.samples.len() > limit {
            self.samples.truncate(limit);
        }
        self
    }
}

/// A compressed recording as handed over by the capture side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedAudio {
    pub bytes: Bytes,
    /// File extension (`"wav"`) or mime type (`"audio/webm"`).
    pub hint: Option<String>,
    /// Decoders stop once this much audio has been produced.
    pub max_duration: Option<Duration>,
}

impl EncodedAudio {
    pub fn new(bytes: impl Into<Bytes>, hint: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            hint,
            max_duration: None,
        }
    }

    pub fn with_max_duration(mut self, max: Duration) -> Self {
        self.max_duration = Some(max);
        self
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("unsupported audio format: {0}")]
    Unsupported(String),

    #[error("malformed audio stream: {0}")]
    Malformed(String),

    #[error("recording contains no audio")]
    EmptyStream,

    #[error("ffmpeg unavailable: {0}")]
    FfmpegUnavailable(String),

    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("invalid pcm output: {0}")]
    InvalidPcm(String),

    #[error("decoder task failed: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

pub trait AudioDecoder: Send + Sync {
    fn decode(&self, audio: EncodedAudio) -> BoxFuture<'_, Result<Waveform>>;
}

/// Tries `primary` and hands the recording to `secondary` only when the
/// primary does not understand the container or codec.
#[derive(Clone)]
pub struct FallbackDecoder<P, S>
where
    P: AudioDecoder + Clone,
    S: AudioDecoder + Clone,
{
    primary: P,
    secondary: S,
}

impl<P, S> FallbackDecoder<P, S>
where
    P: AudioDecoder + Clone,
    S: AudioDecoder + Clone,
{
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

impl<P, S> AudioDecoder for FallbackDecoder<P, S>
where
    P: AudioDecoder + Clone + 'static,
    S: AudioDecoder + Clone + 'static,
{
    fn decode(&self, audio: EncodedAudio) -> BoxFuture<'_, Result<Waveform>> {
        async move {
            match self.primary.decode(audio.clone()).await {
                Err(DecodeError::Unsupported(reason)) => {
                    tracing::warn!(target: LOG_TARGET, %reason, "primary decoder cannot handle recording, trying fallback");
                    self.secondary.decode(audio).await
                }
                other => other,
            }
        }
        .boxed()
    }
}

pub fn duration_from_samples(sample_rate_hz: u32, samples: usize) -> Duration {
    if sample_rate_hz == 0 {
        return Duration::from_secs(0);
    }
    let micros = (u128::from(samples as u64) * 1_000_000u128) / u128::from(sample_rate_hz);
    Duration::from_micros(micros.min(u128::from(u64::MAX)) as u64)
}

pub fn samples_for_duration(sample_rate_hz: u32, duration: Duration) -> usize {
    let n = duration.as_micros() * u128::from(sample_rate_hz) / 1_000_000u128;
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// Averages interleaved frames down to a single channel.
pub(crate) fn downmix_interleaved(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}
