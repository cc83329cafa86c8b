use crate::{
    analysis::{AggregateStatistics, FeatureExtractor, FrameSegmenter},
    capture::{AudioCapture, CaptureError, Recording, StopSignal},
    config::{AnalysisConfig, FeatureStrategy, StressPercent},
    decode::{AudioDecoder, DecodeError, Waveform},
    emotion::{StressResult, StressScorer},
    fusion::FusionReport,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const LOG_TARGET: &str = "pipeline";

/// Slack on top of the recording length before a capture is declared hung.
pub const CAPTURE_GRACE: Duration = Duration::from_secs(5);

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("a recording is already in progress")]
    RecordingInProgress,

    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("analysis failed: {0}")]
    Decode(#[from] DecodeError),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpeechAnalysis {
    pub strategy: FeatureStrategy,
    pub sample_rate: u32,
    pub duration_ms: u64,
    pub statistics: AggregateStatistics,
    pub result: StressResult,
    pub speech_score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fusion: Option<FusionReport>,
}

impl SpeechAnalysis {
    /// Recomputes fusion against a new face reading.
    pub fn with_face(mut self, face: Option<StressPercent>) -> Self {
        self.fusion = face.map(|f| FusionReport::face_speech(f.value(), self.speech_score));
        self
    }
}

/// Segment, extract, aggregate and score one waveform. Pure CPU work.
pub fn analyze_waveform(config: &AnalysisConfig, waveform: &Waveform) -> SpeechAnalysis {
    let extractor = FeatureExtractor::for_recording(config, waveform.sample_rate());
    let features = extractor.extract(waveform, FrameSegmenter::new(config.frame_size));
    let statistics = AggregateStatistics::from_features(&features);
    tracing::debug!(target: LOG_TARGET, ?statistics, "aggregated features");

    let result = StressScorer::new().score(&statistics);
    let speech_score = result.speech_score();
    SpeechAnalysis {
        strategy: config.strategy,
        sample_rate: waveform.sample_rate(),
        duration_ms: u64::try_from(waveform.duration().as_millis()).unwrap_or(u64::MAX),
        statistics,
        result,
        speech_score,
        fusion: None,
    }
}

/// One recording at a time: capture, decode, analyze, fuse.
pub struct StressMonitor<C, D> {
    capture: C,
    decoder: D,
    config: AnalysisConfig,
    recording: AtomicBool,
}

struct SessionGuard<'a>(&'a AtomicBool);

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<C, D> StressMonitor<C, D>
where
    C: AudioCapture,
    D: AudioDecoder,
{
    pub fn new(capture: C, decoder: D, config: AnalysisConfig) -> Self {
        Self {
            capture,
            decoder,
            config,
            recording: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    pub async fn record_and_analyze(
        &self,
        face: Option<StressPercent>,
        stop: StopSignal,
    ) -> Result<SpeechAnalysis, PipelineError> {
        if self
            .recording
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PipelineError::RecordingInProgress);
        }
        let _session = SessionGuard(&self.recording);

        let limit = self.config.recording;
        tracing::info!(target: LOG_TARGET, strategy = %self.config.strategy, ?limit, "recording started");

        let recording = tokio::time::timeout(limit + CAPTURE_GRACE, self.capture.record(limit, stop))
            .await
            .map_err(|_| CaptureError::TimedOut(limit + CAPTURE_GRACE))??;

        let waveform = match recording {
            Recording::Pcm(w) => w,
            Recording::Encoded(audio) => {
                self.decoder.decode(audio.with_max_duration(limit)).await?
            }
        }
        .truncated(limit);

        let analysis = analyze_waveform(&self.config, &waveform).with_face(face);
        tracing::info!(
            target: LOG_TARGET,
            emotion = %analysis.result.emotion,
            stress = analysis.result.stress_score,
            confidence = analysis.result.confidence,
            fusion = analysis.fusion.map(|f| f.fusion.value()),
            "recording analyzed"
        );
        Ok(analysis)
    }
}
