use std::time::Duration;
use voice_stress_core::analysis::{
    AggregateStatistics, CepstralTransform, FeatureExtractor, FrameSegmenter, MfccError,
};
use voice_stress_core::capture::{FileCapture, StopSignal};
use voice_stress_core::config::{AnalysisConfig, StressPercent, FeatureStrategy, SILENCE_THRESHOLD};
use voice_stress_core::decode::{SymphoniaDecoder, Waveform};
use voice_stress_core::emotion::{Emotion, StressScorer, StressWarning};
use voice_stress_core::fusion::{fuse, FusionReport, FusionWeights, StressBand};
use voice_stress_core::pipeline::{analyze_waveform, StressMonitor};
use voice_stress_core::synth::{synthesize, SignalKind};

const RATE: u32 = 16_000;

struct TruncatedTransform;

impl CepstralTransform for TruncatedTransform {
    fn cepstrum(&self, _frame: &[f32]) -> Result<Vec<f64>, MfccError> {
        Ok(vec![1.0; 5])
    }
}

fn wav_bytes(waveform: &Waveform) -> Vec<u8> {
    let data_len = (waveform.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&waveform.sample_rate().to_le_bytes());
    out.extend_from_slice(&(waveform.sample_rate() * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in waveform.samples() {
        out.extend_from_slice(&((s * i16::MAX as f32) as i16).to_le_bytes());
    }
    out
}

#[test]
fn ten_seconds_of_silence_is_silent() {
    let w = Waveform::new(RATE, vec![0.0; 10 * RATE as usize]);
    for strategy in [FeatureStrategy::RmsZcr, FeatureStrategy::Mfcc] {
        let a = analyze_waveform(&AnalysisConfig::new(strategy), &w);
        assert_eq!(a.statistics.voiced_ratio(), 0.0);
        assert_eq!(a.result.emotion, Emotion::Silent);
        assert_eq!(a.result.stress_score, 0.10);
        assert_eq!(a.result.warning, Some(StressWarning::InsufficientSpeech));
    }
}

#[test]
fn loud_buzz_is_stressed() {
    let w = synthesize(SignalKind::Buzz, Duration::from_secs(10), RATE, 11);
    let a = analyze_waveform(&AnalysisConfig::default(), &w);
    let AggregateStatistics::RmsZcr {
        avg_rms, avg_zcr, ..
    } = a.statistics
    else {
        panic!("expected rms/zcr statistics");
    };
    assert!(avg_rms >= 0.18, "avg_rms {avg_rms}");
    assert!(avg_zcr >= 0.12, "avg_zcr {avg_zcr}");
    assert_eq!(a.result.emotion, Emotion::Stressed);
    assert!(a.result.stress_score >= 0.78 && a.result.stress_score <= 0.97);
}

#[test]
fn moderate_fusion_band() {
    let r = FusionReport::face_speech(30, 90);
    assert_eq!(r.fusion.value(), 54);
    assert_eq!(r.band, StressBand::Moderate);
    assert_eq!(r.band.label(), "Moderate Stress");
    assert_eq!(fuse(FusionWeights::FACE_SPEECH, 80, 50).value(), 68);
}

#[test]
fn trailing_partial_frame_dropped() {
    let samples = vec![0.1f32; 1024 * 5 + 500];
    let segmenter = FrameSegmenter::new(1024);
    assert_eq!(segmenter.segment(&samples).count(), 5);

    let w = Waveform::new(RATE, samples);
    let a = analyze_waveform(&AnalysisConfig::default(), &w);
    assert_eq!(a.statistics.frames(), 5);
}

#[test]
fn frame_partition_holds_for_any_length() {
    let segmenter = FrameSegmenter::new(1024);
    for n in [0usize, 1, 1023, 1024, 1025, 4096, 10_000] {
        let samples = vec![0.0f32; n];
        let count = segmenter.segment(&samples).count();
        assert_eq!(count, n / 1024);
        assert!(1024 * count <= n);
    }
}

#[test]
fn malformed_cepstra_degrade_to_voiced_ratio() {
    let w = synthesize(SignalKind::Buzz, Duration::from_secs(8), RATE, 5);
    let extractor = FeatureExtractor::with_transform(SILENCE_THRESHOLD, Box::new(TruncatedTransform));
    let features = extractor.extract(&w, FrameSegmenter::new(1024));
    assert!(matches!(
        features.spectral_failure,
        Some(MfccError::CoefficientCount { expected: 13, got: 5 })
    ));

    let stats = AggregateStatistics::from_features(&features);
    let r = StressScorer::new().score(&stats);
    assert!((0.1..=0.3).contains(&r.stress_score));
    assert_eq!(r.warning, Some(StressWarning::SpectralFeaturesUnavailable));
}

#[test]
fn all_unvoiced_mfcc_has_no_cepstral_summary() {
    let w = synthesize(SignalKind::Silence, Duration::from_secs(8), RATE, 2);
    let a = analyze_waveform(&AnalysisConfig::new(FeatureStrategy::Mfcc), &w);
    assert!(matches!(
        a.statistics,
        AggregateStatistics::Mfcc { cepstral: None, .. }
    ));
    assert_eq!(a.result.emotion, Emotion::Silent);
    assert_eq!(a.result.stress_score, 0.10);
}

#[test]
fn speech_like_signal_scores_in_range_for_both_strategies() {
    let w = synthesize(SignalKind::Speech, Duration::from_secs(8), RATE, 21);
    for strategy in [FeatureStrategy::RmsZcr, FeatureStrategy::Mfcc] {
        let a = analyze_waveform(&AnalysisConfig::new(strategy), &w);
        assert!((0.0..=0.97).contains(&a.result.stress_score));
        assert!((0.0..=1.0).contains(&a.result.confidence));
        assert!(a.statistics.voiced_ratio() > 0.15);
        assert!(a.result.warning.is_none(), "{strategy}: {:?}", a.result.warning);
    }
    let a = analyze_waveform(&AnalysisConfig::new(FeatureStrategy::Mfcc), &w);
    assert!(matches!(
        a.statistics,
        AggregateStatistics::Mfcc { cepstral: Some(_), .. }
    ));
}

#[test]
fn identical_statistics_give_identical_results() {
    let w = synthesize(SignalKind::Speech, Duration::from_secs(4), RATE, 8);
    let config = AnalysisConfig::new(FeatureStrategy::Mfcc);
    assert_eq!(analyze_waveform(&config, &w), analyze_waveform(&config, &w));
}

#[tokio::test]
async fn wav_file_end_to_end() {
    let buzz = synthesize(SignalKind::Buzz, Duration::from_secs(2), RATE, 4);
    let path = std::env::temp_dir().join(format!("voice-stress-e2e-{}.wav", std::process::id()));
    tokio::fs::write(&path, wav_bytes(&buzz)).await.unwrap();

    let monitor = StressMonitor::new(
        FileCapture::new(&path),
        SymphoniaDecoder::new(),
        AnalysisConfig::default(),
    );
    let result = monitor
        .record_and_analyze(Some(StressPercent::new(50).unwrap()), StopSignal::never())
        .await;
    let _ = tokio::fs::remove_file(&path).await;

    let a = result.unwrap();
    assert_eq!(a.sample_rate, RATE);
    assert_eq!(a.statistics.frames(), 2 * RATE as usize / 1024);
    assert_eq!(a.result.emotion, Emotion::Stressed);
    let fusion = a.fusion.expect("face supplied");
    assert_eq!(
        fusion.fusion,
        fuse(FusionWeights::FACE_SPEECH, 50, a.speech_score)
    );
}
