#![deny(warnings)]

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use voice_stress_core::capture::{stop_channel, FileCapture, StopSignal, SyntheticCapture};
use voice_stress_core::config::{resolve_strategy, AnalysisConfig, StdEnv, StressPercent};
use voice_stress_core::decode::SymphoniaDecoder;
#[cfg(feature = "ffmpeg-sidecar")]
use voice_stress_core::decode::{FallbackDecoder, FfmpegAudioDecoder};
use voice_stress_core::fusion::{fuse, FusionReport, FusionWeights};
use voice_stress_core::pipeline::{SpeechAnalysis, StressMonitor};
use voice_stress_core::synth::SignalKind;

#[derive(Parser, Debug)]
#[command(name = "voice-stress")]
#[command(about = "Offline voice stress estimation with face/voice fusion")]
struct Args {
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a recorded audio file (WAV, MP3, FLAC, Ogg, WebM/Opus via ffmpeg).
    Analyze {
        input: PathBuf,

        /// rms-zcr or mfcc; falls back to VOICE_STRESS_STRATEGY.
        #[arg(long)]
        strategy: Option<String>,

        #[arg(long)]
        face_score: Option<u32>,

        #[arg(long, requires = "face_score")]
        wearable_score: Option<u32>,
    },

    /// Analyze a generated test signal.
    Synth {
        kind: SignalKind,

        /// Defaults to the strategy's recording length.
        #[arg(long)]
        seconds: Option<f64>,

        #[arg(long, default_value_t = 16_000)]
        sample_rate: u32,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        #[arg(long)]
        strategy: Option<String>,

        #[arg(long)]
        face_score: Option<u32>,

        /// Stream at wall-clock speed; Ctrl-C stops the recording early.
        #[arg(long)]
        realtime: bool,
    },

    /// Blend a face score with a speech or wearable score.
    #[command(group(
        ArgGroup::new("other")
            .required(true)
            .multiple(false)
            .args(["speech", "wearable"])
    ))]
    Fuse {
        #[arg(long)]
        face: u32,

        #[arg(long)]
        speech: Option<u32>,

        #[arg(long)]
        wearable: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    match args.command {
        Command::Analyze {
            input,
            strategy,
            face_score,
            wearable_score,
        } => {
            let config = build_config(strategy, None)?;
            let face = parse_score(face_score, "--face-score")?;
            let wearable = parse_score(wearable_score, "--wearable-score")?;
            tracing::info!(strategy = %config.strategy, input = %input.display(), "config loaded");

            let monitor = StressMonitor::new(FileCapture::new(&input), decoder(), config);
            let analysis = monitor
                .record_and_analyze(face, StopSignal::never())
                .await
                .with_context(|| format!("failed to analyze {}", input.display()))?;
            let wearable = face.zip(wearable).map(|(f, w)| (f.value(), w.value()));
            emit(&analysis_document(&analysis, wearable)?)?;
            summarize_analysis(&analysis);
            if let Some((face, wearable)) = wearable {
                summarize_wearable(face, wearable);
            }
        }
        Command::Synth {
            kind,
            seconds,
            sample_rate,
            seed,
            strategy,
            face_score,
            realtime,
        } => {
            let config = build_config(strategy, seconds)?;
            let face = parse_score(face_score, "--face-score")?;
            tracing::info!(strategy = %config.strategy, %kind, seed, "config loaded");

            let (handle, stop) = stop_channel();
            if realtime {
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::info!("stopping recording");
                        handle.stop();
                    }
                });
            }

            let capture = SyntheticCapture::new(kind, sample_rate, seed).realtime(realtime);
            let monitor = StressMonitor::new(capture, decoder(), config);
            let analysis = monitor
                .record_and_analyze(face, stop)
                .await
                .context("failed to analyze synthetic recording")?;
            emit(&analysis_document(&analysis, None)?)?;
            summarize_analysis(&analysis);
        }
        Command::Fuse {
            face,
            speech,
            wearable,
        } => {
            let face = StressPercent::new(face).context("invalid --face")?;
            match (speech, wearable) {
                (Some(speech), None) => {
                    let speech = StressPercent::new(speech).context("invalid --speech")?;
                    let report = FusionReport::face_speech(face.value(), speech.value());
                    emit(&serde_json::to_value(report)?)?;
                    eprintln!("{} ({})", report.fusion, report.band);
                }
                (None, Some(wearable)) => {
                    let wearable = StressPercent::new(wearable).context("invalid --wearable")?;
                    emit(&wearable_document(face.value(), wearable.value()))?;
                    summarize_wearable(face.value(), wearable.value());
                }
                _ => anyhow::bail!("exactly one of --speech or --wearable must be provided"),
            }
        }
    }

    Ok(())
}

#[cfg(feature = "ffmpeg-sidecar")]
fn decoder() -> FallbackDecoder<SymphoniaDecoder, FfmpegAudioDecoder> {
    FallbackDecoder::new(SymphoniaDecoder::new(), FfmpegAudioDecoder::default())
}

#[cfg(not(feature = "ffmpeg-sidecar"))]
fn decoder() -> SymphoniaDecoder {
    SymphoniaDecoder::new()
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(strategy: Option<String>, seconds: Option<f64>) -> anyhow::Result<AnalysisConfig> {
    let strategy = resolve_strategy(strategy, &StdEnv)?;
    let mut config = AnalysisConfig::new(strategy);
    if let Some(secs) = seconds {
        config.recording = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("invalid --seconds: {secs}"))?;
    }
    Ok(config)
}

fn parse_score(value: Option<u32>, flag: &str) -> anyhow::Result<Option<StressPercent>> {
    value
        .map(StressPercent::new)
        .transpose()
        .with_context(|| format!("invalid {flag}"))
}

/// stdout carries exactly one JSON document per command; readable
/// summaries go to stderr.
fn emit(document: &serde_json::Value) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(document).context("failed to serialize output")?
    );
    Ok(())
}

fn analysis_document(
    analysis: &SpeechAnalysis,
    wearable: Option<(u8, u8)>,
) -> anyhow::Result<serde_json::Value> {
    let mut document = serde_json::to_value(analysis).context("failed to serialize analysis")?;
    if let (Some((face, wearable)), Some(fields)) = (wearable, document.as_object_mut()) {
        fields.insert("wearable_fusion".to_owned(), wearable_document(face, wearable));
    }
    Ok(document)
}

fn wearable_document(face: u8, wearable: u8) -> serde_json::Value {
    let score = fuse(FusionWeights::FACE_WEARABLE, face, wearable);
    serde_json::json!({
        "face": face,
        "wearable": wearable,
        "fusion": score,
        "band": score.band(),
    })
}

fn summarize_analysis(analysis: &SpeechAnalysis) {
    eprintln!(
        "voice: {} ({}% stress, {:.0}% confidence)",
        analysis.result.emotion,
        analysis.speech_score,
        analysis.result.confidence * 100.0
    );
    if let Some(warning) = analysis.result.warning {
        eprintln!("note: {warning}");
    }
    if let Some(report) = analysis.fusion {
        eprintln!("fusion: {} ({})", report.fusion, report.band);
    }
}

fn summarize_wearable(face: u8, wearable: u8) {
    let score = fuse(FusionWeights::FACE_WEARABLE, face, wearable);
    eprintln!("face/wearable: {} ({})", score, score.band());
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_stress_core::decode::Waveform;
    use voice_stress_core::pipeline::analyze_waveform;

    #[test]
    fn fuse_requires_exactly_one_partner() {
        assert!(Args::try_parse_from(["voice-stress", "fuse", "--face", "80"]).is_err());
        assert!(Args::try_parse_from([
            "voice-stress", "fuse", "--face", "80", "--speech", "50", "--wearable", "10"
        ])
        .is_err());
        assert!(Args::try_parse_from(["voice-stress", "fuse", "--face", "80", "--speech", "50"]).is_ok());
    }

    #[test]
    fn wearable_score_needs_face_score() {
        assert!(Args::try_parse_from(["voice-stress", "analyze", "a.wav", "--wearable-score", "40"]).is_err());
        assert!(Args::try_parse_from([
            "voice-stress", "analyze", "a.wav", "--face-score", "20", "--wearable-score", "40"
        ])
        .is_ok());
    }

    #[test]
    fn synth_kind_parsed() {
        let args = Args::try_parse_from(["voice-stress", "--log-level", "debug", "synth", "buzz", "--seed", "3"])
            .expect("valid args");
        match args.command {
            Command::Synth { kind, seed, .. } => {
                assert_eq!(kind, SignalKind::Buzz);
                assert_eq!(seed, 3);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Args::try_parse_from(["voice-stress", "synth", "hum"]).is_err());
    }

    fn silent_analysis(face: Option<u32>) -> SpeechAnalysis {
        let w = Waveform::new(16_000, vec![0.0; 16_000]);
        analyze_waveform(&AnalysisConfig::default(), &w)
            .with_face(face.map(|f| StressPercent::new(f).expect("in range")))
    }

    #[test]
    fn analysis_output_is_one_document() {
        let doc = analysis_document(&silent_analysis(Some(90)), Some((90, 25))).expect("serializes");
        assert_eq!(doc["result"]["emotion"], "silent");
        assert_eq!(doc["fusion"]["fusion"], 58);
        assert_eq!(doc["wearable_fusion"]["fusion"], 51);
        assert_eq!(doc["wearable_fusion"]["band"], "moderate");

        let text = serde_json::to_string_pretty(&doc).expect("serializes");
        assert!(serde_json::from_str::<serde_json::Value>(&text).is_ok());
    }

    #[test]
    fn wearable_fusion_omitted_without_scores() {
        let doc = analysis_document(&silent_analysis(None), None).expect("serializes");
        assert!(doc.get("wearable_fusion").is_none());
        assert!(doc.get("fusion").is_none());
        assert_eq!(doc["speech_score"], 10);
    }

    #[test]
    fn seconds_override_recording_length() {
        let cfg = build_config(Some("mfcc".into()), Some(2.5)).expect("valid");
        assert_eq!(cfg.recording, Duration::from_millis(2_500));
        assert!(build_config(Some("mfcc".into()), Some(-1.0)).is_err());
    }
}
