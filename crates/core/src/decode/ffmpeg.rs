use crate::decode::{
    samples_for_duration, AudioDecoder, DecodeError, EncodedAudio, Result, Waveform, LOG_TARGET,
};
use bytes::Bytes;
use ffmpeg_sidecar::{download, paths::ffmpeg_path};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;

pub const DEFAULT_FFMPEG_SAMPLE_RATE: u32 = 16_000;

/// Decodes anything ffmpeg understands (browser WebM/Opus recordings in
/// particular) to mono f32 PCM.
#[derive(Clone, Debug)]
pub struct FfmpegAudioDecoder {
    sample_rate: u32,
}

impl Default for FfmpegAudioDecoder {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_FFMPEG_SAMPLE_RATE,
        }
    }
}

impl FfmpegAudioDecoder {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    fn ensure_ffmpeg_available(&self) -> Result<()> {
        download::auto_download().map_err(|e| DecodeError::FfmpegUnavailable(e.to_string()))
    }

    fn parse_f32le_mono(raw: &[u8]) -> Result<Vec<f32>> {
        if !raw.len().is_multiple_of(4usize) {
            return Err(DecodeError::InvalidPcm(format!(
                "f32le byte length must be multiple of 4, got {}",
                raw.len()
            )));
        }
        Ok(raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn ffmpeg_args(&self, max_duration: Option<Duration>) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-nostdin",
            "-loglevel",
            "error",
            "-i",
            "pipe:0",
            "-vn",
            "-ac",
            "1",
            "-ar",
        ]
        .into_iter()
        .map(str::to_owned)
        .collect();
        args.push(self.sample_rate.to_string());
        if let Some(max) = max_duration {
            args.push("-t".to_owned());
            args.push(format!("{:.3}", max.as_secs_f64()));
        }
        args.extend(["-f", "f32le", "-acodec", "pcm_f32le", "pipe:1"].map(str::to_owned));
        args
    }

    async fn decode_with_ffmpeg(
        &self,
        recording: Bytes,
        max_duration: Option<Duration>,
    ) -> Result<Vec<f32>> {
        let mut child = tokio::process::Command::new(ffmpeg_path())
            .args(self.ffmpeg_args(max_duration))
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            DecodeError::FfmpegFailed("ffmpeg stdin unavailable (pipe not created)".to_owned())
        })?;
        let mut stdout = child.stdout.take().ok_or_else(|| {
            DecodeError::FfmpegFailed("ffmpeg stdout unavailable (pipe not created)".to_owned())
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            DecodeError::FfmpegFailed("ffmpeg stderr unavailable (pipe not created)".to_owned())
        })?;

        let stdin_task = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            stdin.write_all(&recording).await?;
            stdin.shutdown().await?;
            Ok::<(), std::io::Error>(())
        });

        let stdout_task = tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await?;
            Ok::<Vec<u8>, std::io::Error>(buf)
        });

        let stderr_task = tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await?;
            Ok::<Vec<u8>, std::io::Error>(buf)
        });

        let status = child
            .wait()
            .await
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?;

        // A broken pipe here just means ffmpeg bailed early; stderr says why.
        if let Err(e) = stdin_task
            .await
            .map_err(|e| DecodeError::Join(e.to_string()))?
        {
            tracing::debug!(target: LOG_TARGET, error = %e, "ffmpeg stdin closed early");
        }

        let stdout_bytes = stdout_task
            .await
            .map_err(|e| DecodeError::Join(e.to_string()))?
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?;

        let stderr_bytes = stderr_task
            .await
            .map_err(|e| DecodeError::Join(e.to_string()))?
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?;

        if !status.success() {
            let stderr_s = String::from_utf8_lossy(&stderr_bytes).trim().to_owned();
            return Err(DecodeError::Malformed(format!(
                "ffmpeg exit_code={:?} stderr={stderr_s}",
                status.code()
            )));
        }

        Self::parse_f32le_mono(&stdout_bytes)
    }
}

impl AudioDecoder for FfmpegAudioDecoder {
    fn decode(&self, audio: EncodedAudio) -> BoxFuture<'_, Result<Waveform>> {
        async move {
            self.ensure_ffmpeg_available()?;
            let mut samples = self.decode_with_ffmpeg(audio.bytes, audio.max_duration).await?;
            if let Some(max) = audio.max_duration {
                samples.truncate(samples_for_duration(self.sample_rate, max));
            }
            if samples.is_empty() {
                return Err(DecodeError::EmptyStream);
            }
            Ok(Waveform::new(self.sample_rate, samples))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_f32le_rejects_non_multiple_of_4() {
        let err = FfmpegAudioDecoder::parse_f32le_mono(&[0, 1, 2]).unwrap_err();
        assert!(err.to_string().contains("multiple of 4"));
    }

    #[test]
    fn parse_f32le_reads_little_endian_floats() {
        let mut raw = Vec::new();
        for f in [0.0f32, -0.5, 1.0] {
            raw.extend_from_slice(&f.to_le_bytes());
        }
        let out = FfmpegAudioDecoder::parse_f32le_mono(&raw).unwrap();
        assert_eq!(out, vec![0.0, -0.5, 1.0]);
    }

    #[test]
    fn duration_limit_passed_to_ffmpeg() {
        let decoder = FfmpegAudioDecoder::new(16_000);
        let args = decoder.ffmpeg_args(Some(Duration::from_millis(8_500)));
        let t = args.iter().position(|a| a == "-t").expect("limit flag");
        assert_eq!(args[t + 1], "8.500");
        assert!(t > args.iter().position(|a| a == "-i").expect("input flag"));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));

        let unlimited = decoder.ffmpeg_args(None);
        assert!(!unlimited.iter().any(|a| a == "-t"));
        assert!(unlimited.iter().any(|a| a == "16000"));
    }
}
