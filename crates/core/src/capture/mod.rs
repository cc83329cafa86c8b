use crate::decode::{samples_for_duration, EncodedAudio, Waveform};
use crate::synth::{synthesize, SignalKind};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;

const LOG_TARGET: &str = "capture";
const CHUNK: Duration = Duration::from_millis(100);

/// What a capture device hands back: either a container still to be decoded
/// or PCM that is ready for analysis.
#[derive(Clone, Debug, PartialEq)]
pub enum Recording {
    Encoded(EncodedAudio),
    Pcm(Waveform),
}

#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("microphone access denied")]
    PermissionDenied,

    #[error("audio input unavailable: {0}")]
    Unavailable(String),

    #[error("recording did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lets the user end a recording before its time limit.
#[derive(Debug)]
pub struct StopHandle(watch::Sender<bool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Clone, Debug)]
pub struct StopSignal(watch::Receiver<bool>);

impl StopSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once [`StopHandle::stop`] is called; pends forever if the
    /// handle is dropped without stopping.
    pub async fn stopped(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }
}

pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(tx), StopSignal(rx))
}

pub trait AudioCapture: Send + Sync {
    fn record(
        &self,
        max_duration: Duration,
        stop: StopSignal,
    ) -> BoxFuture<'_, Result<Recording, CaptureError>>;
}

/// Treats a recording file on disk as the microphone.
#[derive(Clone, Debug)]
pub struct FileCapture {
    path: PathBuf,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AudioCapture for FileCapture {
    fn record(
        &self,
        _max_duration: Duration,
        _stop: StopSignal,
    ) -> BoxFuture<'_, Result<Recording, CaptureError>> {
        async move {
            let bytes = tokio::fs::read(&self.path).await.map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    CaptureError::Unavailable(format!("{} not found", self.path.display()))
                }
                std::io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
                _ => CaptureError::Io(e),
            })?;
            let hint = self
                .path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_owned);
            tracing::debug!(target: LOG_TARGET, path = %self.path.display(), bytes = bytes.len(), "read recording");
            Ok(Recording::Encoded(EncodedAudio::new(bytes, hint)))
        }
        .boxed()
    }
}

/// Streams a synthetic signal in 100 ms chunks, honouring the stop signal.
#[derive(Clone, Debug)]
pub struct SyntheticCapture {
    kind: SignalKind,
    sample_rate: u32,
    seed: u64,
    realtime: bool,
}

impl SyntheticCapture {
    pub fn new(kind: SignalKind, sample_rate: u32, seed: u64) -> Self {
        Self {
            kind,
            sample_rate,
            seed,
            realtime: false,
        }
    }

    /// Paces chunks at wall-clock speed, like a live microphone.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }
}

impl AudioCapture for SyntheticCapture {
    fn record(
        &self,
        max_duration: Duration,
        mut stop: StopSignal,
    ) -> BoxFuture<'_, Result<Recording, CaptureError>> {
        async move {
            let source = synthesize(self.kind, max_duration, self.sample_rate, self.seed);
            let chunk = samples_for_duration(self.sample_rate, CHUNK).max(1);
            let mut captured = Vec::with_capacity(source.len());

            for block in source.samples().chunks(chunk) {
                if stop.is_stopped() {
                    break;
                }
                if self.realtime {
                    tokio::select! {
                        _ = tokio::time::sleep(CHUNK) => {}
                        _ = stop.stopped() => break,
                    }
                }
                captured.extend_from_slice(block);
            }

            if captured.len() < source.len() {
                tracing::info!(
                    target: LOG_TARGET,
                    captured = captured.len(),
                    requested = source.len(),
                    "recording stopped early"
                );
            }
            Ok(Recording::Pcm(Waveform::new(self.sample_rate, captured)))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn synthetic_capture_fills_requested_duration() {
        let cap = SyntheticCapture::new(SignalKind::Speech, 16_000, 1);
        let rec = cap
            .record(Duration::from_secs(2), StopSignal::never())
            .await
            .unwrap();
        let Recording::Pcm(w) = rec else {
            panic!("expected pcm");
        };
        assert_eq!(w.len(), 32_000);
    }

    #[tokio::test]
    async fn stopped_before_start_captures_nothing() {
        let (handle, signal) = stop_channel();
        handle.stop();
        let cap = SyntheticCapture::new(SignalKind::Buzz, 16_000, 1);
        let Recording::Pcm(w) = cap.record(Duration::from_secs(10), signal).await.unwrap() else {
            panic!("expected pcm");
        };
        assert!(w.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn realtime_capture_stops_early() {
        let (handle, signal) = stop_channel();
        let cap = SyntheticCapture::new(SignalKind::Buzz, 16_000, 1).realtime(true);
        let stopper = async {
            tokio::time::sleep(Duration::from_millis(350)).await;
            handle.stop();
        };
        let (rec, ()) = tokio::join!(cap.record(Duration::from_secs(10), signal), stopper);
        let Recording::Pcm(w) = rec.unwrap() else {
            panic!("expected pcm");
        };
        assert!(!w.is_empty());
        assert!(w.len() < 16_000);
        assert_eq!(w.len() % 1_600, 0);
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let cap = FileCapture::new("/definitely/not/here.webm");
        let err = cap
            .record(Duration::from_secs(1), StopSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Unavailable(_)));
    }

    #[tokio::test]
    async fn file_capture_passes_extension_hint() {
        let path = std::env::temp_dir().join(format!("voice-stress-capture-{}.wav", std::process::id()));
        tokio::fs::write(&path, b"RIFF").await.unwrap();
        let rec = FileCapture::new(&path)
            .record(Duration::from_secs(1), StopSignal::never())
            .await
            .unwrap();
        let _ = tokio::fs::remove_file(&path).await;
        let Recording::Encoded(audio) = rec else {
            panic!("expected encoded audio");
        };
        assert_eq!(audio.hint.as_deref(), Some("wav"));
        assert_eq!(&audio.bytes[..], b"RIFF");
    }
}
