use crate::decode::{
    downmix_interleaved, samples_for_duration, AudioDecoder, DecodeError, EncodedAudio, Result,
    Waveform, LOG_TARGET,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Pure-Rust container decoder (WAV, FLAC, MP3, Ogg/Vorbis, ...).
#[derive(Clone, Debug, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_blocking(audio: EncodedAudio) -> Result<Waveform> {
        let cursor = std::io::Cursor::new(audio.bytes.to_vec());
        let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        if let Some(h) = audio.hint.as_deref() {
            if h.contains('/') {
                hint.mime_type(h);
            } else {
                hint.with_extension(h.trim_start_matches('.'));
            }
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(classify)?;

        let mut format = probed.format;
        let track = format
            .default_track()
            .ok_or(DecodeError::EmptyStream)?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(classify)?;

        let mut samples = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(classify(e)),
            };
            if packet.track_id() != track_id {
                continue;
            }
            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::warn!(target: LOG_TARGET, error = e, "skipping corrupt packet");
                    continue;
                }
                Err(e) => return Err(classify(e)),
            };
            let signal = *decoded.spec();
            if sample_rate == 0 {
                sample_rate = signal.rate;
            }
            let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, signal);
            buf.copy_interleaved_ref(decoded);
            downmix_interleaved(buf.samples(), signal.channels.count(), &mut samples);

            if let Some(max) = audio.max_duration {
                let limit = samples_for_duration(sample_rate, max);
                if samples.len() >= limit {
                    samples.truncate(limit);
                    tracing::debug!(target: LOG_TARGET, ?max, "duration limit reached, stopped decoding");
                    break;
                }
            }
        }

        if samples.is_empty() || sample_rate == 0 {
            return Err(DecodeError::EmptyStream);
        }

        tracing::debug!(
            target: LOG_TARGET,
            sample_rate,
            samples = samples.len(),
            "decoded recording"
        );
        Ok(Waveform::new(sample_rate, samples))
    }
}

fn classify(err: SymphoniaError) -> DecodeError {
    match err {
        SymphoniaError::Unsupported(what) => DecodeError::Unsupported(what.to_owned()),
        other => DecodeError::Malformed(other.to_string()),
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, audio: EncodedAudio) -> BoxFuture<'_, Result<Waveform>> {
        async move {
            tokio::task::spawn_blocking(move || Self::decode_blocking(audio))
                .await
                .map_err(|e| DecodeError::Join(e.to_string()))?
        }
        .boxed()
    }
}
