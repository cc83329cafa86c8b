//! Deterministic synthetic recordings for demos and tests.
//!
//! All randomness in the crate lives here; scoring itself is jitter-free.

use crate::decode::{samples_for_duration, Waveform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};

const BUZZ_AMPLITUDE: f32 = 0.2;
const BUZZ_HALF_PERIOD: usize = 8;
const NOISE_FLOOR: f32 = 0.0005;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Near-zero background noise.
    Silence,
    /// Loud square wave with a high zero-crossing rate.
    Buzz,
    /// Harmonic syllables separated by short pauses.
    Speech,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignalKind::Silence => "silence",
            SignalKind::Buzz => "buzz",
            SignalKind::Speech => "speech",
        })
    }
}

impl FromStr for SignalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silence" => Ok(SignalKind::Silence),
            "buzz" => Ok(SignalKind::Buzz),
            "speech" => Ok(SignalKind::Speech),
            other => Err(format!("unknown signal kind {other:?}")),
        }
    }
}

pub fn synthesize(kind: SignalKind, duration: Duration, sample_rate: u32, seed: u64) -> Waveform {
    let n = samples_for_duration(sample_rate, duration);
    let mut rng = StdRng::seed_from_u64(seed);
    let samples = match kind {
        SignalKind::Silence => (0..n).map(|_| noise(&mut rng)).collect(),
        SignalKind::Buzz => (0..n)
            .map(|i| {
                let sign = if (i / BUZZ_HALF_PERIOD) % 2 == 0 { 1.0 } else { -1.0 };
                sign * (BUZZ_AMPLITUDE + rng.random_range(-0.01f32..0.01))
            })
            .collect(),
        SignalKind::Speech => speech_like(n, sample_rate, &mut rng),
    };
    Waveform::new(sample_rate, samples)
}

fn noise(rng: &mut StdRng) -> f32 {
    rng.random_range(-NOISE_FLOOR..NOISE_FLOOR)
}

fn speech_like(n: usize, sample_rate: u32, rng: &mut StdRng) -> Vec<f32> {
    let sr = sample_rate.max(1) as f32;
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let syllable = ((rng.random_range(0.18f32..0.32) * sr) as usize).max(1);
        let pause = ((rng.random_range(0.08f32..0.2) * sr) as usize).max(1);
        let f0 = rng.random_range(110.0f32..220.0);
        let amp = rng.random_range(0.05f32..0.12);

        for i in 0..syllable.min(n - out.len()) {
            let t = i as f32 / sr;
            // raised-cosine envelope so syllables fade in and out
            let env = 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / syllable as f32).cos();
            let tone: f32 = (1..=4)
                .map(|h| (2.0 * std::f32::consts::PI * f0 * h as f32 * t).sin() / h as f32)
                .sum();
            out.push(amp * env * tone * 0.6 + noise(rng));
        }
        for _ in 0..pause.min(n - out.len()) {
            out.push(noise(rng));
        }
    }
    out
}
