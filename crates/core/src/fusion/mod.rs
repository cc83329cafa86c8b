use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Fixed linear blend of two 0–100 stress estimates.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct FusionWeights {
    pub primary: f64,
    pub secondary: f64,
}

impl FusionWeights {
    /// 60% face, 40% speech.
    pub const FACE_SPEECH: Self = Self {
        primary: 0.6,
        secondary: 0.4,
    };

    /// 40% face, 60% wearable sensors.
    pub const FACE_WEARABLE: Self = Self {
        primary: 0.4,
        secondary: 0.6,
    };
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct FusionScore(u8);

impl FusionScore {
    pub fn value(self) -> u8 {
        self.0
    }

    pub fn band(self) -> StressBand {
        StressBand::from_score(self.0)
    }
}

impl fmt::Display for FusionScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Inputs above 100 are treated as 100.
pub fn fuse(weights: FusionWeights, primary: u8, secondary: u8) -> FusionScore {
    let a = f64::from(primary.min(100));
    let b = f64::from(secondary.min(100));
    let blended = (weights.primary * a + weights.secondary * b).round();
    FusionScore(blended.clamp(0.0, 100.0) as u8)
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StressBand {
    Low,
    Moderate,
    High,
}

impl StressBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=29 => StressBand::Low,
            30..=59 => StressBand::Moderate,
            _ => StressBand::High,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StressBand::Low => "Low Stress",
            StressBand::Moderate => "Moderate Stress",
            StressBand::High => "High Stress",
        }
    }
}

impl fmt::Display for StressBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct FusionReport {
    pub face: u8,
    pub speech: u8,
    pub fusion: FusionScore,
    pub band: StressBand,
}

impl FusionReport {
    pub fn face_speech(face: u8, speech: u8) -> Self {
        let fusion = fuse(FusionWeights::FACE_SPEECH, face, speech);
        Self {
            face,
            speech,
            fusion,
            band: fusion.band(),
        }
    }
}

/// Expression labels reported by the facial-emotion collaborator.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FacialEmotion {
    Happy,
    Calm,
    Neutral,
    Focused,
    Surprised,
    Sad,
    Anxious,
    Angry,
    Fearful,
    Disgusted,
}

impl FacialEmotion {
    /// Stress contribution of an expression on the 0–100 scale.
    pub fn stress_score(self) -> u8 {
        match self {
            FacialEmotion::Happy => 10,
            FacialEmotion::Calm => 5,
            FacialEmotion::Neutral => 25,
            FacialEmotion::Focused => 20,
            FacialEmotion::Surprised => 45,
            FacialEmotion::Sad => 70,
            FacialEmotion::Anxious => 85,
            FacialEmotion::Angry => 90,
            FacialEmotion::Fearful | FacialEmotion::Disgusted => UNKNOWN_FACE_STRESS,
        }
    }
}

impl FromStr for FacialEmotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "happy" => FacialEmotion::Happy,
            "calm" => FacialEmotion::Calm,
            "neutral" => FacialEmotion::Neutral,
            "focused" => FacialEmotion::Focused,
            "surprised" => FacialEmotion::Surprised,
            "sad" => FacialEmotion::Sad,
            "anxious" => FacialEmotion::Anxious,
            "angry" => FacialEmotion::Angry,
            "fearful" => FacialEmotion::Fearful,
            "disgusted" => FacialEmotion::Disgusted,
            other => return Err(format!("unknown facial expression {other:?}")),
        })
    }
}

const UNKNOWN_FACE_STRESS: u8 = 30;

/// Face stress for a raw expression label; unrecognised labels score 30.
pub fn facial_stress_score(label: &str) -> u8 {
    label
        .parse::<FacialEmotion>()
        .map(FacialEmotion::stress_score)
        .unwrap_or(UNKNOWN_FACE_STRESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_speech_weights() {
        assert_eq!(fuse(FusionWeights::FACE_SPEECH, 80, 50).value(), 68);
        assert_eq!(fuse(FusionWeights::FACE_SPEECH, 30, 90).value(), 54);
        assert_eq!(fuse(FusionWeights::FACE_SPEECH, 0, 0).value(), 0);
        assert_eq!(fuse(FusionWeights::FACE_SPEECH, 100, 100).value(), 100);
    }

    #[test]
    fn face_wearable_weights() {
        assert_eq!(fuse(FusionWeights::FACE_WEARABLE, 90, 25).value(), 51);
        assert_eq!(fuse(FusionWeights::FACE_WEARABLE, 25, 75).value(), 55);
    }

    #[test]
    fn out_of_range_inputs_saturate() {
        assert_eq!(fuse(FusionWeights::FACE_SPEECH, 255, 255).value(), 100);
    }

    #[test]
    fn bands_split_at_thirty_and_sixty() {
        assert_eq!(StressBand::from_score(29), StressBand::Low);
        assert_eq!(StressBand::from_score(30), StressBand::Moderate);
        assert_eq!(StressBand::from_score(54), StressBand::Moderate);
        assert_eq!(StressBand::from_score(59), StressBand::Moderate);
        assert_eq!(StressBand::from_score(60), StressBand::High);
    }

    #[test]
    fn report_labels_moderate_case() {
        let r = FusionReport::face_speech(30, 90);
        assert_eq!(r.fusion.value(), 54);
        assert_eq!(r.band.label(), "Moderate Stress");
    }

    #[test]
    fn facial_labels_map_to_scores() {
        assert_eq!(facial_stress_score("happy"), 10);
        assert_eq!(facial_stress_score("Angry"), 90);
        assert_eq!(facial_stress_score("fearful"), 30);
        assert_eq!(facial_stress_score("bored"), 30);
    }
}
