//! Human-readable notes for clinicians, derived deterministically from the
//! indicators, features and scores of a single detection.

use crate::emotion::{EmotionScore, IntensityLevel};
use crate::features::AcousticFeatureSet;
use crate::medical::MedicalIndicators;

const HIGH_DISTRESS: f64 = 0.7;
const POSSIBLE_PAIN: f64 = 0.6;
const ELEVATED_ANXIETY: f64 = 0.7;
const TREMOR_JITTER: f64 = 0.05;
const RAPID_SPEECH_RATE: f64 = 5.0;
const LOW_QUALITY_HNR_DB: f64 = 10.0;
const MIXED_STATE_CONFIDENCE: f64 = 0.3;

pub fn annotate(
    indicators: &MedicalIndicators,
    features: &AcousticFeatureSet,
    scores: &[EmotionScore],
    confidence_threshold: f64,
) -> Vec<String> {
    let mut notes = Vec::new();

    if indicators.distress > HIGH_DISTRESS {
        notes.push(format!(
            "High distress level detected ({:.2})",
            indicators.distress
        ));
    }

    if indicators.pain > POSSIBLE_PAIN {
        notes.push(format!(
            "Possible pain or discomfort indicated ({:.2})",
            indicators.pain
        ));
        if features.jitter > TREMOR_JITTER {
            notes.push("Voice tremor detected, may indicate physical discomfort".to_string());
        }
    }

    if indicators.anxiety > ELEVATED_ANXIETY {
        notes.push(format!(
            "Elevated anxiety level detected ({:.2})",
            indicators.anxiety
        ));
        if features.speaking_rate > RAPID_SPEECH_RATE {
            notes.push("Rapid speech pattern consistent with anxiety".to_string());
        }
    }

    if features.hnr < LOW_QUALITY_HNR_DB {
        notes.push(format!(
            "Low voice quality (HNR {:.1} dB) may affect assessment accuracy",
            features.hnr
        ));
    }

    let prominent = scores
        .iter()
        .filter(|s| s.confidence > MIXED_STATE_CONFIDENCE)
        .count();
    if prominent > 2 {
        notes.push("Multiple emotional states detected".to_string());
    }

    for score in scores {
        if score.confidence > confidence_threshold && score.intensity >= IntensityLevel::High {
            notes.push(format!(
                "Strong {} detected ({} intensity)",
                score.category, score.intensity
            ));
        }
    }

    notes
}
