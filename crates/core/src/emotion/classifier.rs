//! Rule-table emotion classification.
//!
//! Each [`EmotionRule`] pairs a predicate over the feature set with a score
//! function. Rules are evaluated in table order; every rule that fires lowers
//! the neutral baseline by its penalty. Neutral is reported only while the
//! baseline stays above [`NEUTRAL_FLOOR`]. Fired scores are normalized to sum
//! to 1, while intensities are derived from the raw scores.

use super::{EmotionCategory, EmotionScore, IntensityLevel};
use crate::config::{EngineConfig, IntensityThresholds};
use crate::features::AcousticFeatureSet;

const LOG_TARGET: &str = "emotion::classifier";

pub const NEUTRAL_BASELINE: f64 = 0.5;
pub const NEUTRAL_FLOOR: f64 = 0.3;

pub struct EmotionRule {
    pub category: EmotionCategory,
    pub applies: fn(&AcousticFeatureSet) -> bool,
    pub score: fn(&AcousticFeatureSet) -> f64,
    pub neutral_penalty: f64,
    /// Multiplier applied to the raw score before bucketing its intensity.
    pub intensity_boost: f64,
    /// Only evaluated when medical emotions are enabled.
    pub medical: bool,
}

pub static RULES: [EmotionRule; 4] = [
    EmotionRule {
        category: EmotionCategory::Anxious,
        applies: |f| f.pitch_mean > 200.0 && f.speaking_rate > 4.5 && f.pause_ratio < 0.2,
        score: |f| (0.3 + f.pitch_std / 100.0).min(0.9),
        neutral_penalty: 0.2,
        intensity_boost: 1.0,
        medical: false,
    },
    EmotionRule {
        category: EmotionCategory::Sad,
        applies: |f| f.pitch_mean < 150.0 && f.energy_mean < 0.3 && f.speaking_rate < 3.0,
        score: |f| (0.3 + (1.0 - f.energy_mean)).min(0.85),
        neutral_penalty: 0.2,
        intensity_boost: 1.0,
        medical: false,
    },
    EmotionRule {
        category: EmotionCategory::Angry,
        applies: |f| f.energy_mean > 0.7 && f.spectral_centroid > 2000.0,
        score: |f| (f.energy_mean * 0.8).min(0.8),
        neutral_penalty: 0.15,
        intensity_boost: 1.0,
        medical: false,
    },
    EmotionRule {
        category: EmotionCategory::Pain,
        applies: |f| f.jitter > 0.05 && f.hnr < 15.0 && f.pitch_std > 50.0,
        score: |f| (f.jitter * 10.0).min(0.9),
        neutral_penalty: 0.3,
        intensity_boost: 1.2,
        medical: true,
    },
];

#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    /// Sorted by confidence, highest first. Never empty.
    pub scores: Vec<EmotionScore>,
    /// Neutral value after every fired rule's penalty.
    pub neutral_baseline: f64,
    /// Categories whose rules fired, in table order.
    pub fired: Vec<EmotionCategory>,
}

impl Classification {
    pub fn primary(&self) -> EmotionCategory {
        self.scores
            .first()
            .map_or(EmotionCategory::Neutral, |s| s.category)
    }

    /// No rule fired; the neutral score only reflects the absence of evidence.
    pub fn is_inconclusive(&self) -> bool {
        self.fired.is_empty()
    }

    pub fn confidence_of(&self, category: EmotionCategory) -> f64 {
        self.scores
            .iter()
            .find(|s| s.category == category)
            .map_or(0.0, |s| s.confidence)
    }
}

#[derive(Clone, Debug)]
pub struct EmotionClassifier {
    thresholds: IntensityThresholds,
    enable_medical: bool,
}

impl EmotionClassifier {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            thresholds: config.intensity_thresholds,
            enable_medical: config.enable_medical_emotions,
        }
    }

    pub fn classify(&self, features: &AcousticFeatureSet) -> Classification {
        if features.energy_mean <= 0.0 {
            tracing::debug!(target: LOG_TARGET, "no signal energy, classification inconclusive");
            return inconclusive(NEUTRAL_BASELINE);
        }

        let mut neutral = NEUTRAL_BASELINE;
        // (category, raw score, raw score with intensity boost)
        let mut raw: Vec<(EmotionCategory, f64, f64)> = Vec::new();
        for rule in RULES.iter() {
            if rule.medical && !self.enable_medical {
                continue;
            }
            if !(rule.applies)(features) {
                continue;
            }
            let score = (rule.score)(features).clamp(0.0, 1.0);
            neutral -= rule.neutral_penalty;
            raw.push((rule.category, score, score * rule.intensity_boost));
        }
        let fired: Vec<EmotionCategory> = raw.iter().map(|(c, _, _)| *c).collect();

        if neutral > NEUTRAL_FLOOR {
            raw.push((EmotionCategory::Neutral, neutral, neutral));
        }

        let total: f64 = raw.iter().map(|(_, s, _)| s).sum();
        if raw.is_empty() || !(total > 0.0) {
            tracing::debug!(target: LOG_TARGET, neutral, "no usable scores, classification inconclusive");
            let mut result = inconclusive(neutral);
            result.fired = fired;
            return result;
        }

        let mut scores: Vec<EmotionScore> = raw
            .into_iter()
            .map(|(category, score, boosted)| EmotionScore {
                category,
                confidence: score / total,
                intensity: IntensityLevel::from_confidence(boosted, &self.thresholds),
            })
            .collect();
        scores.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        tracing::debug!(
            target: LOG_TARGET,
            fired = ?fired,
            neutral_baseline = neutral,
            primary = %scores[0].category,
            "classified"
        );

        Classification {
            scores,
            neutral_baseline: neutral,
            fired,
        }
    }
}

/// A single neutral score carrying all the confidence, used when the rule
/// table has nothing to say about the buffer.
fn inconclusive(neutral_baseline: f64) -> Classification {
    Classification {
        scores: vec![EmotionScore {
            category: EmotionCategory::Neutral,
            confidence: 1.0,
            intensity: IntensityLevel::VeryLow,
        }],
        neutral_baseline,
        fired: Vec::new(),
    }
}
