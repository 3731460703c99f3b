use crate::emotion::Classification;
use crate::features::AcousticFeatureSet;
use crate::util::stats;

/// Below this HNR (dB) the recording is treated as poor quality.
const LOW_HNR_DB: f64 = 5.0;
/// Below this voiced-frame ratio the buffer has too little speech.
const LOW_VOICED_RATIO: f64 = 0.2;
/// Overall confidence never exceeds this when no rule fired.
pub const INCONCLUSIVE_CEILING: f64 = 0.5;

/// Overall confidence of a detection in `[0, 1]`.
///
/// Averages the top score, the separation between the two best scores (only
/// when there are at least two), a feature-quality factor and a voice-activity
/// factor.
///
/// An inconclusive classification contributes its raw neutral baseline instead
/// of the normalized neutral score, and the result is capped at
/// [`INCONCLUSIVE_CEILING`].
pub fn estimate(classification: &Classification, features: &AcousticFeatureSet) -> f64 {
    let scores = classification.scores.as_slice();
    let inconclusive = classification.is_inconclusive();
    let mut factors = Vec::with_capacity(4);

    if inconclusive {
        factors.push(classification.neutral_baseline);
    } else if let Some(top) = scores.first() {
        factors.push(top.confidence);
    }
    if let [first, second, ..] = scores {
        factors.push((2.0 * (first.confidence - second.confidence)).min(1.0));
    }
    factors.push(quality_factor(features));
    factors.push(if features.voiced_ratio < LOW_VOICED_RATIO {
        0.5
    } else {
        1.0
    });

    let confidence = stats::finite_or_zero(stats::mean(&factors)).clamp(0.0, 1.0);
    if inconclusive {
        confidence.min(INCONCLUSIVE_CEILING)
    } else {
        confidence
    }
}

fn quality_factor(features: &AcousticFeatureSet) -> f64 {
    let mut quality = 1.0;
    if features.pitch_mean == 0.0 || features.energy_mean == 0.0 {
        quality *= 0.5;
    }
    if features.hnr < LOW_HNR_DB {
        quality *= 0.8;
    }
    quality
}
