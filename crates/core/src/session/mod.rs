//! Aggregation of several detections into one session summary.

use crate::emotion::EmotionCategory;
use crate::engine::DetectionResult;
use crate::medical::MedicalIndicators;
use crate::util::stats::mean;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionProfile {
    /// Most frequent primary emotion; ties go to the one seen first.
    pub dominant_emotion: EmotionCategory,
    pub result_count: usize,
    pub emotion_distribution: BTreeMap<EmotionCategory, usize>,
    pub mean_indicators: MedicalIndicators,
    pub mean_stability: f64,
    pub mean_confidence: f64,
    /// Every distinct note, in order of first appearance.
    pub clinical_notes: Vec<String>,
}

/// Folds a set of results into a profile. `None` for an empty slice.
pub fn aggregate(results: &[DetectionResult]) -> Option<SessionProfile> {
    let first = results.first()?;

    let mut distribution: BTreeMap<EmotionCategory, usize> = BTreeMap::new();
    for result in results {
        *distribution.entry(result.primary_emotion).or_default() += 1;
    }
    let top = distribution.values().copied().max().unwrap_or(0);
    let dominant = results
        .iter()
        .map(|r| r.primary_emotion)
        .find(|e| distribution.get(e) == Some(&top))
        .unwrap_or(first.primary_emotion);

    let column = |f: fn(&DetectionResult) -> f64| -> f64 {
        mean(&results.iter().map(f).collect::<Vec<_>>())
    };

    let mut clinical_notes: Vec<String> = Vec::new();
    for note in results.iter().flat_map(|r| &r.clinical_notes) {
        if !clinical_notes.contains(note) {
            clinical_notes.push(note.clone());
        }
    }

    Some(SessionProfile {
        dominant_emotion: dominant,
        result_count: results.len(),
        emotion_distribution: distribution,
        mean_indicators: MedicalIndicators {
            distress: column(|r| r.indicators.distress),
            pain: column(|r| r.indicators.pain),
            anxiety: column(|r| r.indicators.anxiety),
        },
        mean_stability: column(|r| r.stability),
        mean_confidence: column(|r| r.confidence),
        clinical_notes,
    })
}
