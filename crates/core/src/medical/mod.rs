//! Continuous distress, pain and anxiety indicators.
//!
//! Each indicator averages a handful of normalized feature components, scales
//! the mean by a configured sensitivity and clamps it to `[0, 1]`.

use crate::config::EngineConfig;
use crate::emotion::{Classification, EmotionCategory};
use crate::features::AcousticFeatureSet;
use crate::util::stats::{self, finite_or_zero};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MedicalIndicators {
    pub distress: f64,
    pub pain: f64,
    pub anxiety: f64,
}

#[derive(Clone, Debug)]
pub struct MedicalAnalyzer {
    enabled: bool,
    distress_sensitivity: f64,
    pain_sensitivity: f64,
    anxiety_sensitivity: f64,
}

impl MedicalAnalyzer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            enabled: config.enable_medical_emotions,
            distress_sensitivity: config.distress_detection_sensitivity,
            pain_sensitivity: config.pain_detection_sensitivity,
            anxiety_sensitivity: config.anxiety_detection_sensitivity,
        }
    }

    pub fn analyze(
        &self,
        features: &AcousticFeatureSet,
        classification: &Classification,
    ) -> MedicalIndicators {
        if !self.enabled {
            return MedicalIndicators::default();
        }
        let f = features;

        let distress = [
            f.pitch_std / 100.0,
            f.jitter * 10.0,
            1.0 - f.hnr / 30.0,
            if f.speaking_rate > 5.0 {
                f.speaking_rate / 10.0
            } else {
                0.0
            },
        ];

        let pain = [
            f.jitter * 15.0,
            f.shimmer * 10.0,
            1.0 - f.voiced_ratio,
            f.pitch_std / 80.0,
            classification.confidence_of(EmotionCategory::Pain),
        ];

        let anxiety = [
            if f.speaking_rate > 4.0 {
                f.speaking_rate / 8.0
            } else {
                0.0
            },
            if f.pitch_mean > 200.0 {
                f.pitch_mean / 300.0
            } else {
                0.0
            },
            1.0 - f.pause_ratio * 2.0,
            if f.energy_mean > 0.0 {
                f.energy_std / f.energy_mean
            } else {
                0.0
            },
            classification.confidence_of(EmotionCategory::Anxious),
        ];

        MedicalIndicators {
            distress: indicator(self.distress_sensitivity, &distress),
            pain: indicator(self.pain_sensitivity, &pain),
            anxiety: indicator(self.anxiety_sensitivity, &anxiety),
        }
    }
}

fn indicator(sensitivity: f64, components: &[f64]) -> f64 {
    finite_or_zero(sensitivity * stats::mean(components)).clamp(0.0, 1.0)
}
