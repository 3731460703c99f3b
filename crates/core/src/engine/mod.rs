//! Single-buffer analysis entry point.
//!
//! [`EmotionEngine`] owns a validated configuration and the stateless stage
//! objects built from it. It is `Send + Sync`; share it behind an `Arc` to
//! analyze from several threads at once.

use crate::clinical;
use crate::confidence;
use crate::config::{ConfigError, EngineConfig};
use crate::emotion::{EmotionCategory, EmotionClassifier, EmotionScore};
use crate::features::{AcousticFeatureSet, FeatureExtractor, PitchExtractor, SpectralAnalyzer};
use crate::medical::{MedicalAnalyzer, MedicalIndicators};
use crate::preprocess;
use crate::temporal::{EmotionTimeline, TemporalSegmenter};
use crate::util::CancelFlag;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const LOG_TARGET: &str = "engine";

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("analysis cancelled")]
    Cancelled,
    #[error("analysis worker failed: {0}")]
    WorkerFailed(String),
}

/// One buffer to analyze. Unset overrides fall back to the engine
/// configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalysisRequest {
    pub samples: Vec<f32>,
    pub sample_rate: Option<u32>,
    pub temporal: Option<bool>,
}

impl AnalysisRequest {
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            ..Default::default()
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    pub fn with_temporal(mut self, enabled: bool) -> Self {
        self.temporal = Some(enabled);
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DetectionResult {
    pub primary_emotion: EmotionCategory,
    pub emotion_scores: Vec<EmotionScore>,
    pub features: AcousticFeatureSet,
    pub indicators: MedicalIndicators,
    pub timeline: EmotionTimeline,
    pub stability: f64,
    pub confidence: f64,
    pub clinical_notes: Vec<String>,
}

#[derive(Debug)]
pub struct EmotionEngine {
    config: EngineConfig,
    extractor: FeatureExtractor,
    classifier: EmotionClassifier,
    medical: MedicalAnalyzer,
    segmenter: TemporalSegmenter,
}

impl EmotionEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let extractor = FeatureExtractor::new(&config);
        Ok(Self::assemble(config, extractor))
    }

    /// Like [`EmotionEngine::new`] with caller-provided DSP backends.
    pub fn with_backends(
        config: EngineConfig,
        pitch: Arc<dyn PitchExtractor>,
        spectral: Arc<dyn SpectralAnalyzer>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let extractor = FeatureExtractor::with_backends(&config, pitch, spectral);
        Ok(Self::assemble(config, extractor))
    }

    fn assemble(config: EngineConfig, extractor: FeatureExtractor) -> Self {
        Self {
            classifier: EmotionClassifier::new(&config),
            medical: MedicalAnalyzer::new(&config),
            segmenter: TemporalSegmenter::new(&config),
            extractor,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn analyze(&self, request: &AnalysisRequest) -> Result<DetectionResult, EngineError> {
        self.analyze_with_cancel(request, &CancelFlag::new())
    }

    pub fn analyze_with_cancel(
        &self,
        request: &AnalysisRequest,
        cancel: &CancelFlag,
    ) -> Result<DetectionResult, EngineError> {
        let sample_rate = request.sample_rate.unwrap_or(self.config.sample_rate);
        if sample_rate == 0 {
            tracing::warn!(target: LOG_TARGET, "rejected request with zero sample rate");
            return Err(EngineError::InvalidInput(
                "sample rate must be positive".to_owned(),
            ));
        }

        let samples = preprocess::normalize(&request.samples).map_err(|e| {
            tracing::warn!(target: LOG_TARGET, error = %e, samples = request.samples.len(), "rejected input buffer");
            e
        })?;

        let features = self.extractor.extract(&samples, sample_rate);
        let classification = self.classifier.classify(&features);

        let temporal = request
            .temporal
            .unwrap_or(self.config.enable_temporal_analysis);
        let timeline = if temporal {
            self.segmenter.segment(
                &samples,
                sample_rate,
                &self.extractor,
                &self.classifier,
                cancel,
            )?
        } else {
            EmotionTimeline::default()
        };

        let indicators = self.medical.analyze(&features, &classification);
        let confidence = confidence::estimate(&classification, &features);
        let clinical_notes = clinical::annotate(
            &indicators,
            &features,
            &classification.scores,
            self.config.confidence_threshold,
        );

        let result = DetectionResult {
            primary_emotion: classification.primary(),
            stability: timeline.stability(),
            emotion_scores: classification.scores,
            features,
            indicators,
            timeline,
            confidence,
            clinical_notes,
        };

        tracing::debug!(
            target: LOG_TARGET,
            samples = samples.len(),
            sample_rate,
            primary = %result.primary_emotion,
            confidence = result.confidence,
            windows = result.timeline.len(),
            notes = result.clinical_notes.len(),
            "analysis complete"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::McLeodPitchExtractor;
    use crate::features::FftSpectralAnalyzer;
    use crate::testing::{alternating_tones, four_kilohertz_square, sine};
    use proptest::prelude::*;

    fn engine() -> EmotionEngine {
        EmotionEngine::new(EngineConfig::default()).unwrap()
    }

    fn assert_well_formed(result: &DetectionResult) {
        let total: f64 = result.emotion_scores.iter().map(|s| s.confidence).sum();
        assert!((total - 1.0).abs() < 1e-6, "scores sum to {total}");
        assert!(result
            .emotion_scores
            .windows(2)
            .all(|w| w[0].confidence >= w[1].confidence));
        assert_eq!(result.primary_emotion, result.emotion_scores[0].category);
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!((0.0..=1.0).contains(&result.stability));
        let i = result.indicators;
        assert!([i.distress, i.pain, i.anxiety]
            .iter()
            .all(|v| (0.0..=1.0).contains(v)));
        assert!(result.features.scalars().all(f64::is_finite));
        assert!(result
            .timeline
            .entries()
            .windows(2)
            .all(|w| w[0].timestamp_sec <= w[1].timestamp_sec));
    }

    #[test]
    fn engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EmotionEngine>();
    }

    #[test]
    fn silent_buffer_is_neutral() {
        let result = engine().analyze(&AnalysisRequest::new(vec![0.0; 16_000])).unwrap();
        assert_well_formed(&result);
        assert!(result.features.scalars().all(|v| v == 0.0));
        assert_eq!(result.primary_emotion, EmotionCategory::Neutral);
        assert!((result.confidence - 1.4 / 3.0).abs() < 1e-9, "{}", result.confidence);
        assert_eq!(result.timeline.len(), 1);
        assert_eq!(result.stability, 1.0);
    }

    #[test]
    fn steady_tone_without_evidence_has_low_confidence() {
        let config = EngineConfig::default();
        let engine = EmotionEngine::new(config.clone()).unwrap();
        let result = engine
            .analyze(&AnalysisRequest::new(sine(180.0, 16_000, 2.0, 0.5)))
            .unwrap();
        assert_well_formed(&result);
        let classification = EmotionClassifier::new(&config).classify(&result.features);
        assert!(classification.is_inconclusive(), "{:?}", classification.fired);
        assert_eq!(result.primary_emotion, EmotionCategory::Neutral);
        assert!(
            result.confidence < config.confidence_threshold,
            "confidence {}",
            result.confidence
        );
    }

    #[test]
    fn unstable_voice_scores_pain() {
        let samples = alternating_tones(100.0, 1.0, 300.0, 0.4, 0.05, 2.0, 16_000);
        let result = engine().analyze(&AnalysisRequest::new(samples)).unwrap();
        assert_well_formed(&result);
        let f = &result.features;
        assert!(f.jitter > 0.05 && f.hnr < 15.0 && f.pitch_std > 50.0, "{f:?}");
        let pain = result
            .emotion_scores
            .iter()
            .find(|s| s.category == EmotionCategory::Pain)
            .expect("pain scored");
        assert!(pain.confidence > 0.0);
        assert!(result.indicators.pain > 0.6, "{:?}", result.indicators);
        assert!(result
            .clinical_notes
            .iter()
            .any(|n| n.starts_with("Possible pain")));
    }

    #[test]
    fn loud_bright_signal_is_angry() {
        let result = engine()
            .analyze(&AnalysisRequest::new(four_kilohertz_square(16_000, 2.0)))
            .unwrap();
        assert_well_formed(&result);
        assert_eq!(result.primary_emotion, EmotionCategory::Angry);
        let classification = EmotionClassifier::new(&EngineConfig::default()).classify(&result.features);
        assert_eq!(classification.fired, vec![EmotionCategory::Angry]);
        assert!((classification.neutral_baseline - 0.35).abs() < 1e-12);
        let categories: Vec<_> = result.emotion_scores.iter().map(|s| s.category).collect();
        assert_eq!(categories, vec![EmotionCategory::Angry, EmotionCategory::Neutral]);
        assert_eq!(result.timeline.len(), 2);
        assert!(result
            .timeline
            .entries()
            .iter()
            .all(|e| e.emotion == EmotionCategory::Angry));
    }

    #[test]
    fn rejects_invalid_input() {
        let engine = engine();
        assert!(matches!(
            engine.analyze(&AnalysisRequest::new(Vec::new())),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.analyze(&AnalysisRequest::new(vec![0.1, f32::NAN, 0.2])),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.analyze(&AnalysisRequest::new(vec![0.1; 100]).with_sample_rate(0)),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig {
            pitch_min_hz: 500.0,
            ..EngineConfig::default()
        };
        assert!(EmotionEngine::new(config).is_err());
    }

    #[test]
    fn feature_weights_do_not_change_the_result() {
        let samples = alternating_tones(100.0, 1.0, 300.0, 0.4, 0.05, 2.0, 16_000);
        let weighted = EmotionEngine::new(EngineConfig {
            feature_weights: crate::config::FeatureWeights {
                pitch: 1.0,
                energy: 0.0,
                spectral: 0.0,
                voice_quality: 0.0,
            },
            ..EngineConfig::default()
        })
        .unwrap();
        let request = AnalysisRequest::new(samples);
        assert_eq!(
            engine().analyze(&request).unwrap(),
            weighted.analyze(&request).unwrap()
        );
    }

    #[test]
    fn temporal_override() {
        let samples = sine(180.0, 16_000, 3.0, 0.5);
        let engine = engine();
        let with = engine.analyze(&AnalysisRequest::new(samples.clone())).unwrap();
        assert_eq!(with.timeline.len(), 3);
        let without = engine
            .analyze(&AnalysisRequest::new(samples).with_temporal(false))
            .unwrap();
        assert!(without.timeline.is_empty());
        assert_eq!(without.stability, 1.0);
        assert_eq!(with.features, without.features);
    }

    #[test]
    fn cancellation_only_affects_segmentation() {
        let engine = engine();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let samples = sine(180.0, 16_000, 2.0, 0.5);
        assert_eq!(
            engine.analyze_with_cancel(&AnalysisRequest::new(samples.clone()), &cancel),
            Err(EngineError::Cancelled)
        );
        let request = AnalysisRequest::new(samples).with_temporal(false);
        assert!(engine.analyze_with_cancel(&request, &cancel).is_ok());
    }

    #[test]
    fn scaling_the_input_does_not_change_the_result() {
        let engine = engine();
        let samples = alternating_tones(120.0, 0.9, 240.0, 0.5, 0.04, 1.0, 16_000);
        let quiet: Vec<f32> = samples.iter().map(|s| s * 0.25).collect();
        let a = engine.analyze(&AnalysisRequest::new(samples)).unwrap();
        let b = engine.analyze(&AnalysisRequest::new(quiet)).unwrap();
        assert_eq!(a.primary_emotion, b.primary_emotion);
        assert!((a.features.pitch_mean - b.features.pitch_mean).abs() < 1e-3);
    }

    #[test]
    fn deterministic_and_serializable() {
        let engine = engine();
        let request = AnalysisRequest::new(sine(220.0, 16_000, 1.5, 0.8));
        let a = engine.analyze(&request).unwrap();
        let b = engine.analyze(&request).unwrap();
        assert_eq!(a, b);

        let json = serde_json::to_value(&a).unwrap();
        for key in [
            "primary_emotion",
            "emotion_scores",
            "features",
            "indicators",
            "timeline",
            "stability",
            "confidence",
            "clinical_notes",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        let back: DetectionResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.primary_emotion, a.primary_emotion);
    }

    #[test]
    fn mcleod_backend_plugs_in() {
        let engine = EmotionEngine::with_backends(
            EngineConfig::default(),
            Arc::new(McLeodPitchExtractor::default()),
            Arc::new(FftSpectralAnalyzer),
        )
        .unwrap();
        let result = engine
            .analyze(&AnalysisRequest::new(sine(200.0, 16_000, 1.0, 0.5)))
            .unwrap();
        assert!((result.features.pitch_mean - 200.0).abs() < 20.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn arbitrary_buffers_give_well_formed_results(
            samples in proptest::collection::vec(-1.0f32..1.0, 1..6_000)
        ) {
            let result = engine()
                .analyze(&AnalysisRequest::new(samples).with_temporal(false))
                .unwrap();
            assert_well_formed(&result);
        }
    }
}
