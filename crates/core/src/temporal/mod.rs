//! Windowed re-classification of a buffer into an emotion timeline.

use crate::config::{seconds_to_samples, EngineConfig};
use crate::emotion::{EmotionCategory, EmotionClassifier};
use crate::engine::EngineError;
use crate::features::FeatureExtractor;
use crate::util::CancelFlag;
use serde::{Deserialize, Serialize};

const LOG_TARGET: &str = "temporal";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimelineEntry {
    /// Window start, in seconds from the beginning of the buffer.
    pub timestamp_sec: f64,
    pub emotion: EmotionCategory,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct EmotionTimeline {
    entries: Vec<TimelineEntry>,
}

impl EmotionTimeline {
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of adjacent windows whose emotion differs.
    pub fn transitions(&self) -> usize {
        self.entries
            .windows(2)
            .filter(|w| w[0].emotion != w[1].emotion)
            .count()
    }

    /// `1 - transitions / (windows - 1)`; 1.0 with fewer than two windows.
    pub fn stability(&self) -> f64 {
        if self.entries.len() < 2 {
            return 1.0;
        }
        1.0 - self.transitions() as f64 / (self.entries.len() - 1) as f64
    }
}

impl FromIterator<TimelineEntry> for EmotionTimeline {
    fn from_iter<I: IntoIterator<Item = TimelineEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TemporalSegmenter {
    segment_duration_s: f64,
}

impl TemporalSegmenter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            segment_duration_s: config.min_segment_duration_s,
        }
    }

    pub fn segment_length(&self, sample_rate: u32) -> usize {
        seconds_to_samples(self.segment_duration_s, sample_rate)
    }

    /// Classifies every full, non-overlapping window. The cancel flag is
    /// checked before each window.
    pub fn segment(
        &self,
        samples: &[f32],
        sample_rate: u32,
        extractor: &FeatureExtractor,
        classifier: &EmotionClassifier,
        cancel: &CancelFlag,
    ) -> Result<EmotionTimeline, EngineError> {
        let window = self.segment_length(sample_rate);
        let mut entries = Vec::with_capacity(samples.len() / window);

        for (i, chunk) in samples.chunks_exact(window).enumerate() {
            if cancel.is_cancelled() {
                tracing::debug!(target: LOG_TARGET, window = i, "segmentation cancelled");
                return Err(EngineError::Cancelled);
            }
            let features = extractor.extract(chunk, sample_rate);
            let emotion = classifier.classify(&features).primary();
            entries.push(TimelineEntry {
                timestamp_sec: (i * window) as f64 / f64::from(sample_rate),
                emotion,
            });
        }

        let timeline = EmotionTimeline { entries };
        tracing::debug!(
            target: LOG_TARGET,
            windows = timeline.len(),
            transitions = timeline.transitions(),
            "timeline built"
        );
        Ok(timeline)
    }
}
