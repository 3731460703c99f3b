mod analyzer;
pub mod classifier;

use crate::config::IntensityThresholds;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use analyzer::{BlockingEmotionAnalyzer, EmotionAnalyzer};
pub use classifier::{Classification, EmotionClassifier};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EmotionCategory {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fear,
    Anxious,
    Stressed,
    Pain,
    Confused,
    Calm,
}

impl EmotionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionCategory::Neutral => "neutral",
            EmotionCategory::Happy => "happy",
            EmotionCategory::Sad => "sad",
            EmotionCategory::Angry => "angry",
            EmotionCategory::Fear => "fear",
            EmotionCategory::Anxious => "anxious",
            EmotionCategory::Stressed => "stressed",
            EmotionCategory::Pain => "pain",
            EmotionCategory::Confused => "confused",
            EmotionCategory::Calm => "calm",
        }
    }
}

impl fmt::Display for EmotionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordinal severity, serialized as the integer 1-5.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(into = "u8", try_from = "u8")]
pub enum IntensityLevel {
    VeryLow = 1,
    Low = 2,
    Medium = 3,
    High = 4,
    VeryHigh = 5,
}

impl IntensityLevel {
    const ASCENDING: [IntensityLevel; 5] = [
        IntensityLevel::VeryLow,
        IntensityLevel::Low,
        IntensityLevel::Medium,
        IntensityLevel::High,
        IntensityLevel::VeryHigh,
    ];

    /// Highest level whose threshold `confidence` reaches; very-low otherwise.
    pub fn from_confidence(confidence: f64, thresholds: &IntensityThresholds) -> Self {
        Self::ASCENDING
            .iter()
            .zip(thresholds.as_array())
            .rev()
            .find(|(_, threshold)| confidence >= *threshold)
            .map(|(level, _)| *level)
            .unwrap_or(IntensityLevel::VeryLow)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntensityLevel::VeryLow => "very low",
            IntensityLevel::Low => "low",
            IntensityLevel::Medium => "medium",
            IntensityLevel::High => "high",
            IntensityLevel::VeryHigh => "very high",
        }
    }
}

impl fmt::Display for IntensityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<IntensityLevel> for u8 {
    fn from(level: IntensityLevel) -> Self {
        level as u8
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("intensity level must be 1-5, got {0}")]
pub struct InvalidIntensity(pub u8);

impl TryFrom<u8> for IntensityLevel {
    type Error = InvalidIntensity;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1..=5 => Ok(Self::ASCENDING[usize::from(value - 1)]),
            other => Err(InvalidIntensity(other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmotionScore {
    pub category: EmotionCategory,
    /// Share of the normalized score mass; all scores of a result sum to 1.
    pub confidence: f64,
    /// Bucketed from the raw rule score times the rule's intensity boost,
    /// not from the normalized `confidence`.
    pub intensity: IntensityLevel,
}
