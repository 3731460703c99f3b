//! Voice-biomarker emotion analysis.
//!
//! [`EmotionEngine`] turns a mono waveform into a [`DetectionResult`]: an
//! acoustic feature set, rule-based emotion scores, medical indicators, an
//! optional per-window timeline, an overall confidence and clinical notes.
//! [`session::aggregate`] folds several results into a [`SessionProfile`].
//! [`AnalysisPool`] runs analyses concurrently behind a bounded queue.

#![deny(warnings)]

pub mod clinical;
pub mod confidence;
pub mod config;
pub mod emotion;
pub mod engine;
pub mod features;
pub mod medical;
pub mod pool;
pub mod preprocess;
pub mod session;
pub mod temporal;
pub mod util;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, EngineConfig, PoolConfig};
pub use emotion::{EmotionCategory, EmotionScore, IntensityLevel};
pub use engine::{AnalysisRequest, DetectionResult, EmotionEngine, EngineError};
pub use features::AcousticFeatureSet;
pub use medical::MedicalIndicators;
pub use pool::{AnalysisPool, PendingAnalysis, PoolError};
pub use session::SessionProfile;
pub use temporal::{EmotionTimeline, TimelineEntry};
pub use util::CancelFlag;
