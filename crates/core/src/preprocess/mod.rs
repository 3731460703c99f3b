//! Amplitude normalization of the raw input buffer.

use crate::engine::EngineError;

const LOG_TARGET: &str = "preprocess";

/// Largest absolute sample value, 0 for an empty or silent buffer.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Rejects buffers the rest of the pipeline cannot represent.
pub fn validate(samples: &[f32]) -> Result<(), EngineError> {
    if samples.is_empty() {
        return Err(EngineError::InvalidInput("empty audio buffer".to_owned()));
    }
    if let Some(idx) = samples.iter().position(|s| !s.is_finite()) {
        return Err(EngineError::InvalidInput(format!(
            "non-finite sample at index {idx}"
        )));
    }
    Ok(())
}

/// Scales the buffer so that its peak magnitude is exactly 1.0.
///
/// A silent buffer is returned unchanged. Sample order and sign are
/// preserved.
pub fn normalize(samples: &[f32]) -> Result<Vec<f32>, EngineError> {
    validate(samples)?;

    let peak = peak(samples);
    if peak == 0.0 {
        tracing::debug!(target: LOG_TARGET, samples = samples.len(), "silent buffer, skipping normalization");
        return Ok(samples.to_vec());
    }

    Ok(samples.iter().map(|s| s / peak).collect())
}
