//! Frame-wise F0 tracking.
//!
//! [`PitchExtractor`] is the seam for swapping DSP backends. The default
//! [`AutocorrelationPitchExtractor`] picks the strongest local maximum of the
//! frame autocorrelation inside the pitch band and refines it with parabolic
//! interpolation. [`McLeodPitchExtractor`] delegates to the McLeod pitch
//! method from the `pitch-detection` crate.

use super::{Framing, PitchBand};
use pitch_detection::detector::mcleod::McLeodDetector;
use pitch_detection::detector::PitchDetector;

/// Minimum normalized autocorrelation for a frame to count as pitched.
pub const DEFAULT_VOICING_THRESHOLD: f64 = 0.3;

pub trait PitchExtractor: Send + Sync {
    /// One entry per frame of `framing`; `None` where no pitch with enough
    /// support was found inside `band`.
    fn track(
        &self,
        samples: &[f32],
        sample_rate: u32,
        framing: Framing,
        band: PitchBand,
    ) -> Vec<Option<f64>>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutocorrelationPitchExtractor {
    pub voicing_threshold: f64,
}

impl Default for AutocorrelationPitchExtractor {
    fn default() -> Self {
        Self {
            voicing_threshold: DEFAULT_VOICING_THRESHOLD,
        }
    }
}

impl AutocorrelationPitchExtractor {
    pub fn frame_pitch(&self, frame: &[f32], sample_rate: u32, band: PitchBand) -> Option<f64> {
        let (min_lag, max_lag) = band.lag_range(sample_rate);
        let max_lag = max_lag.min(frame.len().saturating_sub(2));
        if min_lag >= max_lag {
            return None;
        }

        let r0 = lag_product(frame, 0);
        if r0 <= f64::EPSILON {
            return None;
        }

        // r[i] holds the autocorrelation at lag `min_lag - 1 + i`
        let r: Vec<f64> = (min_lag - 1..=max_lag + 1)
            .map(|lag| lag_product(frame, lag))
            .collect();

        let (idx, peak) = strongest_peak(&r)?;
        if peak / r0 < self.voicing_threshold {
            return None;
        }

        let lag = (min_lag - 1 + idx) as f64 + parabolic_offset(r[idx - 1], r[idx], r[idx + 1]);
        let freq = f64::from(sample_rate) / lag;
        Some(freq.clamp(band.min_hz, band.max_hz))
    }
}

impl PitchExtractor for AutocorrelationPitchExtractor {
    fn track(
        &self,
        samples: &[f32],
        sample_rate: u32,
        framing: Framing,
        band: PitchBand,
    ) -> Vec<Option<f64>> {
        framing
            .frames(samples)
            .map(|frame| self.frame_pitch(frame, sample_rate, band))
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct McLeodPitchExtractor {
    pub power_threshold: f32,
    pub clarity_threshold: f32,
}

impl Default for McLeodPitchExtractor {
    fn default() -> Self {
        Self {
            power_threshold: 0.8,
            clarity_threshold: 0.5,
        }
    }
}

impl PitchExtractor for McLeodPitchExtractor {
    fn track(
        &self,
        samples: &[f32],
        sample_rate: u32,
        framing: Framing,
        band: PitchBand,
    ) -> Vec<Option<f64>> {
        let mut detector = McLeodDetector::new(framing.frame_len, framing.frame_len / 2);
        framing
            .frames(samples)
            .map(|frame| {
                detector
                    .get_pitch(
                        frame,
                        sample_rate as usize,
                        self.power_threshold,
                        self.clarity_threshold,
                    )
                    .map(|pitch| f64::from(pitch.frequency))
                    .filter(|f| *f >= band.min_hz && *f <= band.max_hz)
            })
            .collect()
    }
}

fn lag_product(frame: &[f32], lag: usize) -> f64 {
    if lag >= frame.len() {
        return 0.0;
    }
    frame
        .iter()
        .zip(&frame[lag..])
        .map(|(&a, &b)| f64::from(a) * f64::from(b))
        .sum()
}

/// Highest positive interior local maximum of `r`, as `(index, value)`.
pub(super) fn strongest_peak(r: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for i in 1..r.len().saturating_sub(1) {
        let v = r[i];
        let is_peak = v > 0.0 && v > r[i - 1] && v >= r[i + 1];
        if is_peak && best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best
}

/// Sub-sample offset of a peak from its two neighbours, within +-0.5.
fn parabolic_offset(left: f64, centre: f64, right: f64) -> f64 {
    let denom = left - 2.0 * centre + right;
    if denom < 0.0 {
        (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{lcg_noise, sine};

    const BAND: PitchBand = PitchBand {
        min_hz: 50.0,
        max_hz: 400.0,
    };
    const FRAMING: Framing = Framing {
        frame_len: 400,
        hop: 160,
    };

    fn tracked(extractor: &dyn PitchExtractor, samples: &[f32]) -> Vec<f64> {
        extractor
            .track(samples, 16_000, FRAMING, BAND)
            .into_iter()
            .flatten()
            .collect()
    }

    #[test]
    fn autocorrelation_tracks_steady_tones() {
        let extractor = AutocorrelationPitchExtractor::default();
        for freq in [100.0, 180.0, 300.0] {
            let pitches = tracked(&extractor, &sine(freq, 16_000, 0.5, 0.7));
            assert!(!pitches.is_empty());
            for p in pitches {
                assert!((p - freq as f64).abs() / (freq as f64) < 0.03, "{freq} Hz tracked as {p}");
            }
        }
    }

    #[test]
    fn silence_and_noise_are_unpitched() {
        let extractor = AutocorrelationPitchExtractor::default();
        assert!(tracked(&extractor, &[0.0; 8_000]).is_empty());
        let noise = lcg_noise(16_000, 0.8);
        let pitched = tracked(&extractor, &noise).len();
        let frames = FRAMING.frame_count(noise.len());
        assert!(pitched * 10 < frames, "{pitched} of {frames} noise frames pitched");
    }

    #[test]
    fn short_frames_have_no_pitch() {
        let extractor = AutocorrelationPitchExtractor::default();
        assert_eq!(extractor.frame_pitch(&[0.5, -0.5, 0.5], 16_000, BAND), None);
    }

    #[test]
    fn one_entry_per_frame() {
        let samples = sine(150.0, 16_000, 0.3, 0.5);
        let track = AutocorrelationPitchExtractor::default().track(&samples, 16_000, FRAMING, BAND);
        assert_eq!(track.len(), FRAMING.frame_count(samples.len()));
    }

    #[test]
    fn mcleod_tracks_steady_tone() {
        let pitches = tracked(&McLeodPitchExtractor::default(), &sine(200.0, 16_000, 1.0, 0.5));
        assert!(!pitches.is_empty());
        let mean = pitches.iter().sum::<f64>() / pitches.len() as f64;
        assert!((mean - 200.0).abs() < 20.0, "mean {mean}");
    }

    #[test]
    fn peak_picking_ignores_edges_and_negatives() {
        assert_eq!(strongest_peak(&[5.0, 1.0, 0.5]), None);
        assert_eq!(strongest_peak(&[-3.0, -1.0, -2.0]), None);
        assert_eq!(strongest_peak(&[0.0, 2.0, 1.0, 3.0, 1.0]), Some((3, 3.0)));
    }

    #[test]
    fn parabolic_offset_is_symmetric() {
        assert_eq!(parabolic_offset(1.0, 2.0, 1.0), 0.0);
        assert!(parabolic_offset(1.5, 2.0, 1.0) < 0.0);
        assert!(parabolic_offset(1.0, 2.0, 1.5) > 0.0);
    }
}
