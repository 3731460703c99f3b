use super::Framing;
use crate::util::stats;

/// Frames with a zero-crossing rate (crossings per sample) below this are
/// counted as voiced.
pub const VOICED_ZCR_THRESHOLD: f64 = 0.1;

/// Frames quieter than this fraction of the mean energy count as pauses.
const PAUSE_ENERGY_FRACTION: f64 = 0.1;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EnergyProfile {
    pub mean: f64,
    pub std: f64,
    pub range: f64,
    /// Energy peaks above the mean per second of audio.
    pub speaking_rate: f64,
    pub pause_ratio: f64,
    pub voiced_ratio: f64,
}

impl EnergyProfile {
    pub fn compute(samples: &[f32], sample_rate: u32, framing: Framing) -> Self {
        let energies = frame_rms(samples, framing);
        if energies.is_empty() || sample_rate == 0 {
            return Self::default();
        }

        let mean = stats::mean(&energies);
        let duration_s = samples.len() as f64 / f64::from(sample_rate);

        let peaks = energies
            .windows(3)
            .filter(|w| w[1] > mean && w[1] > w[0] && w[1] >= w[2])
            .count();

        let frames = energies.len() as f64;
        let pauses = energies
            .iter()
            .filter(|&&e| e < PAUSE_ENERGY_FRACTION * mean)
            .count();
        let voiced = framing
            .frames(samples)
            .zip(&energies)
            .filter(|(frame, &e)| e > 0.0 && zero_crossing_rate(frame) < VOICED_ZCR_THRESHOLD)
            .count();

        Self {
            mean,
            std: stats::std_dev(&energies),
            range: stats::range(&energies),
            speaking_rate: peaks as f64 / duration_s,
            pause_ratio: pauses as f64 / frames,
            voiced_ratio: voiced as f64 / frames,
        }
    }
}

/// Root-mean-square amplitude of every frame.
pub fn frame_rms(samples: &[f32], framing: Framing) -> Vec<f64> {
    framing
        .frames(samples)
        .map(|frame| {
            let sum_sq: f64 = frame.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
            (sum_sq / frame.len() as f64).sqrt()
        })
        .collect()
}

/// Sign changes per sample.
pub fn zero_crossing_rate(frame: &[f32]) -> f64 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / frame.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sine;

    const FRAMING: Framing = Framing {
        frame_len: 400,
        hop: 160,
    };

    #[test]
    fn zcr_of_alternating_signal() {
        assert!((zero_crossing_rate(&[1.0, -1.0, 1.0, -1.0]) - 0.75).abs() < 1e-12);
        assert_eq!(zero_crossing_rate(&[0.5; 10]), 0.0);
        assert_eq!(zero_crossing_rate(&[0.5]), 0.0);
    }

    #[test]
    fn silence_is_neither_voiced_nor_paused() {
        let profile = EnergyProfile::compute(&[0.0; 4_000], 16_000, FRAMING);
        assert_eq!(profile, EnergyProfile::default());
    }

    #[test]
    fn bursts_produce_rate_and_pauses() {
        // 4 bursts of 100 ms tone separated by 150 ms silence, 1 s total
        let tone = sine(150.0, 16_000, 0.1, 0.8);
        let mut samples = Vec::new();
        for _ in 0..4 {
            samples.extend_from_slice(&tone);
            samples.extend(std::iter::repeat(0.0).take(2_400));
        }
        let profile = EnergyProfile::compute(&samples, 16_000, FRAMING);
        assert!(profile.speaking_rate >= 3.0, "rate {}", profile.speaking_rate);
        assert!(profile.pause_ratio > 0.2, "pause {}", profile.pause_ratio);
        assert!(profile.voiced_ratio > 0.3 && profile.voiced_ratio < 1.0);
        assert!(profile.range > 0.0);
    }

    #[test]
    fn rms_of_full_scale_sine() {
        let rms = frame_rms(&sine(200.0, 16_000, 0.1, 1.0), FRAMING);
        assert!(!rms.is_empty());
        assert!(rms
            .iter()
            .all(|r| (r - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-3));
    }
}
