use super::pitch::strongest_peak;
use super::PitchBand;
use crate::util::stats::mean_relative_perturbation;

/// Relative cycle-to-cycle variation of the pitch period, computed over
/// consecutive pitched frames.
pub fn jitter(pitches: &[f64]) -> f64 {
    let periods: Vec<f64> = pitches
        .iter()
        .filter(|f| f.is_finite() && **f > 0.0)
        .map(|f| 1.0 / f)
        .collect();
    mean_relative_perturbation(&periods)
}

/// Relative variation between successive positive waveform peaks. A peak must
/// dominate half the shortest pitch period on either side.
pub fn shimmer(samples: &[f32], sample_rate: u32, band: PitchBand) -> f64 {
    let half_period = ((f64::from(sample_rate) / band.max_hz / 2.0).floor() as usize).max(1);
    let mut amplitudes = Vec::new();

    for i in 1..samples.len() {
        let x = samples[i];
        if x <= 0.0 || x <= samples[i - 1] {
            continue;
        }
        let lo = i.saturating_sub(half_period);
        let hi = (i + half_period).min(samples.len() - 1);
        if samples[lo..=hi].iter().all(|&s| x >= s) {
            amplitudes.push(f64::from(x));
        }
    }

    mean_relative_perturbation(&amplitudes)
}

/// Harmonics-to-noise ratio in dB from a whole-buffer autocorrelation
/// (`autocorr[lag]`). Uses the strongest normalized peak inside the pitch
/// band; 0 when there is no periodic structure to measure.
pub fn harmonics_to_noise_ratio(autocorr: &[f64], sample_rate: u32, band: PitchBand) -> f64 {
    let Some(&r0) = autocorr.first() else {
        return 0.0;
    };
    if r0 <= f64::EPSILON {
        return 0.0;
    }

    let (min_lag, max_lag) = band.lag_range(sample_rate);
    let max_lag = max_lag.min(autocorr.len().saturating_sub(2));
    if min_lag > max_lag {
        return 0.0;
    }

    let Some((_, peak)) = strongest_peak(&autocorr[min_lag - 1..=max_lag + 1]) else {
        return 0.0;
    };
    let r = (peak / r0).min(0.9999);
    10.0 * (r / (1.0 - r)).log10()
}
