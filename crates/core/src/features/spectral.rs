//! Spectral and cepstral descriptors.
//!
//! Every frame is Hann-windowed, zero-padded to the next power of two and
//! transformed with `rustfft`. The one-sided magnitude spectra feed the
//! centroid, rolloff and flux statistics as well as the mel-cepstral
//! coefficients. The same FFT machinery provides the whole-buffer
//! autocorrelation used for the harmonics-to-noise ratio.

use super::Framing;
use crate::util::stats;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f64::consts::PI;

pub const CEPSTRAL_COEFFICIENTS: usize = 13;

/// Fraction of spectral magnitude below the rolloff frequency.
pub const ROLLOFF_FRACTION: f64 = 0.85;

const MEL_FILTERS: usize = 26;
const LOG_FLOOR: f64 = 1e-10;

/// One-sided magnitude spectra, one row per analysis frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Spectrogram {
    /// Width of one frequency bin in Hz.
    pub bin_hz: f64,
    pub frames: Vec<Vec<f64>>,
}

impl Spectrogram {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Mean over frames of the magnitude-weighted mean frequency. Frames with
    /// no energy contribute 0.
    pub fn mean_centroid(&self) -> f64 {
        let per_frame: Vec<f64> = self
            .frames
            .iter()
            .map(|mags| {
                let total: f64 = mags.iter().sum();
                if total <= 0.0 {
                    return 0.0;
                }
                let weighted: f64 = mags
                    .iter()
                    .enumerate()
                    .map(|(k, m)| k as f64 * self.bin_hz * m)
                    .sum();
                weighted / total
            })
            .collect();
        stats::mean(&per_frame)
    }

    /// Mean over frames of the lowest frequency below which `fraction` of the
    /// frame's magnitude lies.
    pub fn mean_rolloff(&self, fraction: f64) -> f64 {
        let per_frame: Vec<f64> = self
            .frames
            .iter()
            .map(|mags| {
                let total: f64 = mags.iter().sum();
                if total <= 0.0 {
                    return 0.0;
                }
                let target = fraction * total;
                let mut cumulative = 0.0;
                for (k, m) in mags.iter().enumerate() {
                    cumulative += m;
                    if cumulative >= target {
                        return k as f64 * self.bin_hz;
                    }
                }
                (mags.len() - 1) as f64 * self.bin_hz
            })
            .collect();
        stats::mean(&per_frame)
    }

    /// Mean over consecutive frame pairs of the summed squared magnitude
    /// difference. 0 with fewer than two frames.
    pub fn mean_flux(&self) -> f64 {
        let per_pair: Vec<f64> = self
            .frames
            .windows(2)
            .map(|pair| {
                pair[0]
                    .iter()
                    .zip(&pair[1])
                    .map(|(a, b)| (b - a).powi(2))
                    .sum()
            })
            .collect();
        stats::mean(&per_pair)
    }
}

pub trait SpectralAnalyzer: Send + Sync {
    fn magnitude_spectrogram(&self, samples: &[f32], sample_rate: u32, framing: Framing)
        -> Spectrogram;

    /// Biased autocorrelation of the whole buffer for lags `0..lags`.
    fn autocorrelation(&self, samples: &[f32], lags: usize) -> Vec<f64>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FftSpectralAnalyzer;

impl SpectralAnalyzer for FftSpectralAnalyzer {
    fn magnitude_spectrogram(
        &self,
        samples: &[f32],
        sample_rate: u32,
        framing: Framing,
    ) -> Spectrogram {
        if framing.frame_count(samples.len()) == 0 || sample_rate == 0 {
            return Spectrogram::default();
        }

        let n_fft = framing.frame_len.next_power_of_two();
        let window = hann(framing.frame_len);
        let fft = FftPlanner::<f64>::new().plan_fft_forward(n_fft);
        let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];

        let frames = framing
            .frames(samples)
            .map(|frame| {
                buffer.fill(Complex::new(0.0, 0.0));
                for ((slot, &s), w) in buffer.iter_mut().zip(frame).zip(&window) {
                    slot.re = f64::from(s) * w;
                }
                fft.process(&mut buffer);
                buffer[..=n_fft / 2].iter().map(|c| c.norm()).collect()
            })
            .collect();

        Spectrogram {
            bin_hz: f64::from(sample_rate) / n_fft as f64,
            frames,
        }
    }

    fn autocorrelation(&self, samples: &[f32], lags: usize) -> Vec<f64> {
        if samples.is_empty() || lags == 0 {
            return Vec::new();
        }
        let size = (2 * samples.len()).next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);

        let mut buffer: Vec<Complex<f64>> = samples
            .iter()
            .map(|&s| Complex::new(f64::from(s), 0.0))
            .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
            .take(size)
            .collect();
        forward.process(&mut buffer);
        for c in buffer.iter_mut() {
            *c = Complex::new(c.norm_sqr(), 0.0);
        }
        inverse.process(&mut buffer);

        let scale = 1.0 / size as f64;
        buffer
            .iter()
            .take(lags.min(samples.len()))
            .map(|c| c.re * scale)
            .collect()
    }
}

/// Per-coefficient mean and standard deviation of the MFCCs over all
/// non-silent frames. All zeros when no such frame exists.
pub fn cepstral_statistics(
    spectrogram: &Spectrogram,
    sample_rate: u32,
) -> ([f64; CEPSTRAL_COEFFICIENTS], [f64; CEPSTRAL_COEFFICIENTS]) {
    let mut means = [0.0; CEPSTRAL_COEFFICIENTS];
    let mut stds = [0.0; CEPSTRAL_COEFFICIENTS];
    let Some(bins) = spectrogram.frames.first().map(Vec::len).filter(|&b| b > 0) else {
        return (means, stds);
    };

    let filters = mel_filterbank(MEL_FILTERS, bins, spectrogram.bin_hz, sample_rate);
    let coefficients: Vec<[f64; CEPSTRAL_COEFFICIENTS]> = spectrogram
        .frames
        .iter()
        .filter(|mags| mags.len() == bins)
        .filter_map(|mags| frame_mfcc(mags, &filters))
        .collect();
    if coefficients.is_empty() {
        return (means, stds);
    }

    for k in 0..CEPSTRAL_COEFFICIENTS {
        let column: Vec<f64> = coefficients.iter().map(|c| c[k]).collect();
        means[k] = stats::mean(&column);
        stds[k] = stats::std_dev(&column);
    }
    (means, stds)
}

fn frame_mfcc(magnitudes: &[f64], filters: &[Vec<f64>]) -> Option<[f64; CEPSTRAL_COEFFICIENTS]> {
    let power: Vec<f64> = magnitudes.iter().map(|m| m * m).collect();
    if power.iter().all(|&p| p == 0.0) {
        return None;
    }
    let log_energies: Vec<f64> = filters
        .iter()
        .map(|filter| {
            let energy: f64 = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
            (energy + LOG_FLOOR).ln()
        })
        .collect();
    Some(dct_ii(&log_energies))
}

/// Orthonormal DCT-II, truncated to the cepstral coefficients.
fn dct_ii(input: &[f64]) -> [f64; CEPSTRAL_COEFFICIENTS] {
    let n = input.len() as f64;
    let mut out = [0.0; CEPSTRAL_COEFFICIENTS];
    for (k, slot) in out.iter_mut().enumerate() {
        let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        let sum: f64 = input
            .iter()
            .enumerate()
            .map(|(i, x)| x * (PI * k as f64 * (i as f64 + 0.5) / n).cos())
            .sum();
        *slot = scale * sum;
    }
    out
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular filters evenly spaced on the mel scale from 0 Hz to Nyquist.
fn mel_filterbank(n_mels: usize, bins: usize, bin_hz: f64, sample_rate: u32) -> Vec<Vec<f64>> {
    let mel_max = hz_to_mel(f64::from(sample_rate) / 2.0);
    let edges: Vec<usize> = (0..n_mels + 2)
        .map(|i| {
            let hz = mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64);
            ((hz / bin_hz).floor() as usize).min(bins - 1)
        })
        .collect();

    (0..n_mels)
        .map(|m| {
            let (start, centre, end) = (edges[m], edges[m + 1], edges[m + 2]);
            let mut filter = vec![0.0; bins];
            for j in start..centre {
                filter[j] = (j - start) as f64 / (centre - start) as f64;
            }
            for j in centre..end {
                filter[j] = (end - j) as f64 / (end - centre) as f64;
            }
            if start == centre && centre == end {
                filter[centre] = 1.0;
            }
            filter
        })
        .collect()
}

fn hann(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / len as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{four_kilohertz_square, lcg_noise, sine};

    const FRAMING: Framing = Framing {
        frame_len: 400,
        hop: 160,
    };

    fn spectrogram(samples: &[f32]) -> Spectrogram {
        FftSpectralAnalyzer.magnitude_spectrogram(samples, 16_000, FRAMING)
    }

    #[test]
    fn bins_cover_zero_to_nyquist() {
        let spec = spectrogram(&sine(1_000.0, 16_000, 0.1, 0.5));
        assert_eq!(spec.bin_hz, 16_000.0 / 512.0);
        assert!(spec.frames.iter().all(|f| f.len() == 257));
        assert_eq!(spec.frames.len(), FRAMING.frame_count(1_600));
    }

    #[test]
    fn centroid_and_rolloff_follow_a_tone() {
        let spec = spectrogram(&sine(1_000.0, 16_000, 0.5, 0.5));
        let centroid = spec.mean_centroid();
        assert!((centroid - 1_000.0).abs() < 100.0, "centroid {centroid}");
        let rolloff = spec.mean_rolloff(ROLLOFF_FRACTION);
        assert!(rolloff >= 1_000.0 && rolloff < 1_200.0, "rolloff {rolloff}");
    }

    #[test]
    fn square_at_quarter_rate_centres_on_four_kilohertz() {
        let spec = spectrogram(&four_kilohertz_square(16_000, 0.5));
        let centroid = spec.mean_centroid();
        assert!((centroid - 4_000.0).abs() < 100.0, "centroid {centroid}");
    }

    #[test]
    fn steady_signal_has_little_flux() {
        let steady = spectrogram(&sine(500.0, 16_000, 0.5, 0.5)).mean_flux();
        let noisy = spectrogram(&lcg_noise(8_000, 0.5)).mean_flux();
        assert!(steady < noisy, "steady {steady} vs noise {noisy}");
    }

    #[test]
    fn silence_is_zero_everywhere() {
        let spec = spectrogram(&[0.0; 4_000]);
        assert_eq!(spec.mean_centroid(), 0.0);
        assert_eq!(spec.mean_rolloff(ROLLOFF_FRACTION), 0.0);
        assert_eq!(spec.mean_flux(), 0.0);
        let (means, stds) = cepstral_statistics(&spec, 16_000);
        assert_eq!(means, [0.0; CEPSTRAL_COEFFICIENTS]);
        assert_eq!(stds, [0.0; CEPSTRAL_COEFFICIENTS]);
    }

    #[test]
    fn too_short_for_a_frame() {
        let spec = spectrogram(&[0.1; 100]);
        assert!(spec.is_empty());
        assert_eq!(cepstral_statistics(&spec, 16_000).0, [0.0; CEPSTRAL_COEFFICIENTS]);
    }

    #[test]
    fn cepstra_are_finite_and_steady_for_a_tone() {
        let spec = spectrogram(&sine(300.0, 16_000, 0.5, 0.5));
        let (means, stds) = cepstral_statistics(&spec, 16_000);
        assert!(means.iter().chain(&stds).all(|v| v.is_finite()));
        assert!(means[0] != 0.0);
        assert!(stds[0] < means[0].abs());
    }

    #[test]
    fn dct_of_constant_has_only_dc() {
        let out = dct_ii(&[2.0; 26]);
        assert!((out[0] - 2.0 * 26f64.sqrt()).abs() < 1e-9);
        assert!(out[1..].iter().all(|c| c.abs() < 1e-9));
    }

    #[test]
    fn fft_autocorrelation_matches_direct_sum() {
        let samples = lcg_noise(500, 0.7);
        let fast = FftSpectralAnalyzer.autocorrelation(&samples, 40);
        assert_eq!(fast.len(), 40);
        for (lag, value) in fast.iter().enumerate() {
            let direct: f64 = samples
                .iter()
                .zip(&samples[lag..])
                .map(|(&a, &b)| f64::from(a) * f64::from(b))
                .sum();
            assert!((value - direct).abs() < 1e-6, "lag {lag}: {value} vs {direct}");
        }
    }

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0, 440.0, 4_000.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }
}
