//! Acoustic feature extraction.
//!
//! A buffer is cut into overlapping frames (25 ms / 10 ms hop by default) and
//! reduced to a fixed [`AcousticFeatureSet`]:
//!
//! - **Pitch** - per-frame F0 inside the configured band, statistics over
//!   pitched frames only
//! - **Energy** - per-frame RMS, a speaking-rate proxy, pause and voiced ratios
//! - **Spectral** - centroid, rolloff and flux of the magnitude spectrogram
//! - **Cepstral** - 13 MFCC means and standard deviations
//! - **Voice quality** - jitter, shimmer and HNR
//!
//! Extraction is total: anything that cannot be computed from a short or
//! unvoiced buffer is reported as 0.

mod energy;
mod pitch;
mod spectral;
mod voice_quality;

use crate::config::{ms_to_samples, EngineConfig};
use crate::util::stats::{self, finite_or_zero};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use energy::{frame_rms, zero_crossing_rate, EnergyProfile, VOICED_ZCR_THRESHOLD};
pub use pitch::{AutocorrelationPitchExtractor, McLeodPitchExtractor, PitchExtractor};
pub use spectral::{FftSpectralAnalyzer, SpectralAnalyzer, Spectrogram, CEPSTRAL_COEFFICIENTS};
pub use voice_quality::{harmonics_to_noise_ratio, jitter, shimmer};

const LOG_TARGET: &str = "features";

/// Upper bound on the number of pitch values kept in the contour sample.
pub const MAX_CONTOUR_POINTS: usize = 100;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AcousticFeatureSet {
    pub pitch_mean: f64,
    pub pitch_std: f64,
    pub pitch_range: f64,
    pub pitch_contour: Vec<f64>,
    pub energy_mean: f64,
    pub energy_std: f64,
    pub energy_range: f64,
    pub speaking_rate: f64,
    pub pause_ratio: f64,
    pub voiced_ratio: f64,
    pub spectral_centroid: f64,
    pub spectral_rolloff: f64,
    pub spectral_flux: f64,
    pub mfcc_mean: [f64; CEPSTRAL_COEFFICIENTS],
    pub mfcc_std: [f64; CEPSTRAL_COEFFICIENTS],
    pub jitter: f64,
    pub shimmer: f64,
    pub hnr: f64,
}

impl AcousticFeatureSet {
    /// Every scalar in the set, contour and cepstral arrays included.
    pub fn scalars(&self) -> impl Iterator<Item = f64> + '_ {
        [
            self.pitch_mean,
            self.pitch_std,
            self.pitch_range,
            self.energy_mean,
            self.energy_std,
            self.energy_range,
            self.speaking_rate,
            self.pause_ratio,
            self.voiced_ratio,
            self.spectral_centroid,
            self.spectral_rolloff,
            self.spectral_flux,
            self.jitter,
            self.shimmer,
            self.hnr,
        ]
        .into_iter()
        .chain(self.pitch_contour.iter().copied())
        .chain(self.mfcc_mean.iter().copied())
        .chain(self.mfcc_std.iter().copied())
    }
}

/// Frame grid over a buffer. Only full frames are produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Framing {
    pub frame_len: usize,
    pub hop: usize,
}

impl Framing {
    pub fn new(frame_len: usize, hop: usize) -> Self {
        Self {
            frame_len: frame_len.max(1),
            hop: hop.max(1),
        }
    }

    pub fn frame_count(&self, len: usize) -> usize {
        if len < self.frame_len {
            0
        } else {
            1 + (len - self.frame_len) / self.hop
        }
    }

    pub fn frames<'a>(&self, samples: &'a [f32]) -> impl Iterator<Item = &'a [f32]> + 'a {
        let Framing { frame_len, hop } = *self;
        (0..self.frame_count(samples.len())).map(move |i| &samples[i * hop..i * hop + frame_len])
    }
}

/// Inclusive F0 search band in Hz.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PitchBand {
    pub min_hz: f64,
    pub max_hz: f64,
}

impl PitchBand {
    /// Autocorrelation lag range `(min_lag, max_lag)` covering the band.
    pub fn lag_range(&self, sample_rate: u32) -> (usize, usize) {
        let sr = f64::from(sample_rate);
        let min_lag = ((sr / self.max_hz).floor() as usize).max(2);
        let max_lag = (sr / self.min_hz).ceil() as usize;
        (min_lag, max_lag)
    }
}

#[derive(Clone)]
pub struct FeatureExtractor {
    frame_length_ms: f64,
    frame_shift_ms: f64,
    band: PitchBand,
    pitch: Arc<dyn PitchExtractor>,
    spectral: Arc<dyn SpectralAnalyzer>,
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("frame_length_ms", &self.frame_length_ms)
            .field("frame_shift_ms", &self.frame_shift_ms)
            .field("band", &self.band)
            .finish_non_exhaustive()
    }
}

impl FeatureExtractor {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_backends(
            config,
            Arc::new(AutocorrelationPitchExtractor::default()),
            Arc::new(FftSpectralAnalyzer),
        )
    }

    pub fn with_backends(
        config: &EngineConfig,
        pitch: Arc<dyn PitchExtractor>,
        spectral: Arc<dyn SpectralAnalyzer>,
    ) -> Self {
        Self {
            frame_length_ms: config.frame_length_ms,
            frame_shift_ms: config.frame_shift_ms,
            band: PitchBand {
                min_hz: config.pitch_min_hz,
                max_hz: config.pitch_max_hz,
            },
            pitch,
            spectral,
        }
    }

    pub fn framing(&self, sample_rate: u32) -> Framing {
        Framing::new(
            ms_to_samples(self.frame_length_ms, sample_rate),
            ms_to_samples(self.frame_shift_ms, sample_rate),
        )
    }

    /// Computes the feature set of an (already normalized) buffer.
    pub fn extract(&self, samples: &[f32], sample_rate: u32) -> AcousticFeatureSet {
        if samples.is_empty() || sample_rate == 0 {
            return AcousticFeatureSet::default();
        }
        let framing = self.framing(sample_rate);

        let pitches: Vec<f64> = self
            .pitch
            .track(samples, sample_rate, framing, self.band)
            .into_iter()
            .flatten()
            .filter(|f| f.is_finite() && *f > 0.0)
            .collect();

        let energy = EnergyProfile::compute(samples, sample_rate, framing);

        let spectrogram = self
            .spectral
            .magnitude_spectrogram(samples, sample_rate, framing);
        let (mfcc_mean, mfcc_std) = spectral::cepstral_statistics(&spectrogram, sample_rate);

        let (_, max_lag) = self.band.lag_range(sample_rate);
        let autocorr = self.spectral.autocorrelation(samples, max_lag + 1);

        let features = AcousticFeatureSet {
            pitch_mean: finite_or_zero(stats::mean(&pitches)),
            pitch_std: finite_or_zero(stats::std_dev(&pitches)),
            pitch_range: finite_or_zero(stats::range(&pitches)),
            pitch_contour: contour_sample(&pitches),
            energy_mean: finite_or_zero(energy.mean),
            energy_std: finite_or_zero(energy.std),
            energy_range: finite_or_zero(energy.range),
            speaking_rate: finite_or_zero(energy.speaking_rate),
            pause_ratio: finite_or_zero(energy.pause_ratio),
            voiced_ratio: finite_or_zero(energy.voiced_ratio),
            spectral_centroid: finite_or_zero(spectrogram.mean_centroid()),
            spectral_rolloff: finite_or_zero(spectrogram.mean_rolloff(spectral::ROLLOFF_FRACTION)),
            spectral_flux: finite_or_zero(spectrogram.mean_flux()),
            mfcc_mean: mfcc_mean.map(finite_or_zero),
            mfcc_std: mfcc_std.map(finite_or_zero),
            jitter: finite_or_zero(jitter(&pitches)),
            shimmer: finite_or_zero(shimmer(samples, sample_rate, self.band)),
            hnr: finite_or_zero(harmonics_to_noise_ratio(&autocorr, sample_rate, self.band)),
        };

        tracing::debug!(
            target: LOG_TARGET,
            samples = samples.len(),
            frames = framing.frame_count(samples.len()),
            pitched_frames = pitches.len(),
            pitch_mean = features.pitch_mean,
            energy_mean = features.energy_mean,
            jitter = features.jitter,
            hnr = features.hnr,
            "features extracted"
        );

        features
    }
}

fn contour_sample(pitches: &[f64]) -> Vec<f64> {
    if pitches.len() <= MAX_CONTOUR_POINTS {
        return pitches.to_vec();
    }
    (0..MAX_CONTOUR_POINTS)
        .map(|i| pitches[i * pitches.len() / MAX_CONTOUR_POINTS])
        .collect()
}
