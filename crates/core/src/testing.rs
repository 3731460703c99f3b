//! Synthetic signals shared by the unit tests.

use std::f64::consts::PI;

fn sample_count(sample_rate: u32, seconds: f64) -> usize {
    (f64::from(sample_rate) * seconds).round() as usize
}

pub fn sine(freq: f64, sample_rate: u32, seconds: f64, amplitude: f32) -> Vec<f32> {
    let sr = f64::from(sample_rate);
    (0..sample_count(sample_rate, seconds))
        .map(|i| amplitude * (2.0 * PI * freq * i as f64 / sr).sin() as f32)
        .collect()
}

/// Back-to-back segments alternating between two tones. Each segment starts
/// at phase zero.
pub fn alternating_tones(
    freq_a: f64,
    amp_a: f32,
    freq_b: f64,
    amp_b: f32,
    segment_seconds: f64,
    total_seconds: f64,
    sample_rate: u32,
) -> Vec<f32> {
    let total = sample_count(sample_rate, total_seconds);
    let segment = sample_count(sample_rate, segment_seconds).max(1);
    let mut out = Vec::with_capacity(total);
    let mut index = 0;
    while out.len() < total {
        let (freq, amp) = if index % 2 == 0 {
            (freq_a, amp_a)
        } else {
            (freq_b, amp_b)
        };
        let take = segment.min(total - out.len());
        out.extend(
            sine(freq, sample_rate, segment_seconds, amp)
                .into_iter()
                .chain(std::iter::repeat(0.0))
                .take(take),
        );
        index += 1;
    }
    out
}

/// Full-scale square wave at a quarter of the sample rate (`+1 +1 -1 -1`).
pub fn four_kilohertz_square(sample_rate: u32, seconds: f64) -> Vec<f32> {
    (0..sample_count(sample_rate, seconds))
        .map(|i| if i % 4 < 2 { 1.0 } else { -1.0 })
        .collect()
}

/// Deterministic uniform noise in `[-amplitude, amplitude)`.
pub fn lcg_noise(len: usize, amplitude: f32) -> Vec<f32> {
    let mut seed = 12345u32;
    (0..len)
        .map(|_| {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            ((seed >> 16) as f32 / 32768.0 - 1.0) * amplitude
        })
        .collect()
}
