use anyhow::{bail, Context};
use std::path::Path;

#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Reads a WAV file and mixes all channels down to mono. Integer samples are
/// scaled to `[-1, 1)`.
pub fn read_wav(path: &Path) -> anyhow::Result<DecodedAudio> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open wav file {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        bail!("{} declares zero channels", path.display());
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .with_context(|| format!("failed to decode {}", path.display()))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .with_context(|| format!("failed to decode {}", path.display()))?
        }
    };

    Ok(DecodedAudio {
        samples: mix_to_mono(&interleaved, usize::from(spec.channels)),
        sample_rate: spec.sample_rate,
    })
}

/// Reads headerless little-endian f32 mono samples.
pub fn read_raw_f32(path: &Path, sample_rate: u32) -> anyhow::Result<DecodedAudio> {
    let raw = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let samples = parse_f32le_mono(&raw).with_context(|| format!("invalid raw input {}", path.display()))?;
    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

pub fn parse_f32le_mono(raw: &[u8]) -> anyhow::Result<Vec<f32>> {
    if raw.len() % 4 != 0 {
        bail!("f32le byte length must be a multiple of 4, got {}", raw.len());
    }
    Ok(raw
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn mix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
