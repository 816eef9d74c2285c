use anyhow::{Context, Result, anyhow};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;
use std::path::Path;
use std::time::Duration;

/// Decoded PCM audio: interleaved f32 samples in [-1.0, 1.0] plus the
/// format needed to interpret them.
#[derive(Clone)]
pub struct Recording {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl Recording {
    /// Decode a WAV file into normalized f32 samples.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
        let spec = reader.spec();
        debug!(
            "Decoding {}: {}Hz, {} channels, {}-bit {:?}",
            path.display(),
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format
        );

        let samples = decode_samples(reader, &spec)?;
        debug!("Decoded {} samples", samples.len());

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels as usize,
        })
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Interleaved samples covering `[start, end)`, clamped to the recording.
    pub fn slice(&self, start: Duration, end: Duration) -> &[f32] {
        let first = self.frame_at(start).min(self.frames());
        let last = self.frame_at(end).min(self.frames()).max(first);
        &self.samples[first * self.channels..last * self.channels]
    }

    fn frame_at(&self, at: Duration) -> usize {
        (at.as_secs_f64() * self.sample_rate as f64).round() as usize
    }
}

fn decode_samples(
    reader: WavReader<std::io::BufReader<std::fs::File>>,
    spec: &WavSpec,
) -> Result<Vec<f32>> {
    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read 32-bit float samples"),
        (SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read 16-bit samples"),
        (SampleFormat::Int, 24) => reader
            .into_samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388607.0))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read 24-bit samples"),
        (SampleFormat::Int, 32) => reader
            .into_samples::<i32>()
            .map(|s| s.map(|v| v as f32 / i32::MAX as f32))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read 32-bit samples"),
        (format, bits) => Err(anyhow!("Unsupported WAV format: {}-bit {:?}", bits, format)),
    }
}

/// Write interleaved f32 samples as a 32-bit float WAV.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32, channels: usize) -> Result<()> {
    let spec = WavSpec {
        channels: channels as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer
        .finalize()
        .with_context(|| format!("Failed to finalize WAV file: {}", path.display()))?;

    debug!("Wrote {} samples to {}", samples.len(), path.display());
    Ok(())
}
