//! Mono PCM frames, WAV file I/O and resampling.

use crate::error::{AgentError, Result};
use rubato::{FftFixedIn, Resampler};
use std::path::Path;

/// Sample rate the VAD and STT work at
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of the synthesized speech
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

const RESAMPLER_CHUNK: usize = 1024;

/// A block of mono 16-bit PCM
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Frame from raw little-endian s16 bytes
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(samples, sample_rate)
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }
}

/// Read a WAV file, downmixing to mono 16-bit
pub fn read_wav(path: impl AsRef<Path>) -> Result<AudioFrame> {
    let mut reader = hound::WavReader::open(path.as_ref())?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let samples = interleaved
        .chunks(channels)
        .map(|frame| to_i16(frame.iter().sum::<f32>() / frame.len() as f32))
        .collect();

    log::debug!(
        "Read {} ({} Hz, {} channels, {} bits)",
        path.as_ref().display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    Ok(AudioFrame::new(samples, spec.sample_rate))
}

/// Write a frame as a mono 16-bit WAV file
pub fn write_wav(path: impl AsRef<Path>, frame: &AudioFrame) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: frame.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path.as_ref(), spec)?;
    for &sample in &frame.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Resample a frame to `target_rate`
pub fn resample(frame: &AudioFrame, target_rate: u32) -> Result<AudioFrame> {
    if frame.sample_rate == target_rate || frame.is_empty() {
        return Ok(AudioFrame::new(frame.samples.clone(), target_rate));
    }

    let mut resampler = FftFixedIn::<f32>::new(
        frame.sample_rate as usize,
        target_rate as usize,
        RESAMPLER_CHUNK,
        2,
        1,
    )
    .map_err(|e| AgentError::Audio(format!("Failed to create resampler: {}", e)))?;

    let input: Vec<f32> = frame.samples.iter().map(|&s| s as f32 / 32768.0).collect();
    let expected = (input.len() as u64 * target_rate as u64 / frame.sample_rate as u64) as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<f32> = Vec::with_capacity(expected + delay);

    let mut chunks = input.chunks_exact(RESAMPLER_CHUNK);
    for chunk in &mut chunks {
        let out = resampler
            .process(&[chunk], None)
            .map_err(|e| AgentError::Audio(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&out[0]);
    }

    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let out = resampler
            .process_partial(Some(&[remainder]), None)
            .map_err(|e| AgentError::Audio(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&out[0]);
    }

    // Flush until the delayed tail is out
    while output.len() < expected + delay {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| AgentError::Audio(format!("Resampling failed: {}", e)))?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    let samples = output
        .into_iter()
        .skip(delay)
        .take(expected)
        .map(to_i16)
        .collect();

    Ok(AudioFrame::new(samples, target_rate))
}

fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
