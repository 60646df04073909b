//! Voice Activity Detection (VAD) Module
//!
//! Silero VAD through the `voice_activity_detector` crate. Audio is fed at
//! 16kHz in fixed chunks of 512, 768 or 1024 samples.

use crate::error::Result;

pub mod silero;
pub use silero::SileroVAD;

/// Chunk sizes supported by Silero VAD at 16kHz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSize {
    /// 512 samples (32ms at 16kHz)
    Small,
    /// 768 samples (48ms at 16kHz)
    Medium,
    /// 1024 samples (64ms at 16kHz)
    Large,
}

impl ChunkSize {
    pub fn samples(&self) -> usize {
        match self {
            ChunkSize::Small => 512,
            ChunkSize::Medium => 768,
            ChunkSize::Large => 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VADConfig {
    pub sample_rate: u32,
    pub chunk_size: ChunkSize,
    /// Speech probability threshold (0.0-1.0)
    pub threshold: f32,
}

impl Default for VADConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::audio::INPUT_SAMPLE_RATE,
            chunk_size: ChunkSize::Small,
            threshold: 0.5,
        }
    }
}

impl VADConfig {
    pub fn chunk_duration_ms(&self) -> u64 {
        self.chunk_size.samples() as u64 * 1000 / self.sample_rate as u64
    }
}

pub trait VAD: Send {
    /// Speech probability of one chunk of `chunk_size()` samples
    fn speech_probability(&mut self, chunk: &[i16]) -> Result<f32>;

    fn threshold(&self) -> f32;

    fn chunk_size(&self) -> usize;

    /// Forget everything heard so far
    fn reset(&mut self);

    fn is_speech(&mut self, chunk: &[i16]) -> Result<bool> {
        let threshold = self.threshold();
        Ok(self.speech_probability(chunk)? >= threshold)
    }
}

/// Builds a detector for one audio stream
pub type VADFactory = fn(VADConfig) -> Result<Box<dyn VAD + Send>>;

pub fn create_vad(config: VADConfig) -> Result<Box<dyn VAD + Send>> {
    let vad = SileroVAD::new(config)?;
    Ok(Box::new(vad))
}
