use crate::error::{AgentError, Result};
use crate::vad::{VADConfig, VAD};
use voice_activity_detector::VoiceActivityDetector;

pub struct SileroVAD {
    detector: VoiceActivityDetector,
    config: VADConfig,
    chunks: usize,
}

impl SileroVAD {
    pub fn new(config: VADConfig) -> Result<Self> {
        let detector = build_detector(&config)?;

        log::info!(
            "🎤 Silero VAD initialized (sample_rate: {}Hz, chunk_size: {} samples, threshold: {:.2})",
            config.sample_rate,
            config.chunk_size.samples(),
            config.threshold
        );

        Ok(Self {
            detector,
            config,
            chunks: 0,
        })
    }
}

fn build_detector(config: &VADConfig) -> Result<VoiceActivityDetector> {
    VoiceActivityDetector::builder()
        .sample_rate(config.sample_rate as i64)
        .chunk_size(config.chunk_size.samples())
        .build()
        .map_err(|e| AgentError::VAD(format!("Failed to create Silero VAD: {}", e)))
}

impl VAD for SileroVAD {
    fn speech_probability(&mut self, chunk: &[i16]) -> Result<f32> {
        if chunk.len() != self.config.chunk_size.samples() {
            return Err(AgentError::VAD(format!(
                "Expected {} samples, got {}",
                self.config.chunk_size.samples(),
                chunk.len()
            )));
        }

        self.chunks += 1;
        let probability = self.detector.predict(chunk.iter().copied());

        if self.chunks % 50 == 0 {
            log::debug!(
                "Silero VAD: {} chunks processed, last probability {:.2}",
                self.chunks,
                probability
            );
        }

        Ok(probability)
    }

    fn threshold(&self) -> f32 {
        self.config.threshold
    }

    fn chunk_size(&self) -> usize {
        self.config.chunk_size.samples()
    }

    fn reset(&mut self) {
        // The detector has no reset of its own
        match build_detector(&self.config) {
            Ok(detector) => {
                self.detector = detector;
                self.chunks = 0;
                log::debug!("🔄 Silero VAD: state reset");
            }
            Err(e) => log::error!("Failed to reset Silero VAD: {}", e),
        }
    }
}
