use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::audio::{AudioFrame, OUTPUT_SAMPLE_RATE};
use crate::llm::client::OPENAI_BASE_URL;

#[derive(Error, Debug)]
pub enum TTSError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Audio processing error: {0}")]
    AudioProcessing(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Clone)]
pub struct TTSConfig {
    pub model: String,
    pub voice: String,
    /// Style guidance for the voice
    pub instructions: Option<String>,
    pub speed: f32,
}

impl Default for TTSConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini-tts".to_string(),
            voice: "ash".to_string(),
            instructions: Some("You are a friendly voice assistant.".to_string()),
            speed: 1.0,
        }
    }
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize `text` into mono PCM
    async fn synthesize(&self, text: &str) -> Result<AudioFrame, TTSError>;
}

/// OpenAI speech endpoint, asked for raw 24kHz 16-bit PCM
pub struct OpenAITTS {
    client: Client,
    api_key: String,
    base_url: String,
    config: TTSConfig,
}

impl OpenAITTS {
    pub fn new(api_key: String) -> Result<Self, TTSError> {
        Self::with_config(api_key, TTSConfig::default())
    }

    pub fn with_config(api_key: String, config: TTSConfig) -> Result<Self, TTSError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TTSError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
            config,
        })
    }

    pub fn config(&self) -> &TTSConfig {
        &self.config
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.config.speed = speed.clamp(0.25, 4.0);
    }

    fn payload(&self, text: &str) -> serde_json::Value {
        let mut payload = json!({
            "model": self.config.model,
            "voice": self.config.voice,
            "input": text,
            "response_format": "pcm",
            "speed": self.config.speed,
        });
        if let Some(instructions) = &self.config.instructions {
            payload["instructions"] = json!(instructions);
        }
        payload
    }
}

#[async_trait]
impl TextToSpeech for OpenAITTS {
    async fn synthesize(&self, text: &str) -> Result<AudioFrame, TTSError> {
        if text.trim().is_empty() {
            return Ok(AudioFrame::new(Vec::new(), OUTPUT_SAMPLE_RATE));
        }

        let url = format!("{}/audio/speech", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.payload(text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TTSError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.len() % 2 != 0 {
            return Err(TTSError::AudioProcessing(format!(
                "PCM payload has odd length {}",
                bytes.len()
            )));
        }

        let frame = AudioFrame::from_le_bytes(&bytes, OUTPUT_SAMPLE_RATE);
        log::debug!("🗣️ Synthesized {} ms for {} chars", frame.duration_ms(), text.len());
        Ok(frame)
    }
}
