use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::audio::AudioFrame;

const DEEPGRAM_LISTEN_URL: &str = "https://api.deepgram.com/v1/listen";

#[derive(Error, Debug)]
pub enum STTError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Audio format error: {0}")]
    AudioFormat(String),
    #[error("Response parsing error: {0}")]
    ParseError(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Clone)]
pub struct STTConfig {
    pub model: String,
    pub language: String,
    pub punctuate: bool,
    pub smart_format: bool,
    pub server_timeout: Duration,
}

impl Default for STTConfig {
    fn default() -> Self {
        Self {
            model: "nova-3".to_string(),
            language: "en-US".to_string(),
            punctuate: true,
            smart_format: true,
            server_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct STTResponse {
    pub text: String,
    pub confidence: f32,
    pub request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    #[serde(default)]
    metadata: Option<ListenMetadata>,
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenMetadata {
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    transcript: String,
    #[serde(default)]
    confidence: f32,
}

/// Transcribes one finished utterance
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &AudioFrame) -> Result<STTResponse, STTError>;
}

/// Deepgram prerecorded transcription of raw 16-bit PCM
pub struct DeepgramSTT {
    client: Client,
    api_key: String,
    base_url: String,
    config: STTConfig,
}

impl DeepgramSTT {
    pub fn new(api_key: String) -> Result<Self, STTError> {
        Self::with_config(api_key, STTConfig::default())
    }

    pub fn with_config(api_key: String, config: STTConfig) -> Result<Self, STTError> {
        let client = Client::builder()
            .timeout(config.server_timeout)
            .build()
            .map_err(|e| STTError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEEPGRAM_LISTEN_URL.to_string(),
            config,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn listen_url(&self, sample_rate: u32) -> Result<Url, STTError> {
        let mut url = Url::parse(&self.base_url)?;
        url.query_pairs_mut()
            .append_pair("model", &self.config.model)
            .append_pair("language", &self.config.language)
            .append_pair("punctuate", &self.config.punctuate.to_string())
            .append_pair("smart_format", &self.config.smart_format.to_string())
            .append_pair("encoding", "linear16")
            .append_pair("sample_rate", &sample_rate.to_string())
            .append_pair("channels", "1");
        Ok(url)
    }
}

#[async_trait]
impl SpeechToText for DeepgramSTT {
    async fn transcribe(&self, audio: &AudioFrame) -> Result<STTResponse, STTError> {
        if audio.is_empty() {
            return Err(STTError::AudioFormat("No audio to transcribe".to_string()));
        }

        let url = self.listen_url(audio.sample_rate)?;
        log::debug!(
            "🎙️ Sending {} ms of audio to Deepgram ({})",
            audio.duration_ms(),
            self.config.model
        );

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/raw")
            .body(audio.to_le_bytes())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(STTError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let body = response.text().await?;
        let transcript = parse_transcript(&body)?;
        log::info!("🎙️ Transcript: '{}'", transcript.text);
        Ok(transcript)
    }
}

/// Best alternative of the first channel
fn parse_transcript(body: &str) -> Result<STTResponse, STTError> {
    let parsed: ListenResponse = serde_json::from_str(body)
        .map_err(|e| STTError::ParseError(format!("Invalid listen response: {}", e)))?;

    let alternative = parsed
        .results
        .channels
        .into_iter()
        .next()
        .and_then(|channel| channel.alternatives.into_iter().next())
        .ok_or_else(|| STTError::ParseError("No transcript alternatives".to_string()))?;

    Ok(STTResponse {
        text: alternative.transcript.trim().to_string(),
        confidence: alternative.confidence,
        request_id: parsed.metadata.and_then(|m| m.request_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_url() {
        let stt = DeepgramSTT::new("test-key".to_string()).unwrap();
        let url = stt.listen_url(16_000).unwrap();
        let query = url.query().unwrap();

        assert!(url.as_str().starts_with("https://api.deepgram.com/v1/listen?"));
        assert!(query.contains("model=nova-3"));
        assert!(query.contains("language=en-US"));
        assert!(query.contains("encoding=linear16"));
        assert!(query.contains("sample_rate=16000"));
    }

    #[test]
    fn test_parse_transcript() {
        let body = r#"{
            "metadata": {"request_id": "req-1", "duration": 1.2},
            "results": {"channels": [{"alternatives": [
                {"transcript": " What are your business hours? ", "confidence": 0.98}
            ]}]}
        }"#;

        let response = parse_transcript(body).unwrap();
        assert_eq!(response.text, "What are your business hours?");
        assert_eq!(response.request_id.as_deref(), Some("req-1"));
        assert!((response.confidence - 0.98).abs() < 1e-6);
    }

    #[test]
    fn test_parse_transcript_without_channels() {
        let body = r#"{"results": {"channels": []}}"#;
        assert!(matches!(parse_transcript(body), Err(STTError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_empty_audio_is_rejected() {
        let stt = DeepgramSTT::new("test-key".to_string()).unwrap();
        let result = stt.transcribe(&AudioFrame::new(Vec::new(), 16_000)).await;
        assert!(matches!(result, Err(STTError::AudioFormat(_))));
    }
}
