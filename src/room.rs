//! The media room the agent speaks into.
//!
//! Input options describe how the user's audio is cleaned up before it
//! reaches the session. Agent speech leaves through an [`AudioOutput`].

use async_trait::async_trait;
use livekit_api::access_token::{AccessToken, VideoGrants};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strum::{Display, EnumString};

use crate::audio::{self, AudioFrame};
use crate::config::LiveKitCredentials;
use crate::error::{AgentError, Result};

const TOKEN_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Noise filter applied to room input
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum NoiseCancellation {
    /// Background voice cancellation
    #[strum(serialize = "bvc")]
    BVC,
    #[strum(serialize = "nc")]
    NC,
    /// Background voice cancellation tuned for phone audio
    #[strum(serialize = "bvc-telephony")]
    BVCTelephony,
    #[strum(serialize = "none", serialize = "disabled")]
    Disabled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomInputOptions {
    pub noise_cancellation: NoiseCancellation,
    pub audio_enabled: bool,
    pub text_enabled: bool,
}

impl Default for RoomInputOptions {
    fn default() -> Self {
        Self {
            noise_cancellation: NoiseCancellation::BVC,
            audio_enabled: true,
            text_enabled: true,
        }
    }
}

/// Sink for synthesized agent speech
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Play one utterance; returns once it has been handed off
    async fn play(&self, text: &str, frame: AudioFrame) -> Result<()>;
}

/// Writes each utterance to its own numbered WAV file
pub struct WavFileOutput {
    dir: PathBuf,
    counter: AtomicUsize,
}

impl WavFileOutput {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        log::info!("🔊 Writing agent speech to {}", dir.display());
        Ok(Self {
            dir,
            counter: AtomicUsize::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn utterance_count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioOutput for WavFileOutput {
    async fn play(&self, text: &str, frame: AudioFrame) -> Result<()> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let path = self.dir.join(format!("utterance_{:03}.wav", index));

        let duration_ms = frame.duration_ms();
        let write_path = path.clone();
        tokio::task::spawn_blocking(move || audio::write_wav(&write_path, &frame))
            .await
            .map_err(|e| AgentError::Audio(format!("WAV writer task failed: {}", e)))??;

        log::info!(
            "🔊 '{}' -> {} ({} ms)",
            text,
            path.display(),
            duration_ms
        );
        Ok(())
    }
}

/// A room the session is bound to
pub struct Room {
    name: String,
    output: Option<Arc<dyn AudioOutput>>,
}

impl Room {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: None,
        }
    }

    pub fn with_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&self) -> Option<Arc<dyn AudioOutput>> {
        self.output.clone()
    }
}

/// Sign a LiveKit token letting `identity` join `room` and publish audio
pub fn mint_join_token(
    credentials: &LiveKitCredentials,
    room: &str,
    identity: &str,
    name: &str,
) -> Result<String> {
    AccessToken::with_api_key(&credentials.api_key, credentials.api_secret())
        .with_identity(identity)
        .with_name(name)
        .with_grants(VideoGrants {
            room_join: true,
            room: room.to_string(),
            can_publish: true,
            can_subscribe: true,
            can_publish_data: true,
            ..Default::default()
        })
        .with_ttl(TOKEN_TTL)
        .to_jwt()
        .map_err(|e| AgentError::Room(format!("Failed to sign join token: {}", e)))
}
