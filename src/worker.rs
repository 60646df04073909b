//! Runs an entrypoint against a room and feeds it user input.
//!
//! Media transport is stood in for by the console: typed lines or a WAV
//! recording go in as user input, agent speech comes out as WAV files.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::audio;
use crate::error::{AgentError, Result};
use crate::room::{Room, WavFileOutput};
use crate::session::AgentSession;

/// Audio is pushed to the session in blocks of this length
const AUDIO_BLOCK_MS: u32 = 100;

/// Agent startup callback, invoked once per job
#[async_trait]
pub trait Entrypoint: Send + Sync {
    /// Connect to the room and return the started session
    async fn run(&self, ctx: &mut JobContext) -> Result<AgentSession>;
}

/// Where user input comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    /// One user turn per line on stdin
    Text,
    /// A recording, segmented into turns by VAD
    Wav(PathBuf),
}

pub struct WorkerOptions {
    pub entrypoint: Arc<dyn Entrypoint>,
    pub room_name: String,
    /// Directory for synthesized speech; none means text only
    pub output_dir: Option<PathBuf>,
}

/// Per-job handle given to the entrypoint
pub struct JobContext {
    room_name: String,
    output_dir: Option<PathBuf>,
    room: Option<Room>,
}

impl JobContext {
    pub fn new(room_name: impl Into<String>) -> Self {
        Self {
            room_name: room_name.into(),
            output_dir: None,
            room: None,
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    /// Create the console room, setting up speech output on first call
    pub fn connect(&mut self) -> Result<&Room> {
        if self.room.is_none() {
            let mut room = Room::new(self.room_name.clone());
            if let Some(dir) = &self.output_dir {
                room = room.with_output(Arc::new(WavFileOutput::new(dir)?));
            }

            log::info!("🔗 Room '{}' ready", self.room_name);
            self.room = Some(room);
        }

        self.room
            .as_ref()
            .ok_or_else(|| AgentError::Room("Room unavailable".to_string()))
    }
}

/// Run one job to completion
pub async fn run_app(options: WorkerOptions, input: ConsoleInput) -> Result<()> {
    let mut ctx = JobContext::new(options.room_name);
    if let Some(dir) = options.output_dir {
        ctx = ctx.with_output_dir(dir);
    }

    let mut session = options.entrypoint.run(&mut ctx).await?;

    let result = match input {
        ConsoleInput::Text => run_text(&mut session).await,
        ConsoleInput::Wav(path) => run_wav(&mut session, path).await,
    };

    session.shutdown().await;
    result
}

async fn run_text(session: &mut AgentSession) -> Result<()> {
    println!("💬 Type a question and press Enter. Ctrl+D to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match session.push_text(line).await {
            Ok(Some(reply)) => println!("🤖 {}", reply),
            Ok(None) => {}
            Err(e) => log::error!("❌ Turn failed: {}", e),
        }
    }

    Ok(())
}

async fn run_wav(session: &mut AgentSession, path: PathBuf) -> Result<()> {
    let recording = tokio::task::spawn_blocking(move || audio::read_wav(path))
        .await
        .map_err(|e| AgentError::Audio(format!("WAV reader task failed: {}", e)))??;
    let recording = audio::resample(&recording, audio::INPUT_SAMPLE_RATE)?;

    log::info!(
        "📼 Playing {} ms recording into the session",
        recording.duration_ms()
    );

    let block = (recording.sample_rate * AUDIO_BLOCK_MS / 1000).max(1) as usize;
    for samples in recording.samples.chunks(block) {
        let frame = audio::AudioFrame::new(samples.to_vec(), recording.sample_rate);
        for reply in session.push_audio(&frame).await? {
            println!("🤖 {}", reply);
        }
    }

    for reply in session.finish_audio().await? {
        println!("🤖 {}", reply);
    }
    Ok(())
}
