//! Speech playout queue.
//!
//! Utterances are synthesized and played strictly in the order they were
//! queued. [`SpeechHandle::say`] resolves once its own utterance has played.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::SpeechOutput;
use crate::error::{AgentError, Result};
use crate::room::AudioOutput;
use crate::tts::TextToSpeech;

struct SpeechRequest {
    text: String,
    done: oneshot::Sender<Result<()>>,
}

#[derive(Clone)]
pub struct SpeechHandle {
    tx: mpsc::UnboundedSender<SpeechRequest>,
}

#[async_trait]
impl SpeechOutput for SpeechHandle {
    async fn say(&self, text: &str) -> Result<()> {
        let (done, done_rx) = oneshot::channel();
        self.tx
            .send(SpeechRequest {
                text: text.to_string(),
                done,
            })
            .map_err(|_| AgentError::Session("Speech queue is closed".to_string()))?;

        done_rx
            .await
            .map_err(|_| AgentError::Session("Speech was cancelled before playout".to_string()))?
    }
}

pub struct Speaker {
    handle: SpeechHandle,
    task: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl Speaker {
    /// Start the playout task. Without an output, utterances are only logged.
    pub fn spawn(
        tts: Arc<dyn TextToSpeech>,
        output: Option<Arc<dyn AudioOutput>>,
        cancel_token: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(playout_loop(rx, tts, output, cancel_token.clone()));

        Self {
            handle: SpeechHandle { tx },
            task,
            cancel_token,
        }
    }

    pub fn handle(&self) -> SpeechHandle {
        self.handle.clone()
    }

    /// Stop playout; anything still queued is dropped
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        drop(self.handle);
        if let Err(e) = self.task.await {
            log::error!("Speech playout task failed: {}", e);
        }
    }
}

async fn playout_loop(
    mut rx: mpsc::UnboundedReceiver<SpeechRequest>,
    tts: Arc<dyn TextToSpeech>,
    output: Option<Arc<dyn AudioOutput>>,
    cancel_token: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
            _ = cancel_token.cancelled() => break,
        };

        log::info!("🗣️ Agent: {}", request.text);

        let result = match &output {
            Some(output) => play(tts.as_ref(), output.as_ref(), &request.text).await,
            None => Ok(()),
        };

        if let Err(e) = &result {
            log::error!("Failed to play '{}': {}", request.text, e);
        }

        // The caller may have stopped waiting
        let _ = request.done.send(result);
    }

    log::debug!("Speech playout stopped");
}

async fn play(tts: &dyn TextToSpeech, output: &dyn AudioOutput, text: &str) -> Result<()> {
    let frame = tts.synthesize(text).await?;
    output.play(text, frame).await
}
