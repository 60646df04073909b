//! Agent session: binds an [`Agent`] to a room and runs the conversation.
//!
//! A user turn goes into the chat history, the model may call tools for up
//! to `max_tool_steps` rounds, and the final text is spoken and recorded.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::audio::{self, AudioFrame};
use crate::error::{AgentError, Result};
use crate::llm::client::{LLMClient, Message, ToolCall};
use crate::llm::context::ConversationContext;
use crate::llm::tools::{RunContext, ToolError, ToolRegistry};
use crate::room::{Room, RoomInputOptions};
use crate::stt::SpeechToText;
use crate::tts::TextToSpeech;
use crate::turn_detector::{EndpointingConfig, Segmenter, TurnAssembler, TurnDetection};
use crate::vad::{VADConfig, VADFactory};

pub mod speaker;

pub use speaker::{Speaker, SpeechHandle};

/// Tool rounds allowed per reply before the model must answer in text
pub const DEFAULT_MAX_TOOL_STEPS: usize = 3;

/// Something that can speak an utterance to the user
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Resolves once the utterance has been played
    async fn say(&self, text: &str) -> Result<()>;
}

/// Instructions plus the tools the model may call
pub struct Agent {
    instructions: String,
    tools: ToolRegistry,
}

impl Agent {
    pub fn new(instructions: impl Into<String>, tools: ToolRegistry) -> Self {
        Self {
            instructions: instructions.into(),
            tools,
        }
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
}

/// Service clients built once at startup and shared with the session
#[derive(Clone)]
pub struct SessionServices {
    pub llm: Arc<dyn LLMClient>,
    pub stt: Arc<dyn SpeechToText>,
    pub tts: Arc<dyn TextToSpeech>,
    pub vad: VADConfig,
    /// Detector constructor, called once per audio stream
    pub vad_factory: VADFactory,
    pub turn_detection: TurnDetection,
    pub endpointing: EndpointingConfig,
}

struct AudioInput {
    segmenter: Segmenter,
    turns: TurnAssembler,
}

struct Active {
    agent: Agent,
    speaker: Speaker,
    speech: SpeechHandle,
    input_options: RoomInputOptions,
}

pub struct AgentSession {
    services: SessionServices,
    context: ConversationContext,
    active: Option<Active>,
    audio_input: Option<AudioInput>,
    cancel_token: CancellationToken,
    max_tool_steps: usize,
}

impl AgentSession {
    pub fn new(services: SessionServices) -> Self {
        Self {
            services,
            context: ConversationContext::with_defaults(),
            active: None,
            audio_input: None,
            cancel_token: CancellationToken::new(),
            max_tool_steps: DEFAULT_MAX_TOOL_STEPS,
        }
    }

    pub fn with_max_tool_steps(mut self, max_tool_steps: usize) -> Self {
        self.max_tool_steps = max_tool_steps;
        self
    }

    /// Bind `agent` to `room` and start speech playout
    pub async fn start(
        &mut self,
        room: &Room,
        agent: Agent,
        input_options: RoomInputOptions,
    ) -> Result<()> {
        if self.active.is_some() {
            return Err(AgentError::Session("Session already started".to_string()));
        }

        log::info!(
            "🚀 Starting session in room '{}' ({} tools, noise cancellation {}, turn detection {})",
            room.name(),
            agent.tools().len(),
            input_options.noise_cancellation,
            self.services.turn_detection
        );

        self.context.set_system_message(agent.instructions());
        let speaker = Speaker::spawn(
            self.services.tts.clone(),
            room.output(),
            self.cancel_token.child_token(),
        );
        let speech = speaker.handle();

        self.active = Some(Active {
            agent,
            speaker,
            speech,
            input_options,
        });
        Ok(())
    }

    pub fn history(&self) -> Vec<Message> {
        self.context.get_messages()
    }

    /// Typed user input, when the room accepts it
    pub async fn push_text(&mut self, text: &str) -> Result<Option<String>> {
        if !self.active()?.input_options.text_enabled {
            return Err(AgentError::Session("Room text input is disabled".to_string()));
        }
        self.user_turn(text).await
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Speak `text` verbatim and record it as an assistant message
    pub async fn say(&mut self, text: &str) -> Result<()> {
        let speech = self.active()?.speech.clone();
        speech.say(text).await?;
        self.context.add_assistant_message(text);
        Ok(())
    }

    /// Have the model produce a reply guided by `instructions`, without a user turn
    pub async fn generate_reply(&mut self, instructions: &str) -> Result<Option<String>> {
        log::info!("💬 Generating reply: '{}'", instructions);
        self.reply(Some(Message::system(instructions))).await
    }

    /// Answer one finished user turn
    pub async fn user_turn(&mut self, transcript: &str) -> Result<Option<String>> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            log::debug!("Ignoring empty user turn");
            return Ok(None);
        }

        self.active()?;
        log::info!("👤 User: {}", transcript);
        self.context.add_user_message(transcript);
        self.reply(None).await
    }

    /// Feed room audio; every completed user turn is answered before returning
    pub async fn push_audio(&mut self, frame: &AudioFrame) -> Result<Vec<String>> {
        if !self.active()?.input_options.audio_enabled {
            return Err(AgentError::Session("Room audio input is disabled".to_string()));
        }

        let frame = audio::resample(frame, audio::INPUT_SAMPLE_RATE)?;
        let segments = self.audio_input()?.segmenter.push(&frame)?;

        let mut replies = Vec::new();
        for segment in segments {
            let transcript = self.services.stt.transcribe(&segment.audio).await?;
            let turn = self
                .audio_input()?
                .turns
                .push(&transcript.text, segment.start_ms, segment.end_ms);
            if let Some(turn) = turn {
                replies.extend(self.user_turn(&turn).await?);
            }
        }

        // Silence alone can end a held turn
        let input = self.audio_input()?;
        let released = if input.segmenter.in_speech() {
            None
        } else {
            input.turns.poll(input.segmenter.position_ms())
        };
        if let Some(turn) = released {
            replies.extend(self.user_turn(&turn).await?);
        }
        Ok(replies)
    }

    /// End of room audio: close any open utterance and answer what is left
    pub async fn finish_audio(&mut self) -> Result<Vec<String>> {
        let Some(mut input) = self.audio_input.take() else {
            return Ok(Vec::new());
        };

        let mut replies = Vec::new();
        if let Some(segment) = input.segmenter.flush() {
            let transcript = self.services.stt.transcribe(&segment.audio).await?;
            if let Some(turn) = input
                .turns
                .push(&transcript.text, segment.start_ms, segment.end_ms)
            {
                replies.extend(self.user_turn(&turn).await?);
            }
        }
        if let Some(turn) = input.turns.flush() {
            replies.extend(self.user_turn(&turn).await?);
        }
        Ok(replies)
    }

    /// Stop playout and cancel any running tool
    pub async fn shutdown(mut self) {
        self.cancel_token.cancel();
        if let Some(active) = self.active.take() {
            active.speaker.shutdown().await;
        }
        log::info!("👋 Session closed ({})", self.context.summary());
    }

    fn active(&self) -> Result<&Active> {
        self.active
            .as_ref()
            .ok_or_else(|| AgentError::Session("Session has not been started".to_string()))
    }

    fn audio_input(&mut self) -> Result<&mut AudioInput> {
        if self.audio_input.is_none() {
            let vad = (self.services.vad_factory)(self.services.vad.clone())?;
            self.audio_input = Some(AudioInput {
                segmenter: Segmenter::new(
                    vad,
                    self.services.vad.sample_rate,
                    self.services.endpointing.clone(),
                ),
                turns: TurnAssembler::new(self.services.turn_detection, &self.services.endpointing),
            });
        }

        self.audio_input
            .as_mut()
            .ok_or_else(|| AgentError::Session("Audio input unavailable".to_string()))
    }

    /// Run the model until it answers in text, then speak the answer
    async fn reply(&mut self, extra: Option<Message>) -> Result<Option<String>> {
        let text = self.complete(extra).await?;
        let text = text.trim();
        if text.is_empty() {
            log::warn!("⚠️ Model returned no text to speak");
            return Ok(None);
        }

        self.say(text).await?;
        Ok(Some(text.to_string()))
    }

    async fn complete(&mut self, extra: Option<Message>) -> Result<String> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| AgentError::Session("Session has not been started".to_string()))?;
        let run_ctx = RunContext::new(Arc::new(active.speech.clone()))
            .with_cancel_token(self.cancel_token.child_token());
        let tool_definitions = active.agent.tools().get_tool_definitions();

        for step in 0..=self.max_tool_steps {
            let mut messages = self.context.get_messages();
            if let Some(extra) = &extra {
                messages.push(extra.clone());
            }

            // Out of tool rounds: the model has to answer now
            let tools: &[serde_json::Value] = if step < self.max_tool_steps {
                &tool_definitions
            } else {
                &[]
            };

            log::debug!("🤖 LLM step {} with {} messages", step, messages.len());
            let response = tokio::select! {
                result = self.services.llm.complete_with_tools(messages, tools) => result?,
                _ = self.cancel_token.cancelled() => {
                    return Err(AgentError::Session("Reply was cancelled".to_string()));
                }
            };

            if response.tool_calls.is_empty() {
                return Ok(response.content);
            }

            let results =
                execute_tool_calls(active.agent.tools(), &response.tool_calls, &run_ctx).await?;
            self.context.add_tool_exchange(response.tool_calls, results);
        }

        Err(AgentError::Session(format!(
            "No answer after {} tool steps",
            self.max_tool_steps
        )))
    }
}

/// Run each call in order, turning tool failures into text the model can read
async fn execute_tool_calls(
    registry: &ToolRegistry,
    calls: &[ToolCall],
    ctx: &RunContext,
) -> Result<Vec<(String, String)>> {
    let mut results = Vec::with_capacity(calls.len());

    for call in calls {
        log::info!("🔧 Tool call '{}' with args: {}", call.name, call.arguments);

        let text = match registry
            .execute_tool(&call.name, call.arguments.clone(), ctx)
            .await
        {
            Ok(output) => {
                log::info!("🔧 Tool '{}' returned: '{}'", call.name, output.text);
                output.text
            }
            Err(ToolError::Cancelled) => return Err(ToolError::Cancelled.into()),
            Err(e) => {
                log::error!("Tool '{}' failed: {}", call.name, e);
                format!("Error: {}", e)
            }
        };

        results.push((call.id.clone(), text));
    }

    Ok(results)
}
