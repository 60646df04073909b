//! The knowledge-base voice assistant.
//!
//! Wires the concrete service clients together, defines the agent with its
//! single `lookup_info` tool, and greets the user once the session starts.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ApiConfig;
use crate::error::Result;
use crate::llm::client::{LLMConfig, OpenAILLM, TextGenerator};
use crate::llm::prompts::{ConversationTemplates, SystemPrompts};
use crate::llm::tools::lookup_info::LookupInfoTool;
use crate::llm::tools::ToolRegistry;
use crate::retrieval::{OpenAIEmbeddings, PineconeVectorStore, Retriever};
use crate::room::{NoiseCancellation, RoomInputOptions};
use crate::session::{Agent, AgentSession, SessionServices};
use crate::stt::{DeepgramSTT, STTConfig};
use crate::tts::{OpenAITTS, TTSConfig};
use crate::turn_detector::EndpointingConfig;
use crate::vad::{self, VADConfig};
use crate::worker::{Entrypoint, JobContext};

pub struct Assistant {
    services: SessionServices,
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn TextGenerator>,
    namespace: String,
    generation_model: String,
    noise_cancellation: NoiseCancellation,
}

impl Assistant {
    pub fn new(
        services: SessionServices,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn TextGenerator>,
        namespace: impl Into<String>,
        generation_model: impl Into<String>,
    ) -> Self {
        Self {
            services,
            retriever,
            generator,
            namespace: namespace.into(),
            generation_model: generation_model.into(),
            noise_cancellation: NoiseCancellation::BVC,
        }
    }

    pub fn with_noise_cancellation(mut self, noise_cancellation: NoiseCancellation) -> Self {
        self.noise_cancellation = noise_cancellation;
        self
    }

    /// Build every service client from configuration
    pub async fn from_config(config: &ApiConfig) -> Result<Self> {
        let services = &config.services;

        let llm = Arc::new(OpenAILLM::with_config(
            config.openai_key().to_string(),
            LLMConfig {
                model: services.llm_model.clone(),
                ..Default::default()
            },
        )?);
        log::info!("🤖 LLM initialized ({})", llm.model());

        let stt = DeepgramSTT::with_config(
            config.deepgram_key().to_string(),
            STTConfig {
                model: services.stt_model.clone(),
                language: services.stt_language.clone(),
                ..Default::default()
            },
        )?;
        log::info!("🎙️ STT initialized ({})", services.stt_model);

        let tts = OpenAITTS::with_config(
            config.openai_key().to_string(),
            TTSConfig {
                model: services.tts_model.clone(),
                voice: services.tts_voice.clone(),
                instructions: Some(services.tts_instructions.clone()),
                ..Default::default()
            },
        )?;
        log::info!("🔊 TTS initialized ({}, voice {})", services.tts_model, services.tts_voice);

        let embeddings = OpenAIEmbeddings::new(
            config.openai_key().to_string(),
            services.embedding_model.clone(),
        )?;
        let store = PineconeVectorStore::connect(
            config.pinecone_key().to_string(),
            &services.index_name,
            services.index_host.as_deref(),
            Arc::new(embeddings),
        )
        .await?;

        let session_services = SessionServices {
            llm: llm.clone(),
            stt: Arc::new(stt),
            tts: Arc::new(tts),
            vad: VADConfig::default(),
            vad_factory: vad::create_vad,
            turn_detection: services.turn_detection,
            endpointing: EndpointingConfig::default(),
        };

        Ok(Self::new(
            session_services,
            Arc::new(store),
            llm,
            services.namespace.clone(),
            services.generation_model.clone(),
        )
        .with_noise_cancellation(services.noise_cancellation))
    }

    /// The agent definition: instructions plus the lookup tool
    pub fn agent(&self) -> Agent {
        let mut tools = ToolRegistry::new();
        tools.register_tool(
            LookupInfoTool::descriptor(),
            Arc::new(LookupInfoTool::new(
                self.retriever.clone(),
                self.generator.clone(),
                self.namespace.clone(),
                self.generation_model.clone(),
            )),
        );

        Agent::new(SystemPrompts::voice_assistant(), tools)
    }
}

#[async_trait]
impl Entrypoint for Assistant {
    async fn run(&self, ctx: &mut JobContext) -> Result<AgentSession> {
        let room = ctx.connect()?;

        let mut session = AgentSession::new(self.services.clone());
        session
            .start(
                room,
                self.agent(),
                RoomInputOptions {
                    noise_cancellation: self.noise_cancellation,
                    ..Default::default()
                },
            )
            .await?;

        session
            .generate_reply(ConversationTemplates::greeting())
            .await?;
        Ok(session)
    }
}
