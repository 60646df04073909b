use thiserror::Error;

use crate::config::ConfigError;
use crate::llm::client::LLMError;
use crate::llm::tools::ToolError;
use crate::retrieval::RetrievalError;
use crate::stt::STTError;
use crate::tts::TTSError;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    LLM(#[from] LLMError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("STT error: {0}")]
    STT(#[from] STTError),

    #[error("TTS error: {0}")]
    TTS(#[from] TTSError),

    #[error("VAD error: {0}")]
    VAD(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Room error: {0}")]
    Room(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hound::Error> for AgentError {
    fn from(err: hound::Error) -> Self {
        AgentError::Audio(err.to_string())
    }
}
