pub mod assistant;
pub mod audio;
pub mod config;
pub mod error;
pub mod llm;
pub mod retrieval;
pub mod room;
pub mod session;
pub mod stt;
pub mod tts;
pub mod turn_detector;
pub mod vad;
pub mod worker;

pub use error::{AgentError, Result};
