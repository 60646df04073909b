//! In-memory stand-ins for the external services.
//!
//! Every fake appends to a shared [`EventLog`] so tests can assert the order
//! in which collaborators were called.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use speech_assistant::audio::{AudioFrame, OUTPUT_SAMPLE_RATE};
use speech_assistant::error::{AgentError, Result as AgentResult};
use speech_assistant::llm::client::{LLMClient, LLMError, LLMResponse, Message, TextGenerator, ToolCall};
use speech_assistant::retrieval::{RetrievalError, RetrievedDocument, Retriever};
use speech_assistant::room::AudioOutput;
use speech_assistant::session::SpeechOutput;
use speech_assistant::stt::{STTError, STTResponse, SpeechToText};
use speech_assistant::tts::{TTSError, TextToSpeech};
use speech_assistant::vad::{VADConfig, VAD};

#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub struct RecordingSpeech {
    pub log: EventLog,
    pub fail: bool,
}

impl RecordingSpeech {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            fail: false,
        }
    }

    pub fn failing(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            fail: true,
        }
    }
}

#[async_trait]
impl SpeechOutput for RecordingSpeech {
    async fn say(&self, text: &str) -> AgentResult<()> {
        self.log.push(format!("say:{}", text));
        if self.fail {
            return Err(AgentError::Session("speaker unplugged".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchCall {
    pub query: String,
    pub k: usize,
    pub namespace: String,
}

pub struct FakeRetriever {
    pub log: EventLog,
    pub docs: Vec<RetrievedDocument>,
    pub fail: bool,
    pub calls: Mutex<Vec<SearchCall>>,
}

impl FakeRetriever {
    pub fn new(log: &EventLog, texts: &[&str]) -> Self {
        Self {
            log: log.clone(),
            docs: texts.iter().map(|t| RetrievedDocument::new(*t)).collect(),
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(log: &EventLog) -> Self {
        Self {
            fail: true,
            ..Self::new(log, &[])
        }
    }

    pub fn calls(&self) -> Vec<SearchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        namespace: &str,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        self.log.push(format!("retrieve:{}", query));
        self.calls.lock().unwrap().push(SearchCall {
            query: query.to_string(),
            k,
            namespace: namespace.to_string(),
        });

        if self.fail {
            return Err(RetrievalError::ApiError {
                status: 503,
                message: "index unavailable".to_string(),
            });
        }
        Ok(self.docs.iter().take(k).cloned().collect())
    }
}

pub struct FakeGenerator {
    pub log: EventLog,
    pub answer: String,
    pub fail: bool,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl FakeGenerator {
    pub fn new(log: &EventLog, answer: &str) -> Self {
        Self {
            log: log.clone(),
            answer: answer.to_string(),
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(log: &EventLog) -> Self {
        Self {
            fail: true,
            ..Self::new(log, "")
        }
    }

    /// (prompt, model) of every call
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, LLMError> {
        self.log.push("generate");
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), model.to_string()));

        if self.fail {
            return Err(LLMError::ApiError {
                status: 429,
                message: "rate limited".to_string(),
            });
        }
        Ok(self.answer.clone())
    }
}

/// Chat model that replays canned responses and records what it was sent
pub struct ScriptedLLM {
    responses: Mutex<VecDeque<LLMResponse>>,
    pub requests: Mutex<Vec<(Vec<Message>, usize)>>,
}

impl ScriptedLLM {
    pub fn new(responses: Vec<LLMResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// (messages, number of tools offered) of every call
    pub fn requests(&self) -> Vec<(Vec<Message>, usize)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMClient for ScriptedLLM {
    async fn complete_with_tools(
        &self,
        messages: Vec<Message>,
        tools: &[Value],
    ) -> Result<LLMResponse, LLMError> {
        self.requests.lock().unwrap().push((messages, tools.len()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LLMError::ParseError("script exhausted".to_string()))
    }
}

pub fn text_response(content: &str) -> LLMResponse {
    LLMResponse {
        content: content.to_string(),
        usage: None,
        model: "gpt-4o-mini".to_string(),
        finish_reason: Some("stop".to_string()),
        tool_calls: Vec::new(),
    }
}

pub fn tool_response(id: &str, name: &str, arguments: Value) -> LLMResponse {
    LLMResponse {
        content: String::new(),
        usage: None,
        model: "gpt-4o-mini".to_string(),
        finish_reason: Some("tool_calls".to_string()),
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }],
    }
}

/// Ten samples of silence per character
pub struct FakeTTS;

#[async_trait]
impl TextToSpeech for FakeTTS {
    async fn synthesize(&self, text: &str) -> Result<AudioFrame, TTSError> {
        Ok(AudioFrame::new(vec![0; text.len() * 10], OUTPUT_SAMPLE_RATE))
    }
}

pub struct FakeSTT;

#[async_trait]
impl SpeechToText for FakeSTT {
    async fn transcribe(&self, _audio: &AudioFrame) -> Result<STTResponse, STTError> {
        Ok(STTResponse {
            text: String::new(),
            confidence: 0.0,
            request_id: None,
        })
    }
}

/// Returns queued transcripts in order, then empty text
pub struct ScriptedSTT {
    transcripts: Mutex<VecDeque<String>>,
    pub heard_ms: Mutex<Vec<u64>>,
}

impl ScriptedSTT {
    pub fn new(transcripts: &[&str]) -> Self {
        Self {
            transcripts: Mutex::new(transcripts.iter().map(|t| t.to_string()).collect()),
            heard_ms: Mutex::new(Vec::new()),
        }
    }

    /// Duration of every utterance sent for transcription
    pub fn heard_ms(&self) -> Vec<u64> {
        self.heard_ms.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechToText for ScriptedSTT {
    async fn transcribe(&self, audio: &AudioFrame) -> Result<STTResponse, STTError> {
        self.heard_ms.lock().unwrap().push(audio.duration_ms());
        Ok(STTResponse {
            text: self.transcripts.lock().unwrap().pop_front().unwrap_or_default(),
            confidence: 0.99,
            request_id: None,
        })
    }
}

/// Speech whenever a chunk's peak is loud
pub struct LoudnessVAD;

impl VAD for LoudnessVAD {
    fn speech_probability(&mut self, chunk: &[i16]) -> AgentResult<f32> {
        let peak = chunk.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        Ok(if peak > 1000 { 0.9 } else { 0.1 })
    }

    fn threshold(&self) -> f32 {
        0.5
    }

    fn chunk_size(&self) -> usize {
        512
    }

    fn reset(&mut self) {}
}

pub fn loudness_vad(_config: VADConfig) -> AgentResult<Box<dyn VAD + Send>> {
    Ok(Box::new(LoudnessVAD))
}

/// `millis` of 16kHz audio, loud or silent
pub fn speech_audio(loud: bool, millis: usize) -> AudioFrame {
    let value = if loud { 5000 } else { 0 };
    AudioFrame::new(vec![value; 16 * millis], 16_000)
}

/// Collects the text of every played utterance
#[derive(Default)]
pub struct RecordingOutput {
    pub played: Mutex<Vec<(String, usize)>>,
}

impl RecordingOutput {
    pub fn texts(&self) -> Vec<String> {
        self.played
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }
}

#[async_trait]
impl AudioOutput for RecordingOutput {
    async fn play(&self, text: &str, frame: AudioFrame) -> AgentResult<()> {
        self.played
            .lock()
            .unwrap()
            .push((text.to_string(), frame.samples.len()));
        Ok(())
    }
}
