//! End-of-turn detection.
//!
//! [`Segmenter`] cuts a 16kHz stream into utterances on VAD silence.
//! [`TurnAssembler`] then decides, per [`TurnDetection`] mode, whether a
//! transcribed utterance finishes the user's turn or waits for more speech.

use crate::audio::AudioFrame;
use crate::error::{AgentError, Result};
use crate::vad::VAD;
use strum::{Display, EnumString};

/// How the end of a user turn is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum TurnDetection {
    /// Language-aware: an utterance that doesn't end a sentence waits for more
    #[strum(serialize = "english", serialize = "multilingual")]
    English,
    /// Every VAD segment is a turn
    #[strum(serialize = "vad")]
    Vad,
    /// Every transcript is a turn
    #[strum(serialize = "stt")]
    Stt,
}

#[derive(Debug, Clone)]
pub struct EndpointingConfig {
    /// Silence that closes an utterance
    pub min_endpointing_delay_ms: u64,
    /// Longest an unfinished sentence is held before the turn is forced
    pub max_endpointing_delay_ms: u64,
    /// Utterances shorter than this are dropped as noise
    pub min_speech_ms: u64,
    /// Utterances are cut at this length
    pub max_utterance_ms: u64,
}

impl Default for EndpointingConfig {
    fn default() -> Self {
        Self {
            min_endpointing_delay_ms: 500,
            max_endpointing_delay_ms: 6000,
            min_speech_ms: 100,
            max_utterance_ms: 30_000,
        }
    }
}

/// One utterance with its position in the stream
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSegment {
    pub audio: AudioFrame,
    pub start_ms: u64,
    pub end_ms: u64,
}

pub struct Segmenter {
    vad: Box<dyn VAD + Send>,
    config: EndpointingConfig,
    sample_rate: u32,
    pending: Vec<i16>,
    current: Option<Vec<i16>>,
    start_sample: usize,
    processed_samples: usize,
    speech_samples: usize,
    silence_samples: usize,
}

impl Segmenter {
    pub fn new(vad: Box<dyn VAD + Send>, sample_rate: u32, config: EndpointingConfig) -> Self {
        Self {
            vad,
            config,
            sample_rate,
            pending: Vec::new(),
            current: None,
            start_sample: 0,
            processed_samples: 0,
            speech_samples: 0,
            silence_samples: 0,
        }
    }

    pub fn in_speech(&self) -> bool {
        self.current.is_some()
    }

    /// Stream time consumed by the VAD so far
    pub fn position_ms(&self) -> u64 {
        self.samples_to_ms(self.processed_samples)
    }

    /// Feed audio, returning every utterance it completes
    pub fn push(&mut self, frame: &AudioFrame) -> Result<Vec<SpeechSegment>> {
        if frame.sample_rate != self.sample_rate {
            return Err(AgentError::VAD(format!(
                "Segmenter expects {} Hz audio, got {} Hz",
                self.sample_rate, frame.sample_rate
            )));
        }

        self.pending.extend_from_slice(&frame.samples);
        let chunk_size = self.vad.chunk_size();
        let mut segments = Vec::new();

        while self.pending.len() >= chunk_size {
            let chunk: Vec<i16> = self.pending.drain(..chunk_size).collect();
            let is_speech = self.vad.is_speech(&chunk)?;
            if let Some(segment) = self.process_chunk(chunk, is_speech) {
                segments.push(segment);
            }
        }

        Ok(segments)
    }

    /// Close the utterance in progress at the end of the stream
    pub fn flush(&mut self) -> Option<SpeechSegment> {
        let tail = std::mem::take(&mut self.pending);
        if let Some(current) = self.current.as_mut() {
            current.extend_from_slice(&tail);
        }
        self.processed_samples += tail.len();
        let segment = self.finish();
        self.vad.reset();
        segment
    }

    fn process_chunk(&mut self, chunk: Vec<i16>, is_speech: bool) -> Option<SpeechSegment> {
        let len = chunk.len();
        let chunk_start = self.processed_samples;
        self.processed_samples += len;

        let Some(current) = self.current.as_mut() else {
            if is_speech {
                log::debug!("🎤 Speech started at {} ms", self.samples_to_ms(chunk_start));
                self.start_sample = chunk_start;
                self.speech_samples = len;
                self.silence_samples = 0;
                self.current = Some(chunk);
            }
            return None;
        };

        current.extend_from_slice(&chunk);
        if is_speech {
            self.speech_samples += len;
            self.silence_samples = 0;
        } else {
            self.silence_samples += len;
        }

        let silence_ms = self.samples_to_ms(self.silence_samples);
        let length_ms = self.samples_to_ms(self.processed_samples - self.start_sample);
        if silence_ms >= self.config.min_endpointing_delay_ms
            || length_ms >= self.config.max_utterance_ms
        {
            self.finish()
        } else {
            None
        }
    }

    fn finish(&mut self) -> Option<SpeechSegment> {
        let samples = self.current.take()?;
        let speech_ms = self.samples_to_ms(self.speech_samples);
        let start_ms = self.samples_to_ms(self.start_sample);
        let end_ms = self.samples_to_ms(self.processed_samples - self.silence_samples);
        self.speech_samples = 0;
        self.silence_samples = 0;

        if speech_ms < self.config.min_speech_ms {
            log::debug!("Dropping {} ms of speech as noise", speech_ms);
            return None;
        }

        log::debug!("🎤 Speech segment {}-{} ms", start_ms, end_ms);
        Some(SpeechSegment {
            audio: AudioFrame::new(samples, self.sample_rate),
            start_ms,
            end_ms,
        })
    }

    fn samples_to_ms(&self, samples: usize) -> u64 {
        samples as u64 * 1000 / self.sample_rate as u64
    }
}

/// Joins transcribed utterances into user turns
pub struct TurnAssembler {
    mode: TurnDetection,
    max_delay_ms: u64,
    held: Option<(String, u64)>,
}

impl TurnAssembler {
    pub fn new(mode: TurnDetection, config: &EndpointingConfig) -> Self {
        Self {
            mode,
            max_delay_ms: config.max_endpointing_delay_ms,
            held: None,
        }
    }

    /// Offer a transcript ending at `end_ms`; returns the turn if it is complete
    pub fn push(&mut self, transcript: &str, start_ms: u64, end_ms: u64) -> Option<String> {
        let transcript = transcript.trim();

        let text = match self.held.take() {
            // Too long since the held fragment; let it stand on its own
            Some((held, held_end)) if start_ms.saturating_sub(held_end) > self.max_delay_ms => {
                self.held = if transcript.is_empty() {
                    None
                } else {
                    Some((transcript.to_string(), end_ms))
                };
                return Some(held);
            }
            Some((held, _)) if transcript.is_empty() => held,
            Some((held, _)) => format!("{} {}", held, transcript),
            None if transcript.is_empty() => return None,
            None => transcript.to_string(),
        };

        if self.mode == TurnDetection::English && !ends_sentence(&text) {
            log::debug!("Holding unfinished turn: '{}'", text);
            self.held = Some((text, end_ms));
            return None;
        }

        Some(text)
    }

    /// Release held text once `now_ms` is past the endpointing deadline
    pub fn poll(&mut self, now_ms: u64) -> Option<String> {
        match &self.held {
            Some((_, held_end)) if now_ms.saturating_sub(*held_end) >= self.max_delay_ms => {
                let (text, _) = self.held.take()?;
                log::debug!("Releasing unfinished turn after {} ms: '{}'", self.max_delay_ms, text);
                Some(text)
            }
            _ => None,
        }
    }

    /// Release any held text at the end of input
    pub fn flush(&mut self) -> Option<String> {
        self.held.take().map(|(text, _)| text)
    }
}

fn ends_sentence(text: &str) -> bool {
    text.trim_end()
        .ends_with(|c: char| matches!(c, '.' | '?' | '!' | '…'))
}
