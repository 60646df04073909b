use secrecy::{ExposeSecret, SecretBox};
use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::room::NoiseCancellation;
use crate::turn_detector::TurnDetection;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid API key format for {service}: {reason}")]
    InvalidKeyFormat { service: String, reason: String },
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
    #[error("Environment error: {0}")]
    EnvError(#[from] env::VarError),
}

/// Service selections and model identifiers.
///
/// Every field has a default matching the stock assistant and can be
/// overridden through the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub llm_model: String,
    pub generation_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub tts_instructions: String,
    pub stt_model: String,
    pub stt_language: String,
    pub embedding_model: String,
    pub index_name: String,
    pub namespace: String,
    pub index_host: Option<String>,
    pub noise_cancellation: NoiseCancellation,
    pub turn_detection: TurnDetection,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            llm_model: "gpt-4o-mini".to_string(),
            generation_model: "gpt-4o-mini".to_string(),
            tts_model: "gpt-4o-mini-tts".to_string(),
            tts_voice: "ash".to_string(),
            tts_instructions: "You are a friendly voice assistant.".to_string(),
            stt_model: "nova-3".to_string(),
            stt_language: "en-US".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            index_name: "your-index-name".to_string(),
            namespace: "your-namespace".to_string(),
            index_host: None,
            noise_cancellation: NoiseCancellation::BVC,
            turn_detection: TurnDetection::English,
        }
    }
}

impl ServiceConfig {
    /// Read overrides from the environment on top of the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            llm_model: env_or("LLM_MODEL", defaults.llm_model),
            generation_model: env_or("GENERATION_MODEL", defaults.generation_model),
            tts_model: env_or("TTS_MODEL", defaults.tts_model),
            tts_voice: env_or("TTS_VOICE", defaults.tts_voice),
            tts_instructions: env_or("TTS_INSTRUCTIONS", defaults.tts_instructions),
            stt_model: env_or("STT_MODEL", defaults.stt_model),
            stt_language: env_or("STT_LANGUAGE", defaults.stt_language),
            embedding_model: env_or("EMBEDDING_MODEL", defaults.embedding_model),
            index_name: env_or("PINECONE_INDEX_NAME", defaults.index_name),
            namespace: env_or("PINECONE_NAMESPACE", defaults.namespace),
            index_host: env::var("PINECONE_INDEX_HOST")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            noise_cancellation: parse_env("NOISE_CANCELLATION", defaults.noise_cancellation)?,
            turn_detection: parse_env("TURN_DETECTION", defaults.turn_detection)?,
        })
    }
}

/// LiveKit server credentials, only needed to mint room join tokens
#[derive(Debug)]
pub struct LiveKitCredentials {
    pub url: String,
    pub api_key: String,
    pub api_secret: SecretBox<String>,
}

impl LiveKitCredentials {
    pub fn api_secret(&self) -> &str {
        self.api_secret.expose_secret()
    }
}

/// Configuration for API services
#[derive(Debug)]
pub struct ApiConfig {
    pub openai_key: SecretBox<String>,
    pub deepgram_key: SecretBox<String>,
    pub pinecone_key: SecretBox<String>,
    pub services: ServiceConfig,
}

impl ApiConfig {
    /// Load API configuration from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (for development)
        dotenvy::dotenv().ok();

        let openai_key = Self::load_api_key("OPENAI_API_KEY", "OpenAI")?;
        let deepgram_key = Self::load_api_key("DEEPGRAM_API_KEY", "Deepgram")?;
        let pinecone_key = Self::load_api_key("PINECONE_API_KEY", "Pinecone")?;
        let services = ServiceConfig::from_env()?;

        Ok(Self {
            openai_key,
            deepgram_key,
            pinecone_key,
            services,
        })
    }

    /// Load and validate a single API key from environment
    fn load_api_key(env_var: &str, service_name: &str) -> Result<SecretBox<String>, ConfigError> {
        let key = env::var(env_var).map_err(|_| ConfigError::MissingEnvVar(env_var.to_string()))?;

        if key.trim().is_empty() {
            return Err(ConfigError::InvalidKeyFormat {
                service: service_name.to_string(),
                reason: "API key cannot be empty".to_string(),
            });
        }

        Self::validate_key_format(&key, service_name)?;

        Ok(SecretBox::new(Box::new(key)))
    }

    /// LiveKit credentials, when all three variables are set
    pub fn load_livekit() -> Option<LiveKitCredentials> {
        let url = env::var("LIVEKIT_URL").ok()?;
        let api_key = env::var("LIVEKIT_API_KEY").ok()?;
        let api_secret = env::var("LIVEKIT_API_SECRET").ok()?;

        Some(LiveKitCredentials {
            url,
            api_key,
            api_secret: SecretBox::new(Box::new(api_secret)),
        })
    }

    /// Validate API key format for each service
    fn validate_key_format(key: &str, service: &str) -> Result<(), ConfigError> {
        match service {
            "OpenAI" => {
                if !key.starts_with("sk-") {
                    return Err(ConfigError::InvalidKeyFormat {
                        service: service.to_string(),
                        reason: "OpenAI keys should start with 'sk-'".to_string(),
                    });
                }
            }
            "Deepgram" => {
                if key.len() < 20 {
                    return Err(ConfigError::InvalidKeyFormat {
                        service: service.to_string(),
                        reason: "Deepgram keys should be at least 20 characters".to_string(),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Get OpenAI API key (use only when making API calls)
    pub fn openai_key(&self) -> &str {
        self.openai_key.expose_secret()
    }

    /// Get Deepgram API key (use only when making API calls)
    pub fn deepgram_key(&self) -> &str {
        self.deepgram_key.expose_secret()
    }

    /// Get Pinecone API key (use only when making API calls)
    pub fn pinecone_key(&self) -> &str {
        self.pinecone_key.expose_secret()
    }
}

/// Load configuration with helpful error messages for development
pub fn load_config() -> Result<ApiConfig, ConfigError> {
    match ApiConfig::load() {
        Ok(config) => {
            log::info!("Successfully loaded API configuration");
            log::info!(
                "Index '{}' namespace '{}', LLM '{}'",
                config.services.index_name,
                config.services.namespace,
                config.services.llm_model
            );
            Ok(config)
        }
        Err(ConfigError::MissingEnvVar(var)) => {
            log::error!("Missing required environment variable: {}", var);
            log::error!("Create a .env file in the project root with:");
            log::error!("{}=your_api_key_here", var);
            Err(ConfigError::MissingEnvVar(var))
        }
        Err(e) => {
            log::error!("Configuration error: {}", e);
            Err(e)
        }
    }
}

fn env_or(var: &str, default: String) -> String {
    env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

fn parse_env<T: FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => {
            T::from_str(value.trim()).map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value,
            })
        }
        _ => Ok(default),
    }
}
