use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Response parsing error: {0}")]
    ParseError(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub parallel_tool_calls: bool,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.8,
            max_tokens: None,
            parallel_tool_calls: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: Option<String>,
}

impl Message {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text("assistant", content)
    }

    /// Assistant turn that requested tool calls instead of answering
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: None,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Result of a tool call, fed back to the model
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Chat-completions wire format
    pub fn to_json(&self) -> Value {
        let mut msg = json!({
            "role": self.role,
            "content": self.content,
        });

        if !self.tool_calls.is_empty() {
            msg["tool_calls"] = self
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments.to_string(),
                        }
                    })
                })
                .collect();
        }

        if let Some(ref id) = self.tool_call_id {
            msg["tool_call_id"] = json!(id);
        }

        msg
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug)]
pub struct LLMResponse {
    pub content: String,
    pub usage: Option<Usage>,
    pub model: String,
    pub finish_reason: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Conversation model used by the session: chat history in, text or tool calls out.
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn complete_with_tools(
        &self,
        messages: Vec<Message>,
        tools: &[Value],
    ) -> Result<LLMResponse, LLMError>;
}

/// Single-shot text generation: one prompt, one answer, no history.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, LLMError>;
}

pub struct OpenAILLM {
    client: Client,
    api_key: String,
    base_url: String,
    config: LLMConfig,
}

impl OpenAILLM {
    pub fn new(api_key: String) -> Result<Self, LLMError> {
        Self::with_config(api_key, LLMConfig::default())
    }

    pub fn with_config(api_key: String, config: LLMConfig) -> Result<Self, LLMError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60)) // LLM calls can be slow
            .build()
            .map_err(|e| LLMError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
            config,
        })
    }

    /// Point the client at an OpenAI-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Chat completion with optional tools
    pub async fn complete_with_tools(
        &self,
        messages: Vec<Message>,
        tools: &[Value],
    ) -> Result<LLMResponse, LLMError> {
        let url = format!("{}/chat/completions", self.base_url);

        let messages_json: Vec<Value> = messages.iter().map(Message::to_json).collect();

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_json,
            "temperature": self.config.temperature,
            "stream": false
        });

        if let Some(max_tokens) = self.config.max_tokens {
            payload["max_completion_tokens"] = json!(max_tokens);
        }

        if !tools.is_empty() {
            payload["tools"] = json!(tools);
            payload["tool_choice"] = json!("auto");
            payload["parallel_tool_calls"] = json!(self.config.parallel_tool_calls);
        }

        let response_text = self.post_json(&url, &payload).await?;
        parse_chat_response(&response_text, &self.config.model)
    }

    /// Text generation through the Responses API
    pub async fn generate(&self, prompt: &str, model: &str) -> Result<String, LLMError> {
        let url = format!("{}/responses", self.base_url);

        let payload = json!({
            "model": model,
            "input": prompt,
        });

        log::debug!("Responses request: model={}, {} prompt chars", model, prompt.len());

        let response_text = self.post_json(&url, &payload).await?;
        parse_output_text(&response_text)
    }

    async fn post_json(&self, url: &str, payload: &Value) -> Result<String, LLMError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LLMError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl LLMClient for OpenAILLM {
    async fn complete_with_tools(
        &self,
        messages: Vec<Message>,
        tools: &[Value],
    ) -> Result<LLMResponse, LLMError> {
        OpenAILLM::complete_with_tools(self, messages, tools).await
    }
}

#[async_trait]
impl TextGenerator for OpenAILLM {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, LLMError> {
        OpenAILLM::generate(self, prompt, model).await
    }
}

/// Parse a chat-completions response body
pub fn parse_chat_response(response_text: &str, default_model: &str) -> Result<LLMResponse, LLMError> {
    let json: Value = serde_json::from_str(response_text)
        .map_err(|e| LLMError::ParseError(format!("Invalid JSON: {}", e)))?;

    let choices = json["choices"]
        .as_array()
        .ok_or_else(|| LLMError::ParseError("Missing 'choices' field".to_string()))?;

    let first_choice = choices
        .first()
        .ok_or_else(|| LLMError::ParseError("Empty choices array".to_string()))?;
    let message = &first_choice["message"];

    // Content is null when tool calls are made
    let content = message["content"].as_str().unwrap_or("").to_string();

    let finish_reason = first_choice["finish_reason"]
        .as_str()
        .map(|s| s.to_string());

    let model = json["model"].as_str().unwrap_or(default_model).to_string();

    let usage = json.get("usage").map(|usage_json| Usage {
        prompt_tokens: usage_json["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: usage_json["completion_tokens"].as_u64().unwrap_or(0) as u32,
        total_tokens: usage_json["total_tokens"].as_u64().unwrap_or(0) as u32,
    });

    let mut tool_calls = Vec::new();
    if let Some(tool_calls_array) = message.get("tool_calls").and_then(|v| v.as_array()) {
        for tool_call_json in tool_calls_array {
            if let (Some(id), Some(name), Some(arguments)) = (
                tool_call_json["id"].as_str(),
                tool_call_json["function"]["name"].as_str(),
                tool_call_json["function"]["arguments"].as_str(),
            ) {
                let arguments: Value = serde_json::from_str(arguments).map_err(|e| {
                    LLMError::ParseError(format!("Invalid tool call arguments: {}", e))
                })?;

                tool_calls.push(ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments,
                });
            }
        }
    }

    Ok(LLMResponse {
        content,
        usage,
        model,
        finish_reason,
        tool_calls,
    })
}

/// Concatenate every `output_text` part of a Responses API body, in order
pub fn parse_output_text(response_text: &str) -> Result<String, LLMError> {
    let json: Value = serde_json::from_str(response_text)
        .map_err(|e| LLMError::ParseError(format!("Invalid JSON: {}", e)))?;

    let output = json["output"]
        .as_array()
        .ok_or_else(|| LLMError::ParseError("Missing 'output' field".to_string()))?;

    let text = output
        .iter()
        .filter(|item| item["type"] == "message")
        .filter_map(|item| item["content"].as_array())
        .flatten()
        .filter(|part| part["type"] == "output_text")
        .filter_map(|part| part["text"].as_str())
        .collect::<String>();

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let system_msg = Message::system("You are a helpful assistant");
        assert_eq!(system_msg.role, "system");
        assert_eq!(system_msg.content.as_deref(), Some("You are a helpful assistant"));

        let tool_msg = Message::tool("call_1", "Open 9-5");
        assert_eq!(tool_msg.role, "tool");
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_tool_call_message_wire_format() {
        let msg = Message::assistant_tool_calls(vec![ToolCall {
            id: "call_1".to_string(),
            name: "lookup_info".to_string(),
            arguments: json!({"query": "hours"}),
        }]);

        let wire = msg.to_json();
        assert_eq!(wire["role"], "assistant");
        assert!(wire["content"].is_null());
        assert_eq!(wire["tool_calls"][0]["type"], "function");
        assert_eq!(wire["tool_calls"][0]["function"]["name"], "lookup_info");
        assert_eq!(
            wire["tool_calls"][0]["function"]["arguments"],
            "{\"query\":\"hours\"}"
        );
    }

    #[test]
    fn test_parse_chat_response_with_tool_call() {
        let body = r#"{
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "lookup_info", "arguments": "{\"query\":\"Do you sell shoes?\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;

        let response = parse_chat_response(body, "gpt-4o-mini").unwrap();
        assert_eq!(response.content, "");
        assert_eq!(response.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "lookup_info");
        assert_eq!(response.tool_calls[0].arguments["query"], "Do you sell shoes?");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_parse_chat_response_empty_choices() {
        let result = parse_chat_response(r#"{"choices": []}"#, "gpt-4o-mini");
        assert!(matches!(result, Err(LLMError::ParseError(_))));
    }

    #[test]
    fn test_parse_output_text_joins_parts() {
        let body = r#"{
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "  We are open "},
                    {"type": "output_text", "text": "9 to 5.\n"}
                ]}
            ]
        }"#;

        let text = parse_output_text(body).unwrap();
        assert_eq!(text, "  We are open 9 to 5.\n");
    }

    #[test]
    fn test_parse_output_text_missing_output() {
        assert!(parse_output_text(r#"{"error": "nope"}"#).is_err());
    }
}
