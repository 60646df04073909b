use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::llm::client::LLMError;
use crate::retrieval::RetrievalError;
use crate::session::SpeechOutput;

pub mod lookup_info;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),
    #[error("Invalid tool parameters: {0}")]
    InvalidParameters(String),
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
    #[error("Generation failed: {0}")]
    Generation(#[from] LLMError),
    #[error("Speech failed: {0}")]
    Speech(String),
    #[error("Tool execution was cancelled")]
    Cancelled,
}

/// Result of a tool call.
///
/// `structured` is reserved by the tool-calling protocol for a typed
/// payload. Only `text` is relayed to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub structured: Option<Value>,
    pub text: String,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            structured: None,
            text: text.into(),
        }
    }
}

/// Name, description and JSON-schema parameters advertised to the model
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDescriptor {
    /// Function definition in the chat-completions `tools` format
    pub fn definition(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters
            }
        })
    }

    /// Check required parameters are present and string-typed ones are strings
    fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        let required = self.parameters["required"]
            .as_array()
            .map(|names| names.iter().filter_map(|n| n.as_str()).collect::<Vec<_>>())
            .unwrap_or_default();

        for name in required {
            let value = arguments.get(name).ok_or_else(|| {
                ToolError::InvalidParameters(format!("Missing required '{}' parameter", name))
            })?;

            if self.parameters["properties"][name]["type"] == "string" && !value.is_string() {
                return Err(ToolError::InvalidParameters(format!(
                    "Parameter '{}' must be a string",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Handles to the running session that a tool may use while it executes
#[derive(Clone)]
pub struct RunContext {
    pub speech: Arc<dyn SpeechOutput>,
    pub cancel_token: CancellationToken,
}

impl RunContext {
    pub fn new(speech: Arc<dyn SpeechOutput>) -> Self {
        Self {
            speech,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: &RunContext, arguments: Value) -> Result<ToolOutput, ToolError>;
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool, replacing any earlier tool of the same name
    pub fn register_tool(&mut self, descriptor: ToolDescriptor, handler: Arc<dyn ToolHandler>) {
        log::debug!("🔧 Registering tool '{}'", descriptor.name);
        self.tools.retain(|tool| tool.descriptor.name != descriptor.name);
        self.tools.push(RegisteredTool {
            descriptor,
            handler,
        });
    }

    pub fn get_tools(&self) -> Vec<&ToolDescriptor> {
        self.tools.iter().map(|tool| &tool.descriptor).collect()
    }

    pub fn find_tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools
            .iter()
            .find(|tool| tool.descriptor.name == name)
            .map(|tool| &tool.descriptor)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name
    pub async fn execute_tool(
        &self,
        name: &str,
        arguments: Value,
        ctx: &RunContext,
    ) -> Result<ToolOutput, ToolError> {
        // Check if already cancelled before starting
        if ctx.cancel_token.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        let tool = self
            .tools
            .iter()
            .find(|tool| tool.descriptor.name == name)
            .ok_or_else(|| ToolError::NotFound(format!("Tool '{}' not found", name)))?;

        tool.descriptor.validate(&arguments)?;

        log::info!("🔧 Executing tool '{}'", name);
        tool.handler.call(ctx, arguments).await
    }

    /// Tool definitions for LLM function calling
    pub fn get_tool_definitions(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|tool| tool.descriptor.definition())
            .collect()
    }
}
