//! Knowledge-base lookup tool.
//!
//! Speaks a short acknowledgement, pulls the top documents for the query
//! from the vector store and asks the model for an answer grounded in them.
//! With no documents the model is never called.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{RunContext, ToolDescriptor, ToolError, ToolHandler, ToolOutput};
use crate::llm::client::TextGenerator;
use crate::llm::prompts::ConversationTemplates;
use crate::retrieval::{RetrievedDocument, Retriever, TOP_K};

pub const NAME: &str = "lookup_info";

pub struct LookupInfoTool {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn TextGenerator>,
    namespace: String,
    model: String,
}

impl LookupInfoTool {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn TextGenerator>,
        namespace: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            retriever,
            generator,
            namespace: namespace.into(),
            model: model.into(),
        }
    }

    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: NAME.to_string(),
            description: "Search the knowledge base for information that answers the user's question.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The user's question"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    /// Answer `query`, speaking the acknowledgement through `ctx` first
    pub async fn lookup(&self, ctx: &RunContext, query: &str) -> Result<ToolOutput, ToolError> {
        // Spoken before retrieval, whatever the outcome
        ctx.speech
            .say(ConversationTemplates::lookup_acknowledgement())
            .await
            .map_err(|e| ToolError::Speech(e.to_string()))?;

        let docs = self
            .retriever
            .similarity_search(query, TOP_K, &self.namespace)
            .await?;

        if docs.is_empty() {
            log::info!("📭 No documents for '{}'", query);
            return Ok(ToolOutput::text(ConversationTemplates::no_answer()));
        }

        log::info!("📚 Retrieved {} documents for '{}'", docs.len(), query);

        let context = grounding_context(&docs);
        let prompt = ConversationTemplates::grounded_answer(&context, query);
        let answer = self.generator.generate(&prompt, &self.model).await?;

        Ok(ToolOutput::text(answer.trim()))
    }
}

#[async_trait]
impl ToolHandler for LookupInfoTool {
    async fn call(&self, ctx: &RunContext, arguments: Value) -> Result<ToolOutput, ToolError> {
        let query = arguments
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ToolError::InvalidParameters("Missing required 'query' parameter".to_string())
            })?;

        self.lookup(ctx, query).await
    }
}

/// Document texts joined by newlines, in retrieval order
pub fn grounding_context(docs: &[RetrievedDocument]) -> String {
    docs.iter()
        .map(|d| d.page_content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
