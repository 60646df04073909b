//! Vector retrieval.
//!
//! The similarity metric, embedding model and ranking belong to the
//! external vector store. This module only fixes the request shape
//! (query, top-k, namespace) and the document record that comes back.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod embeddings;
pub mod pinecone;

pub use embeddings::OpenAIEmbeddings;
pub use pinecone::PineconeVectorStore;

/// Number of documents requested per lookup
pub const TOP_K: usize = 3;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Response parsing error: {0}")]
    ParseError(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A stored chunk of text returned by a similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocument {
    pub page_content: String,
    pub metadata: Map<String, Value>,
}

impl RetrievedDocument {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Map::new(),
        }
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` documents most similar to `query`, most similar first
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        namespace: &str,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError>;
}
