use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::embeddings::Embedder;
use super::{RetrievalError, RetrievedDocument, Retriever};

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2025-01";

/// Metadata key holding the document text
const TEXT_KEY: &str = "text";

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

/// Pinecone index queried with embeddings of the question text
pub struct PineconeVectorStore {
    client: Client,
    api_key: String,
    index_host: String,
    embedder: Arc<dyn Embedder>,
}

impl PineconeVectorStore {
    /// Use a known index host
    pub fn new(
        api_key: String,
        index_host: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, RetrievalError> {
        Ok(Self {
            client: build_client()?,
            api_key,
            index_host: normalize_host(index_host),
            embedder,
        })
    }

    /// Resolve the data-plane host of `index_name`, unless one is given
    pub async fn connect(
        api_key: String,
        index_name: &str,
        index_host: Option<&str>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, RetrievalError> {
        let host = match index_host {
            Some(host) => host.to_string(),
            None => describe_index(&build_client()?, &api_key, index_name).await?,
        };

        log::info!("📚 Pinecone index '{}' at {}", index_name, host);
        Self::new(api_key, &host, embedder)
    }
}

#[async_trait]
impl Retriever for PineconeVectorStore {
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        namespace: &str,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let vector = self.embedder.embed_query(query).await?;

        let url = format!("{}/query", self.index_host);
        let payload = json!({
            "vector": vector,
            "topK": k,
            "namespace": namespace,
            "includeMetadata": true,
            "includeValues": false,
        });

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RetrievalError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let body = response.text().await?;
        let mut documents = parse_matches(&body, TEXT_KEY)?;
        documents.truncate(k);

        log::debug!(
            "Pinecone returned {} documents from namespace '{}'",
            documents.len(),
            namespace
        );
        Ok(documents)
    }
}

fn build_client() -> Result<Client, RetrievalError> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| RetrievalError::Config(format!("Failed to create HTTP client: {}", e)))
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

async fn describe_index(
    client: &Client,
    api_key: &str,
    index_name: &str,
) -> Result<String, RetrievalError> {
    let url = format!("{}/indexes/{}", CONTROL_PLANE_URL, index_name);

    let response = client
        .get(&url)
        .header("Api-Key", api_key)
        .header("X-Pinecone-API-Version", API_VERSION)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(RetrievalError::ApiError {
            status: status.as_u16(),
            message: error_text,
        });
    }

    let description: IndexDescription = serde_json::from_str(&response.text().await?)
        .map_err(|e| RetrievalError::ParseError(format!("Invalid index description: {}", e)))?;
    Ok(description.host)
}

/// Turn query matches into documents, keeping Pinecone's order.
///
/// The text is moved out of the metadata into `page_content`. Matches that
/// carry no text are skipped.
fn parse_matches(body: &str, text_key: &str) -> Result<Vec<RetrievedDocument>, RetrievalError> {
    let response: QueryResponse = serde_json::from_str(body)
        .map_err(|e| RetrievalError::ParseError(format!("Invalid query response: {}", e)))?;

    let mut documents = Vec::with_capacity(response.matches.len());
    for m in response.matches {
        let mut metadata = m.metadata.unwrap_or_default();
        match metadata.remove(text_key) {
            Some(Value::String(page_content)) => documents.push(RetrievedDocument {
                page_content,
                metadata,
            }),
            _ => log::warn!(
                "Found match {} without a '{}' metadata field, skipping",
                m.id,
                text_key
            ),
        }
    }

    Ok(documents)
}
