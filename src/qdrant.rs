//! Qdrant REST client for storing and searching memories.
//!
//! [`QdrantConnector`] turns text into vectors with the shared [`EmbeddingProvider`] and
//! talks to Qdrant over HTTP. Collections are created on first write with a single named
//! dense vector whose name and size come from the provider.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::QdrantConfig;
use crate::embedding::EmbeddingProvider;

/// A single memory: free text plus optional JSON metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Qdrant wraps every response body in `{"result": ..., "status": ..., "time": ...}`.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionList {
    collections: Vec<CollectionName>,
}

#[derive(Debug, Deserialize)]
struct CollectionName {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Exists {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    points: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    document: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

pub struct QdrantConnector {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    default_collection: Option<String>,
    embedding: Arc<dyn EmbeddingProvider>,
}

impl QdrantConnector {
    pub fn new(config: &QdrantConfig, embedding: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .context("QDRANT_URL must be set")?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            default_collection: config.collection_name.clone(),
            embedding,
        })
    }

    pub fn default_collection(&self) -> Option<&str> {
        self.default_collection.as_deref()
    }

    /// Pick the explicit collection, falling back to the configured default.
    pub fn resolve_collection<'a>(&'a self, explicit: Option<&'a str>) -> Result<&'a str> {
        match explicit.filter(|c| !c.is_empty()).or(self.default_collection()) {
            Some(name) => {
                validate_collection_name(name)?;
                Ok(name)
            }
            None => bail!("no collection name given and no default collection configured"),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{path}", self.base_url));
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("Qdrant request failed: {what}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Qdrant {what} returned HTTP {status}: {body}");
        }
        let parsed: ApiResponse<T> = response
            .json()
            .await
            .with_context(|| format!("invalid Qdrant response for {what}"))?;
        Ok(parsed.result)
    }

    /// Names of all collections on the server.
    pub async fn collection_names(&self) -> Result<Vec<String>> {
        let list: CollectionList = self
            .send(self.request(Method::GET, "/collections"), "list collections")
            .await?;
        Ok(list.collections.into_iter().map(|c| c.name).collect())
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        let exists: Exists = self
            .send(
                self.request(Method::GET, &format!("/collections/{name}/exists")),
                "collection exists",
            )
            .await?;
        Ok(exists.exists)
    }

    /// Create the collection if needed, or verify its vector matches this provider.
    pub async fn ensure_collection(&self, name: &str) -> Result<()> {
        let vector_name = self.embedding.vector_name();
        let vector_size = self.embedding.vector_size().await?;

        if !self.collection_exists(name).await? {
            let body = json!({
                "vectors": {
                    vector_name.clone(): { "size": vector_size, "distance": "Cosine" }
                }
            });
            let _: serde_json::Value = self
                .send(
                    self.request(Method::PUT, &format!("/collections/{name}")).json(&body),
                    "create collection",
                )
                .await?;
            tracing::info!(collection = name, vector = %vector_name, size = vector_size, "collection created");
            return Ok(());
        }

        let info: serde_json::Value = self
            .send(
                self.request(Method::GET, &format!("/collections/{name}")),
                "collection info",
            )
            .await?;
        let stored_size = info
            .pointer("/config/params/vectors")
            .and_then(|v| v.get(&vector_name))
            .and_then(|v| v.get("size"))
            .and_then(|s| s.as_u64());
        match stored_size {
            Some(size) if size as usize == vector_size => Ok(()),
            Some(size) => bail!(
                "collection {name} stores {vector_name} with {size} dimensions, \
                 but the embedding model produces {vector_size}"
            ),
            None => bail!(
                "collection {name} has no vector named {vector_name}; \
                 it was created with a different embedding model"
            ),
        }
    }

    /// Embed and store one entry.
    pub async fn store(&self, entry: &Entry, collection: Option<&str>) -> Result<()> {
        let collection = self.resolve_collection(collection)?;
        self.ensure_collection(collection).await?;

        let mut vectors = self
            .embedding
            .embed_documents(std::slice::from_ref(&entry.content))
            .await?;
        let vector = vectors.pop().context("embedding returned no vector")?;

        let body = json!({
            "points": [{
                "id": uuid::Uuid::new_v4().to_string(),
                "vector": { self.embedding.vector_name(): vector },
                "payload": { "document": entry.content, "metadata": entry.metadata },
            }]
        });
        let _: serde_json::Value = self
            .send(
                self.request(Method::PUT, &format!("/collections/{collection}/points?wait=true"))
                    .json(&body),
                "upsert points",
            )
            .await?;
        tracing::debug!(collection, "entry stored");
        Ok(())
    }

    /// Find entries similar to `query`. A missing collection yields no results.
    pub async fn search(&self, query: &str, collection: Option<&str>, limit: usize) -> Result<Vec<Entry>> {
        let collection = self.resolve_collection(collection)?;
        if !self.collection_exists(collection).await? {
            tracing::debug!(collection, "search on missing collection");
            return Ok(Vec::new());
        }

        let vector = self.embedding.embed_query(query).await?;
        let body = json!({
            "query": vector,
            "using": self.embedding.vector_name(),
            "limit": limit,
            "with_payload": true,
        });
        let result: QueryResult = self
            .send(
                self.request(Method::POST, &format!("/collections/{collection}/points/query"))
                    .json(&body),
                "query points",
            )
            .await?;

        Ok(result
            .points
            .into_iter()
            .filter_map(|p| p.payload)
            .map(|p| Entry {
                content: p.document.unwrap_or_default(),
                metadata: p.metadata.filter(|m| !m.is_null()),
            })
            .collect())
    }
}

/// Collection names go into URL paths, so only a path-safe subset is accepted.
fn validate_collection_name(name: &str) -> Result<()> {
    if name.len() > 255 {
        bail!("collection name is longer than 255 characters");
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        bail!("invalid character {bad:?} in collection name {name:?}");
    }
    if name == "." || name == ".." {
        bail!("invalid collection name {name:?}");
    }
    Ok(())
}
