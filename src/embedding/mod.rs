//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and a lazily loaded local implementation,
//! [`fastembed::FastEmbedProvider`], backed by ONNX Runtime. The provider is created
//! via [`create_provider`] from configuration.

pub mod catalog;
pub mod download;
pub mod fastembed;
pub mod onnx;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;

/// Failures surfaced by an [`EmbeddingProvider`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmbeddingError {
    /// The configured model identifier is empty or not a known model.
    #[error("embedding configuration error: {0}")]
    Configuration(String),

    /// The model could not be fetched or loaded.
    #[error("failed to load embedding model {model}: {reason}")]
    ResourceAcquisition { model: String, reason: String },

    /// The encoder failed on a specific batch. The loaded model stays usable.
    #[error("embedding computation failed: {0}")]
    Computation(String),

    /// The model produced vectors of a different size than its vector space declares.
    #[error("vector space mismatch for {model}: expected {expected} dimensions, got {actual}")]
    DimensionMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },

    /// The blocking worker panicked or was cancelled.
    #[error("embedding worker failed: {0}")]
    WorkerFailed(String),
}

/// Trait for embedding text into vectors.
///
/// One instance is shared (`Arc<dyn EmbeddingProvider>`) for the whole process.
/// `embed_documents` and `embed_query` must not block the async runtime.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of documents through the passage encoding path.
    /// Output order matches input order; an empty input yields an empty output.
    async fn embed_documents(&self, documents: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single search query through the query encoding path.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Name of the vector field in the store. Never loads the model.
    fn vector_name(&self) -> String;

    /// Number of dimensions of every vector this provider returns.
    async fn vector_size(&self) -> Result<usize, EmbeddingError>;
}

/// Create an embedding provider from config.
///
/// Currently only `"fastembed"` is supported. The model itself is not loaded here.
pub fn create_provider(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "fastembed" => {
            let provider = fastembed::FastEmbedProvider::new(config);
            Ok(Arc::new(provider))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: fastembed"),
    }
}
