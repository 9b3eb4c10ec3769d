//! Lazily loaded local embedding provider.
//!
//! [`FastEmbedProvider`] names its vector space from the configured model identifier and
//! defers loading the model until the first call that needs it. Loading is guarded by a
//! [`OnceCell`], so concurrent first callers share a single load; encoding runs on the
//! blocking thread pool, bounded by a semaphore.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use ndarray::Array2;
use tokio::sync::{OnceCell, Semaphore};

use super::catalog::{self, ModelDescription};
use super::onnx::OnnxEncoder;
use super::{download, EmbeddingError, EmbeddingProvider};
use crate::config::{expand_tilde, EmbeddingConfig};

/// Prefix of every vector name produced by this provider family.
pub const VECTOR_NAME_PREFIX: &str = "fast-";

/// A loaded, synchronous text encoder. Rows of the returned matrix follow input order.
pub trait TextEncoder: Send + Sync {
    fn passage_embed(&self, texts: &[String]) -> Result<Array2<f32>, EmbeddingError>;
    fn query_embed(&self, texts: &[String]) -> Result<Array2<f32>, EmbeddingError>;
    /// Output dimensionality reported by the loaded model.
    fn dim(&self) -> usize;
}

/// Acquires a [`TextEncoder`] for a model description.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, desc: &'static ModelDescription) -> anyhow::Result<Arc<dyn TextEncoder>>;
}

/// Downloads model files into a cache directory and builds an [`OnnxEncoder`].
pub struct OnnxLoader {
    cache_dir: PathBuf,
    sessions: usize,
}

impl OnnxLoader {
    pub fn new(cache_dir: impl Into<PathBuf>, sessions: usize) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            sessions: sessions.max(1),
        }
    }
}

#[async_trait]
impl ModelLoader for OnnxLoader {
    async fn load(&self, desc: &'static ModelDescription) -> anyhow::Result<Arc<dyn TextEncoder>> {
        let dir = self.cache_dir.join(vector_name(desc.model));
        let files = download::ensure_model_files(desc, &dir).await?;
        let sessions = self.sessions;
        let encoder = tokio::task::spawn_blocking(move || OnnxEncoder::load(desc, &files, sessions))
            .await??;
        Ok(Arc::new(encoder))
    }
}

/// Derive the vector name for a model identifier: last path segment, lower-cased,
/// prefixed with `fast-`. This is the join key with existing collections and must not change.
pub fn vector_name(model: &str) -> String {
    let base = model.rsplit('/').next().unwrap_or(model);
    format!("{VECTOR_NAME_PREFIX}{}", base.to_lowercase())
}

struct Loaded {
    desc: &'static ModelDescription,
    encoder: Arc<dyn TextEncoder>,
}

/// Embedding provider backed by one lazily loaded local model.
pub struct FastEmbedProvider {
    model_name: String,
    loader: Box<dyn ModelLoader>,
    model: OnceCell<Loaded>,
    workers: Arc<Semaphore>,
}

impl FastEmbedProvider {
    /// Provider for `config.model` using the ONNX loader. Nothing is loaded yet.
    pub fn new(config: &EmbeddingConfig) -> Self {
        let sessions = config.sessions.max(1);
        let loader = OnnxLoader::new(expand_tilde(&config.cache_dir), sessions);
        Self::with_loader(&config.model, Box::new(loader), sessions)
    }

    /// Provider with a custom loader; `workers` bounds concurrent encoder calls.
    pub fn with_loader(model_name: &str, loader: Box<dyn ModelLoader>, workers: usize) -> Self {
        Self {
            model_name: model_name.to_string(),
            loader,
            model: OnceCell::new(),
            workers: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Whether the model has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    async fn model(&self) -> Result<&Loaded, EmbeddingError> {
        self.model.get_or_try_init(|| self.load()).await
    }

    async fn load(&self) -> Result<Loaded, EmbeddingError> {
        let desc = catalog::lookup(&self.model_name)?;
        let encoder =
            self.loader
                .load(desc)
                .await
                .map_err(|e| EmbeddingError::ResourceAcquisition {
                    model: self.model_name.clone(),
                    reason: format!("{e:#}"),
                })?;
        if encoder.dim() != desc.dim {
            return Err(EmbeddingError::DimensionMismatch {
                model: desc.model.to_string(),
                expected: desc.dim,
                actual: encoder.dim(),
            });
        }
        Ok(Loaded { desc, encoder })
    }

    /// Run `f` on the blocking pool and convert its matrix into plain vectors.
    async fn dispatch<F>(&self, texts: Vec<String>, f: F) -> Result<Vec<Vec<f32>>, EmbeddingError>
    where
        F: FnOnce(&dyn TextEncoder, &[String]) -> Result<Array2<f32>, EmbeddingError> + Send + 'static,
    {
        let loaded = self.model().await?;
        let encoder = Arc::clone(&loaded.encoder);
        let expected_rows = texts.len();

        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|e| EmbeddingError::WorkerFailed(e.to_string()))?;

        let matrix = tokio::task::spawn_blocking(move || f(encoder.as_ref(), &texts))
            .await
            .map_err(|e| EmbeddingError::WorkerFailed(e.to_string()))??;

        if matrix.nrows() != expected_rows {
            return Err(EmbeddingError::Computation(format!(
                "encoder returned {} vectors for {expected_rows} inputs",
                matrix.nrows()
            )));
        }
        if matrix.ncols() != loaded.desc.dim {
            return Err(EmbeddingError::DimensionMismatch {
                model: loaded.desc.model.to_string(),
                expected: loaded.desc.dim,
                actual: matrix.ncols(),
            });
        }

        Ok(matrix.rows().into_iter().map(|row| row.to_vec()).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_documents(&self, documents: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        self.dispatch(documents.to_vec(), |encoder, texts| encoder.passage_embed(texts))
            .await
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self
            .dispatch(vec![query.to_string()], |encoder, texts| encoder.query_embed(texts))
            .await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Computation("encoder returned no vector".into()))
    }

    fn vector_name(&self) -> String {
        vector_name(&self.model_name)
    }

    async fn vector_size(&self) -> Result<usize, EmbeddingError> {
        Ok(self.model().await?.encoder.dim())
    }
}
