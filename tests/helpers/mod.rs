#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcp_server_qdrant::embedding::catalog::ModelDescription;
use mcp_server_qdrant::embedding::fastembed::{FastEmbedProvider, ModelLoader, TextEncoder};
use mcp_server_qdrant::embedding::{EmbeddingError, EmbeddingProvider};
use ndarray::Array2;

/// Model identifier used by tests; a 384-dim catalog entry.
pub const TEST_MODEL: &str = "BAAI/bge-small-en";
pub const TEST_DIM: usize = 384;

/// Deterministic 384-dim embedding with a spike at a position derived from the text.
pub fn text_embedding(text: &str) -> Vec<f32> {
    let seed: usize = text.bytes().map(usize::from).sum();
    let mut v = vec![0.0f32; TEST_DIM];
    v[seed % TEST_DIM] = 1.0;
    v
}

/// Encoder returning [`text_embedding`] rows, optionally sleeping per batch.
pub struct FakeEncoder {
    pub dim: usize,
    pub delay: Duration,
    pub fail_on: Option<String>,
}

impl FakeEncoder {
    fn encode(&self, texts: &[String]) -> Result<Array2<f32>, EmbeddingError> {
        if let Some(bad) = &self.fail_on {
            if texts.iter().any(|t| t == bad) {
                return Err(EmbeddingError::Computation(format!("cannot encode {bad}")));
            }
        }
        std::thread::sleep(self.delay);
        let mut m = Array2::zeros((texts.len(), self.dim));
        for (i, t) in texts.iter().enumerate() {
            let e = text_embedding(t);
            for (j, x) in e.iter().take(self.dim).enumerate() {
                m[[i, j]] = *x;
            }
        }
        Ok(m)
    }
}

impl TextEncoder for FakeEncoder {
    fn passage_embed(&self, texts: &[String]) -> Result<Array2<f32>, EmbeddingError> {
        self.encode(texts)
    }

    fn query_embed(&self, texts: &[String]) -> Result<Array2<f32>, EmbeddingError> {
        self.encode(texts)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

/// Loader that counts loads, waits before finishing, and can be told to fail.
pub struct CountingLoader {
    pub loads: Arc<AtomicUsize>,
    pub load_delay: Duration,
    pub encode_delay: Duration,
    pub fail: bool,
    pub fail_on: Option<String>,
}

impl CountingLoader {
    pub fn new(loads: Arc<AtomicUsize>) -> Self {
        Self {
            loads,
            load_delay: Duration::from_millis(0),
            encode_delay: Duration::from_millis(0),
            fail: false,
            fail_on: None,
        }
    }
}

#[async_trait]
impl ModelLoader for CountingLoader {
    async fn load(&self, _desc: &'static ModelDescription) -> anyhow::Result<Arc<dyn TextEncoder>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.load_delay).await;
        if self.fail {
            anyhow::bail!("network unreachable");
        }
        Ok(Arc::new(FakeEncoder {
            dim: TEST_DIM,
            delay: self.encode_delay,
            fail_on: self.fail_on.clone(),
        }))
    }
}

/// A provider over [`CountingLoader`] plus its load counter.
pub fn counting_provider(
    configure: impl FnOnce(&mut CountingLoader),
) -> (Arc<FastEmbedProvider>, Arc<AtomicUsize>) {
    let loads = Arc::new(AtomicUsize::new(0));
    let mut loader = CountingLoader::new(Arc::clone(&loads));
    configure(&mut loader);
    let provider = FastEmbedProvider::with_loader(TEST_MODEL, Box::new(loader), 4);
    (Arc::new(provider), loads)
}

/// Ready-to-use shared provider for connector tests.
pub fn test_provider() -> Arc<dyn EmbeddingProvider> {
    let (provider, _) = counting_provider(|_| {});
    provider
}
