//! Local ONNX Runtime text encoder.
//!
//! Implements [`TextEncoder`] for any model in the [catalog](super::catalog) via `ort`.
//! Handles tokenization, inference, pooling, and L2 normalization.

use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use anyhow::{Context, Result};
use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::catalog::{ModelDescription, Pooling};
use super::download::ModelFiles;
use super::fastembed::TextEncoder;
use super::EmbeddingError;

const INTRA_THREADS: usize = 2;

/// A loaded model: a small pool of inference sessions sharing one tokenizer.
pub struct OnnxEncoder {
    desc: &'static ModelDescription,
    sessions: Vec<Mutex<Session>>,
    next: AtomicUsize,
    tokenizer: Tokenizer,
    dim: usize,
}

// Safety: Tokenizer is Send+Sync. Each Session is behind its own Mutex,
// which guarantees exclusive access during run().
unsafe impl Send for OnnxEncoder {}
unsafe impl Sync for OnnxEncoder {}

impl OnnxEncoder {
    /// Build `sessions` inference sessions from the model files and probe the
    /// output dimensionality. Blocking; run it on a worker thread.
    pub fn load(desc: &'static ModelDescription, files: &ModelFiles, sessions: usize) -> Result<Self> {
        let mut pool = Vec::with_capacity(sessions.max(1));
        for _ in 0..sessions.max(1) {
            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(INTRA_THREADS)?
                .commit_from_file(&files.model)
                .context("failed to load ONNX model")?;
            pool.push(Mutex::new(session));
        }

        tracing::info!(
            model = desc.model,
            path = %files.model.display(),
            sessions = pool.len(),
            "ONNX model loaded"
        );

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: desc.max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;

        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        let mut encoder = Self {
            desc,
            sessions: pool,
            next: AtomicUsize::new(0),
            tokenizer,
            dim: 0,
        };

        let probe = encoder
            .encode("", &["dimension probe".to_string()])
            .context("model failed its first inference")?;
        encoder.dim = probe.ncols();

        Ok(encoder)
    }

    /// Take a free session, or wait for the next one in rotation.
    fn checkout(&self) -> Result<MutexGuard<'_, Session>> {
        let n = self.sessions.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % n;
        for i in 0..n {
            match self.sessions[(start + i) % n].try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::WouldBlock) => continue,
                Err(TryLockError::Poisoned(e)) => anyhow::bail!("session lock poisoned: {e}"),
            }
        }
        self.sessions[start]
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))
    }

    fn encode(&self, prefix: &str, texts: &[String]) -> Result<Array2<f32>> {
        if texts.is_empty() {
            return Ok(Array2::zeros((0, self.dim)));
        }

        // Step 1: Tokenize
        let inputs: Vec<String> = texts.iter().map(|t| format!("{prefix}{t}")).collect();
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let batch_size = encodings.len();
        let seq_len = encodings[0].get_ids().len();

        // Step 2: Build flat input tensors as i64
        let mut input_ids_flat = Vec::with_capacity(batch_size * seq_len);
        let mut attention_mask_flat = Vec::with_capacity(batch_size * seq_len);

        for encoding in &encodings {
            input_ids_flat.extend(encoding.get_ids().iter().map(|&id| id as i64));
            attention_mask_flat.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }

        let shape = vec![batch_size as i64, seq_len as i64];
        let input_ids_tensor =
            Tensor::from_array((shape.clone(), input_ids_flat.into_boxed_slice()))?;
        let attention_mask_tensor =
            Tensor::from_array((shape.clone(), attention_mask_flat.clone().into_boxed_slice()))?;

        let mut session_inputs = ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
        };
        if self.desc.token_type_ids {
            // single sentence, no segment B
            let token_type_ids = vec![0i64; batch_size * seq_len];
            let token_type_ids_tensor =
                Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;
            session_inputs.push((Cow::Borrowed("token_type_ids"), token_type_ids_tensor.into()));
        }

        // Step 3: Run ONNX inference
        let mut session = self.checkout()?;
        let outputs = session.run(session_inputs)?;

        // Step 4: Extract token embeddings, shape [batch, seq_len, hidden].
        // The output name varies by ONNX export. Try common names, fall back to index 0.
        let token_emb_value = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (shape, data) = token_emb_value
            .try_extract_tensor::<f32>()
            .context("failed to extract token embeddings tensor")?;

        let dims: &[i64] = &shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == batch_size,
            "unexpected token embeddings shape: {dims:?}, expected [{batch_size}, seq, hidden]"
        );
        let actual_seq_len = dims[1] as usize;
        let hidden_dim = dims[2] as usize;

        // Step 5: Pool and L2 normalize
        let mut pooled = Array2::<f32>::zeros((batch_size, hidden_dim));
        for b in 0..batch_size {
            let mut row = match self.desc.pooling {
                Pooling::Cls => {
                    let offset = b * actual_seq_len * hidden_dim;
                    data[offset..offset + hidden_dim].to_vec()
                }
                Pooling::Mean => mean_pool(
                    &data[b * actual_seq_len * hidden_dim..(b + 1) * actual_seq_len * hidden_dim],
                    &attention_mask_flat[b * seq_len..(b + 1) * seq_len],
                    hidden_dim,
                ),
            };
            l2_normalize(&mut row);
            pooled.row_mut(b).assign(&ndarray::ArrayView1::from(&row));
        }

        Ok(pooled)
    }
}

impl TextEncoder for OnnxEncoder {
    fn passage_embed(&self, texts: &[String]) -> Result<Array2<f32>, EmbeddingError> {
        self.encode(self.desc.passage_prefix, texts)
            .map_err(|e| EmbeddingError::Computation(format!("{e:#}")))
    }

    fn query_embed(&self, texts: &[String]) -> Result<Array2<f32>, EmbeddingError> {
        self.encode(self.desc.query_prefix, texts)
            .map_err(|e| EmbeddingError::Computation(format!("{e:#}")))
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

/// Attention-masked mean over the token rows of one sequence.
fn mean_pool(tokens: &[f32], mask: &[i64], hidden_dim: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_dim];
    let mut count = 0.0f32;

    for (s, &m) in mask.iter().enumerate() {
        let offset = s * hidden_dim;
        if m > 0 && offset + hidden_dim <= tokens.len() {
            for (acc, x) in sum.iter_mut().zip(&tokens[offset..offset + hidden_dim]) {
                *acc += x;
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        for x in &mut sum {
            *x /= count;
        }
    }
    sum
}

/// L2-normalize a vector in place. A zero vector is left as is.
fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
