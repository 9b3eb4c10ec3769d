//! Supported local embedding models and their descriptions.

use super::EmbeddingError;

/// How token embeddings are reduced to one sentence vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    /// Take the first (`[CLS]`) token.
    Cls,
    /// Attention-masked mean over all tokens.
    Mean,
}

/// Static description of a model: where to fetch it and how to run it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDescription {
    /// Qualified identifier, e.g. `"BAAI/bge-small-en-v1.5"`.
    pub model: &'static str,
    /// Output dimensionality.
    pub dim: usize,
    /// Hugging Face repository hosting the ONNX export.
    pub hf_repo: &'static str,
    /// Path of the ONNX graph inside the repository.
    pub model_file: &'static str,
    pub pooling: Pooling,
    /// Prepended to queries (asymmetric models).
    pub query_prefix: &'static str,
    /// Prepended to documents (asymmetric models).
    pub passage_prefix: &'static str,
    pub max_length: usize,
    /// Whether the graph takes a `token_type_ids` input.
    pub token_type_ids: bool,
}

impl ModelDescription {
    /// Download URL for a file in this model's repository.
    pub fn file_url(&self, file: &str) -> String {
        format!("https://huggingface.co/{}/resolve/main/{file}", self.hf_repo)
    }
}

const BGE_QUERY_PREFIX: &str = "Represent this sentence for searching relevant passages: ";

pub const MODELS: &[ModelDescription] = &[
    ModelDescription {
        model: "sentence-transformers/all-MiniLM-L6-v2",
        dim: 384,
        hf_repo: "sentence-transformers/all-MiniLM-L6-v2",
        model_file: "onnx/model.onnx",
        pooling: Pooling::Mean,
        query_prefix: "",
        passage_prefix: "",
        max_length: 256,
        token_type_ids: true,
    },
    ModelDescription {
        model: "BAAI/bge-small-en",
        dim: 384,
        hf_repo: "Qdrant/bge-small-en",
        model_file: "model_optimized.onnx",
        pooling: Pooling::Cls,
        query_prefix: BGE_QUERY_PREFIX,
        passage_prefix: "",
        max_length: 512,
        token_type_ids: true,
    },
    ModelDescription {
        model: "BAAI/bge-small-en-v1.5",
        dim: 384,
        hf_repo: "BAAI/bge-small-en-v1.5",
        model_file: "onnx/model.onnx",
        pooling: Pooling::Cls,
        query_prefix: BGE_QUERY_PREFIX,
        passage_prefix: "",
        max_length: 512,
        token_type_ids: true,
    },
    ModelDescription {
        model: "BAAI/bge-base-en-v1.5",
        dim: 768,
        hf_repo: "BAAI/bge-base-en-v1.5",
        model_file: "onnx/model.onnx",
        pooling: Pooling::Cls,
        query_prefix: BGE_QUERY_PREFIX,
        passage_prefix: "",
        max_length: 512,
        token_type_ids: true,
    },
    ModelDescription {
        model: "intfloat/multilingual-e5-small",
        dim: 384,
        hf_repo: "intfloat/multilingual-e5-small",
        model_file: "onnx/model.onnx",
        pooling: Pooling::Mean,
        query_prefix: "query: ",
        passage_prefix: "passage: ",
        max_length: 512,
        token_type_ids: false,
    },
    ModelDescription {
        model: "nomic-ai/nomic-embed-text-v1.5",
        dim: 768,
        hf_repo: "nomic-ai/nomic-embed-text-v1.5",
        model_file: "onnx/model.onnx",
        pooling: Pooling::Mean,
        query_prefix: "search_query: ",
        passage_prefix: "search_document: ",
        max_length: 512,
        token_type_ids: true,
    },
];

/// Look up a model by identifier, ignoring ASCII case.
pub fn lookup(model: &str) -> Result<&'static ModelDescription, EmbeddingError> {
    let model = model.trim();
    if model.is_empty() {
        return Err(EmbeddingError::Configuration(
            "embedding model identifier is empty".into(),
        ));
    }
    MODELS
        .iter()
        .find(|d| d.model.eq_ignore_ascii_case(model))
        .ok_or_else(|| {
            EmbeddingError::Configuration(format!(
                "unknown embedding model: {model}. Run `mcp-server-qdrant model list` for supported models"
            ))
        })
}
