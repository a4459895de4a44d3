/// Embedding generation
///
/// The same model must encode the corpus at index-build time and every query at
/// answer time, otherwise distances are meaningless.
/// - EmbeddingProvider trait for abstraction
/// - FastEmbedProvider for local embedding (all-MiniLM-L6-v2, 384-dim)
mod provider;

pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};

/// Dimension produced by a supported model name, if known
pub fn model_dimension(model_name: &str) -> Option<usize> {
    match model_name {
        "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => Some(384),
        "bge-small-en-v1.5" => Some(384),
        "bge-base-en-v1.5" => Some(768),
        _ => None,
    }
}

/// Model names accepted by [`FastEmbedProvider::new`]
pub const SUPPORTED_MODELS: [&str; 3] = ["all-MiniLM-L6-v2", "bge-small-en-v1.5", "bge-base-en-v1.5"];
