//! Vector index over the corpus embeddings
//!
//! Two interchangeable backends sit behind [`NearestNeighbors`]:
//! - [`FlatIndex`]: exact search, Euclidean distance over an `ndarray` matrix
//! - [`HnswIndex`]: approximate search with `hnsw_rs`
//!
//! Both are built once from an [`IndexFile`] whose entries are in corpus order,
//! and are read-only afterwards.

mod flat;
mod hnsw;

pub use flat::FlatIndex;
pub use hnsw::HnswIndex;

use crate::corpus::CorpusStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index file not found: {0}")]
    IndexNotFound(String),

    #[error("Index does not match corpus: {0}")]
    CorpusMismatch(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// One search hit: the corpus position and its distance, from the same rank
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Offset into the corpus store
    pub position: usize,
    /// Euclidean distance to the query (0.0 is identical)
    pub distance: f32,
}

/// K-nearest-neighbor search over fixed-length embeddings
pub trait NearestNeighbors: Send + Sync {
    /// Up to `k` hits ordered by ascending distance
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError>;

    /// Number of indexed vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimension
    fn dimension(&self) -> usize;
}

/// Which backend to build from the persisted vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Flat,
    Hnsw,
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexKind::Flat => write!(f, "flat"),
            IndexKind::Hnsw => write!(f, "hnsw"),
        }
    }
}

/// HNSW tuning, ignored by the flat backend
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
        }
    }
}

/// Persisted embeddings, one per corpus chunk in corpus order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
    /// Embedding model used at build time
    pub model: String,
    /// Length of every vector
    pub dimension: usize,
    /// BLAKE3 digest of the corpus the vectors were computed from
    pub corpus_digest: String,
    /// Built at (RFC 3339)
    #[serde(default)]
    pub created_at: Option<String>,
    pub vectors: Vec<Vec<f32>>,
}

impl IndexFile {
    pub fn new(
        model: impl Into<String>,
        dimension: usize,
        corpus_digest: impl Into<String>,
        vectors: Vec<Vec<f32>>,
    ) -> Self {
        Self {
            model: model.into(),
            dimension,
            corpus_digest: corpus_digest.into(),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
            vectors,
        }
    }

    pub fn load(path: &Path) -> Result<Self, IndexError> {
        if !path.exists() {
            return Err(IndexError::IndexNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let file: IndexFile = serde_json::from_str(&content)
            .map_err(|e| IndexError::SerializationError(e.to_string()))?;

        for vector in &file.vectors {
            if vector.len() != file.dimension {
                return Err(IndexError::InvalidDimension {
                    expected: file.dimension,
                    actual: vector.len(),
                });
            }
        }

        Ok(file)
    }

    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let content = serde_json::to_string(self)
            .map_err(|e| IndexError::SerializationError(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the 1:1 correspondence with `corpus` and the embedding model
    pub fn verify(&self, corpus: &CorpusStore, model: &str) -> Result<(), IndexError> {
        if self.model != model {
            return Err(IndexError::CorpusMismatch(format!(
                "index built with model '{}', configured model is '{}'",
                self.model, model
            )));
        }
        if self.vectors.len() != corpus.len() {
            return Err(IndexError::CorpusMismatch(format!(
                "index has {} vectors, corpus has {} chunks",
                self.vectors.len(),
                corpus.len()
            )));
        }
        if self.corpus_digest != corpus.digest() {
            return Err(IndexError::CorpusMismatch(
                "corpus digest differs; rebuild the index".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the configured backend from these vectors
    pub fn build(
        self,
        kind: IndexKind,
        params: HnswParams,
    ) -> Result<Box<dyn NearestNeighbors>, IndexError> {
        let index: Box<dyn NearestNeighbors> = match kind {
            IndexKind::Flat => Box::new(FlatIndex::from_vectors(self.dimension, self.vectors)?),
            IndexKind::Hnsw => Box::new(HnswIndex::from_vectors(self.dimension, self.vectors, params)?),
        };
        tracing::info!(
            "Built {} index with {} vectors ({}D)",
            kind,
            index.len(),
            index.dimension()
        );
        Ok(index)
    }
}
