//! Dense retrieval over the corpus store

use crate::corpus::{Chunk, CorpusStore};
use crate::embedding::EmbeddingProvider;
use crate::index::{NearestNeighbors, Neighbor};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Embedding generation failed: {0}")]
    EmbeddingError(String),

    #[error("Vector search failed: {0}")]
    VectorSearchError(String),

    #[error("Index not initialized: {0}")]
    NotInitialized(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Retrieval task failed: {0}")]
    TaskFailed(String),
}

/// A corpus chunk paired with its distance from the query
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// Position in the corpus store
    pub position: usize,
    pub chunk: Chunk,
    /// Euclidean distance reported by the index for this chunk
    pub distance: f32,
}

/// Embeds a query and looks up its nearest corpus chunks
///
/// Holds only shared read-only handles; clone it freely across tasks.
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn NearestNeighbors>,
    corpus: Arc<CorpusStore>,
}

impl Retriever {
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_index: Arc<dyn NearestNeighbors>,
        corpus: Arc<CorpusStore>,
    ) -> Self {
        Self {
            embedding_provider,
            vector_index,
            corpus,
        }
    }

    pub fn corpus(&self) -> &CorpusStore {
        &self.corpus
    }

    pub fn index(&self) -> &dyn NearestNeighbors {
        self.vector_index.as_ref()
    }

    pub fn embedding_provider(&self) -> &dyn EmbeddingProvider {
        self.embedding_provider.as_ref()
    }

    /// Up to `k` chunks nearest to `query`, ascending by distance.
    ///
    /// Embedding and search are CPU-bound and run on the blocking pool. An
    /// empty result is not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }
        if self.vector_index.is_empty() {
            return Err(RetrievalError::NotInitialized(
                "vector index has no entries".to_string(),
            ));
        }

        let this = self.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || this.retrieve_blocking(&query, k))
            .await
            .map_err(|e| RetrievalError::TaskFailed(e.to_string()))?
    }

    fn retrieve_blocking(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let query_embedding = self
            .embedding_provider
            .embed(query)
            .map_err(|e| RetrievalError::EmbeddingError(e.to_string()))?;

        let neighbors = self
            .vector_index
            .search(&query_embedding, k)
            .map_err(|e| RetrievalError::VectorSearchError(e.to_string()))?;

        let results = self.hydrate(neighbors);
        tracing::debug!("Retrieved {} chunks for query", results.len());
        Ok(results)
    }

    /// Attach corpus chunks to search hits.
    ///
    /// Each hit already carries its own position and distance, so dropping an
    /// out-of-range hit never shifts the distances of the hits after it.
    fn hydrate(&self, neighbors: Vec<Neighbor>) -> Vec<RetrievedChunk> {
        neighbors
            .into_iter()
            .filter_map(|hit| match self.corpus.get(hit.position) {
                Some(chunk) => Some(RetrievedChunk {
                    position: hit.position,
                    chunk: chunk.clone(),
                    distance: hit.distance,
                }),
                None => {
                    tracing::warn!(
                        "Index returned position {} outside corpus of {} chunks",
                        hit.position,
                        self.corpus.len()
                    );
                    None
                }
            })
            .collect()
    }
}
