//! Retrieval: query embedding plus nearest-neighbor lookup over the corpus

mod retriever;

pub use retriever::{RetrievalError, RetrievedChunk, Retriever};

/// Number of chunks retrieved per question unless configured otherwise
pub const DEFAULT_TOP_K: usize = 5;
