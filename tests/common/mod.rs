//! Deterministic stand-ins for the embedding model and the hosted LLM

#![allow(dead_code)]

use async_trait::async_trait;
use cotton_advisor::corpus::{Chunk, CorpusStore};
use cotton_advisor::embedding::{EmbeddingError, EmbeddingProvider};
use cotton_advisor::generation::{GenerationClient, GenerationError};
use cotton_advisor::index::{FlatIndex, IndexError, NearestNeighbors, Neighbor};
use cotton_advisor::pipeline::{AnswerPipeline, PipelineSettings};
use cotton_advisor::prompt::PromptBuilder;
use cotton_advisor::retrieval::Retriever;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DIMENSION: usize = 256;

/// Bag-of-words embedder: each lowercase token hashes into one of
/// `DIMENSION` buckets, then the vector is L2-normalized.
pub struct HashEmbedder;

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("empty text".to_string()));
        }

        let mut vector = vec![0.0f32; DIMENSION];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = blake3::hash(token.to_lowercase().as_bytes());
            let bucket = u64::from_le_bytes(hash.as_bytes()[..8].try_into().unwrap()) as usize % DIMENSION;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_name(&self) -> &str {
        "hash-bow"
    }
}

/// Index stub returning fixed hits regardless of the query
pub struct FixedIndex {
    pub hits: Vec<Neighbor>,
    pub len: usize,
}

impl NearestNeighbors for FixedIndex {
    fn search(&self, _query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        Ok(self.hits.iter().take(k).copied().collect())
    }

    fn len(&self) -> usize {
        self.len
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// Index stub whose every search fails
pub struct BrokenIndex {
    pub len: usize,
}

impl NearestNeighbors for BrokenIndex {
    fn search(&self, _query: &[f32], _k: usize) -> Result<Vec<Neighbor>, IndexError> {
        Err(IndexError::SearchError("hnsw graph corrupted".to_string()))
    }

    fn len(&self) -> usize {
        self.len
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// Generation client that replays scripted outcomes, then repeats `fallback`
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    fallback: Result<String, GenerationError>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    model_name: String,
}

impl ScriptedGenerator {
    pub fn new(
        script: Vec<Result<String, GenerationError>>,
        fallback: Result<String, GenerationError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            model_name: "scripted".to_string(),
        }
    }

    pub fn with_model_name(mut self, model_name: &str) -> Self {
        self.model_name = model_name.to_string();
        self
    }

    pub fn always(outcome: Result<String, GenerationError>) -> Self {
        Self::new(Vec::new(), outcome)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

pub fn chunk(text: &str, metadata: Value) -> Chunk {
    let metadata: Map<String, Value> = match metadata {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Chunk::new(text, metadata)
}

pub fn advisory_corpus() -> CorpusStore {
    CorpusStore::new(vec![
        chunk(
            "Pink bollworm is controlled by pheromone traps.",
            json!({"page": 12}),
        ),
        chunk(
            "Whitefly populations are suppressed by yellow sticky traps and neem oil sprays.",
            json!({"page_label": "iv"}),
        ),
        chunk(
            "Cotton leaf curl disease is spread by whitefly and causes upward curling of leaves.",
            json!({"page": 31}),
        ),
        chunk(
            "Bacterial blight shows angular water-soaked leaf spots.",
            json!({}),
        ),
    ])
    .unwrap()
}

/// Exact flat index over `corpus` embedded with [`HashEmbedder`]
pub fn flat_index(corpus: &CorpusStore) -> Arc<dyn NearestNeighbors> {
    let vectors = corpus
        .chunks()
        .iter()
        .map(|c| HashEmbedder.embed(&c.text).unwrap())
        .collect();
    Arc::new(FlatIndex::from_vectors(DIMENSION, vectors).unwrap())
}

pub fn retriever(corpus: CorpusStore) -> Retriever {
    let index = flat_index(&corpus);
    Retriever::new(Arc::new(HashEmbedder), index, Arc::new(corpus))
}

pub fn pipeline(corpus: CorpusStore, generator: Arc<ScriptedGenerator>) -> AnswerPipeline {
    pipeline_with_retriever(retriever(corpus), generator)
}

pub fn pipeline_with_retriever(
    retriever: Retriever,
    generator: Arc<ScriptedGenerator>,
) -> AnswerPipeline {
    AnswerPipeline::new(
        retriever,
        PromptBuilder::default(),
        generator,
        PipelineSettings::default(),
    )
}
