//! Startup wiring: load every component once and hand out a ready pipeline
//!
//! Any missing or inconsistent input is a fatal initialization error. A
//! process that starts always serves with a fully loaded index.

use crate::config::Config;
use crate::corpus::CorpusStore;
use crate::embedding::{EmbeddingProvider, FastEmbedProvider};
use crate::error::{AdvisorError, Result};
use crate::generation::{ApiKey, GeminiClient, GenerationClient};
use crate::index::{IndexError, IndexFile, NearestNeighbors};
use crate::pipeline::AnswerPipeline;
use crate::retrieval::Retriever;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Readiness snapshot reported by `status` and `/api/status`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub status: String,
    pub message: String,
    pub model_loaded: bool,
    pub index_loaded: bool,
    pub embedder_loaded: bool,
    pub chunks_count: usize,
}

impl SystemStatus {
    /// Readiness read off the live handles of `pipeline`
    pub fn of(pipeline: &AnswerPipeline) -> Self {
        let retriever = pipeline.retriever();
        let model_loaded = !pipeline.generator().model_name().is_empty();
        let embedder_loaded = retriever.embedding_provider().dimension() > 0;
        let index_loaded = !retriever.index().is_empty();
        let healthy =
            model_loaded && embedder_loaded && index_loaded && !retriever.corpus().is_empty();

        Self {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            message: if healthy {
                "System operational".to_string()
            } else {
                "System not initialized".to_string()
            },
            model_loaded,
            index_loaded,
            embedder_loaded,
            chunks_count: retriever.corpus().len(),
        }
    }
}

/// Load the credential, corpus, index, embedder and generation client
/// described by `config` and assemble the answer pipeline.
pub fn load_pipeline(config: &Config) -> Result<AnswerPipeline> {
    let api_key = ApiKey::from_env(&config.llm.api_key_env, &config.llm.key_prefix)
        .map_err(AdvisorError::Credential)?;

    let corpus = Arc::new(CorpusStore::load(&config.corpus.chunks_file)?);

    let index_file = IndexFile::load(&config.corpus.index_file)?;
    index_file.verify(&corpus, &config.embedding.model)?;
    let index: Arc<dyn NearestNeighbors> =
        Arc::from(index_file.build(config.index.kind, config.hnsw_params())?);

    info!("Loading embedding model {}", config.embedding.model);
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FastEmbedProvider::new(
        &config.embedding.model,
        config.embedding.batch_size,
    )?);
    if embedder.dimension() != index.dimension() {
        return Err(IndexError::InvalidDimension {
            expected: index.dimension(),
            actual: embedder.dimension(),
        }
        .into());
    }

    let generator: Arc<dyn GenerationClient> = Arc::new(
        GeminiClient::new(
            &api_key,
            &config.llm.base_url,
            &config.llm.model,
            config.llm.temperature,
            Duration::from_secs(config.llm.timeout_secs),
        )
        .map_err(AdvisorError::Generation)?,
    );
    info!("Generation model: {}", generator.model_name());

    let retriever = Retriever::new(embedder, index, corpus);
    Ok(AnswerPipeline::new(
        retriever,
        config.prompt_builder(),
        generator,
        config.pipeline_settings(),
    ))
}

/// Embed every chunk of `corpus` with `embedder`, in corpus order
pub fn build_index_file(embedder: &dyn EmbeddingProvider, corpus: &CorpusStore) -> Result<IndexFile> {
    let texts: Vec<String> = corpus.chunks().iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts)?;

    if vectors.len() != texts.len() {
        return Err(AdvisorError::Corpus(format!(
            "embedder returned {} vectors for {} chunks",
            vectors.len(),
            texts.len()
        )));
    }

    info!(
        "Embedded {} chunks with {} ({}D)",
        vectors.len(),
        embedder.model_name(),
        embedder.dimension()
    );

    Ok(IndexFile::new(
        embedder.model_name(),
        embedder.dimension(),
        corpus.digest(),
        vectors,
    ))
}
