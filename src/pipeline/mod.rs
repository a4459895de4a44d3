//! Answer pipeline: retrieve → assemble prompt → generate with retry
//!
//! Every call is an independent transaction. The caller always receives an
//! [`AnswerResult`]; internal error detail is logged here and never copied
//! into the user-facing text.

mod failure;
mod retry;

pub use failure::FailureKind;
pub use retry::RetryPolicy;

use crate::generation::{GenerationClient, GenerationError};
use crate::prompt::{build_context, ConversationTurn, PromptBuilder};
use crate::retrieval::{RetrievedChunk, Retriever, DEFAULT_TOP_K};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Tunables of the answer pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Chunks retrieved per question
    pub top_k: usize,
    /// Retrieved chunks echoed back as sources
    pub sources_limit: usize,
    /// Characters of chunk text kept in a source excerpt
    pub excerpt_chars: usize,
    /// Shortest acceptable answer, in characters after trimming
    pub min_answer_chars: usize,
    pub retry: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            sources_limit: 3,
            excerpt_chars: 200,
            min_answer_chars: 10,
            retry: RetryPolicy::default(),
        }
    }
}

/// A cited passage returned alongside an answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceExcerpt {
    /// `page_label`, `page` or `"?"`, with its original JSON type
    pub page: Value,
    pub excerpt: String,
}

/// Outcome of one `answer()` call
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub answer_text: String,
    pub success: bool,
    pub sources: Vec<SourceExcerpt>,
    /// Why the call failed, for logs and reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl AnswerResult {
    fn succeeded(answer_text: String, sources: Vec<SourceExcerpt>) -> Self {
        Self {
            answer_text,
            success: true,
            sources,
            failure: None,
        }
    }

    fn failed(kind: FailureKind) -> Self {
        Self {
            answer_text: kind.user_message().to_string(),
            success: false,
            sources: Vec::new(),
            failure: Some(kind),
        }
    }
}

/// Orchestrates retrieval, prompt assembly and generation
pub struct AnswerPipeline {
    retriever: Retriever,
    prompt: PromptBuilder,
    generator: Arc<dyn GenerationClient>,
    settings: PipelineSettings,
}

impl AnswerPipeline {
    pub fn new(
        retriever: Retriever,
        prompt: PromptBuilder,
        generator: Arc<dyn GenerationClient>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            retriever,
            prompt,
            generator,
            settings,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn generator(&self) -> &dyn GenerationClient {
        self.generator.as_ref()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Answer `query`, folding in the most recent turns of `history`
    #[tracing::instrument(skip_all, fields(query_chars = query.chars().count(), history = history.len()))]
    pub async fn answer(&self, query: &str, history: &[ConversationTurn]) -> AnswerResult {
        if query.trim().is_empty() {
            return AnswerResult::failed(FailureKind::EmptyQuery);
        }

        let retrieved = match self.retriever.retrieve(query, self.settings.top_k).await {
            Ok(retrieved) => retrieved,
            Err(e) => {
                error!("Retrieval failed: {}", e);
                return AnswerResult::failed(FailureKind::Generic);
            }
        };

        if retrieved.is_empty() {
            info!("No chunks retrieved");
            return AnswerResult::failed(FailureKind::NoRelevantInformation);
        }

        let context = build_context(&retrieved);
        let prompt = self.prompt.build(query, &context, history);
        debug!(
            chunks = retrieved.len(),
            prompt_chars = prompt.len(),
            "Prompt assembled"
        );

        match self.generate_with_retry(&prompt).await {
            Ok(answer) => AnswerResult::succeeded(answer, self.sources(&retrieved)),
            Err(kind) => AnswerResult::failed(kind),
        }
    }

    /// Run the generation loop, returning the accepted answer or the failure
    /// category of the exhausted loop
    async fn generate_with_retry(&self, prompt: &str) -> Result<String, FailureKind> {
        let policy = self.settings.retry;
        let mut saw_auth = false;
        let mut last_error = GenerationError::Other("no generation attempt made".to_string());

        for attempt in 1..=policy.max_attempts {
            match self.generator.generate(prompt).await {
                Ok(answer) => {
                    let length = answer.trim().chars().count();
                    if length >= self.settings.min_answer_chars {
                        info!(attempt, answer_chars = length, "Answer generated");
                        return Ok(answer);
                    }
                    warn!(attempt, answer_chars = length, "Generated answer too short");
                    last_error = GenerationError::Other(format!(
                        "Generated answer too short ({} chars)",
                        length
                    ));
                }
                Err(e) => {
                    warn!(attempt, transient = e.is_transient(), "Generation failed: {}", e);
                    if matches!(e, GenerationError::Auth(_)) {
                        saw_auth = true;
                    }
                    last_error = e;
                }
            }

            if let Some(delay) = policy.delay_after(attempt) {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off");
                tokio::time::sleep(delay).await;
            }
        }

        let kind = FailureKind::classify(&last_error, saw_auth);
        error!(
            attempts = policy.max_attempts,
            category = ?kind,
            "Generation failed after all attempts: {}",
            last_error
        );
        Err(kind)
    }

    fn sources(&self, retrieved: &[RetrievedChunk]) -> Vec<SourceExcerpt> {
        retrieved
            .iter()
            .take(self.settings.sources_limit)
            .map(|r| SourceExcerpt {
                page: r.chunk.page(),
                excerpt: r.chunk.excerpt(self.settings.excerpt_chars),
            })
            .collect()
    }
}
