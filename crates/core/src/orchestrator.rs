use crate::embeddings::Embedder;
use crate::error::{EmbedError, PipelineError};
use crate::models::{ChatAnswer, RetrievalConfig, SimilarityMatch};
use crate::traits::{AnswerSynthesizer, DocumentStore, SimilaritySearch};
use std::sync::Arc;
use tracing::{error, info};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions using only the \
provided document context. If the context does not contain enough information to answer the \
question, say so clearly instead of guessing.";

pub const NO_DOCUMENTS_MESSAGE: &str =
    "No documents have been uploaded yet. Please upload a PDF before asking questions.";

pub const NO_MATCH_MESSAGE: &str =
    "I couldn't find any relevant information in the uploaded documents to answer that question.";

const SECTION_DELIMITER: &str = "\n\n---\n\n";

pub struct ChatCoordinator {
    embedder: Arc<dyn Embedder>,
    search: Arc<dyn SimilaritySearch>,
    store: Arc<dyn DocumentStore>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    config: RetrievalConfig,
}

impl ChatCoordinator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        search: Arc<dyn SimilaritySearch>,
        store: Arc<dyn DocumentStore>,
        synthesizer: Arc<dyn AnswerSynthesizer>,
    ) -> Self {
        Self {
            embedder,
            search,
            store,
            synthesizer,
            config: RetrievalConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub async fn ask(&self, question: &str) -> Result<ChatAnswer, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::client("Question cannot be empty"));
        }

        self.answer(question).await.inspect_err(|failure| {
            error!(error = %failure, "question failed");
        })
    }

    async fn answer(&self, question: &str) -> Result<ChatAnswer, PipelineError> {
        let query_embedding = self.embedder.embed(question).await?;
        let expected = self.embedder.dimensions();
        if query_embedding.len() != expected {
            return Err(EmbedError::DimensionMismatch {
                expected,
                actual: query_embedding.len(),
            }
            .into());
        }

        let matches = self
            .search
            .match_chunks(
                &query_embedding,
                self.config.match_threshold,
                self.config.match_count,
            )
            .await?;

        if matches.is_empty() {
            let has_documents = self.store.chunk_exists_any().await?;
            info!(has_documents, "no chunks matched question");
            let message = if has_documents {
                NO_MATCH_MESSAGE
            } else {
                NO_DOCUMENTS_MESSAGE
            };

            return Ok(ChatAnswer {
                answer: message.to_string(),
                matches: 0,
                sources: Vec::new(),
                top_similarity: None,
            });
        }

        let total_matches = matches.len();
        let top = rank_matches(matches, self.config.top_k);
        let context = build_context(&top);
        let user_message = format!("Context from documents:\n\n{context}\n\nQuestion: {question}");

        let answer = self
            .synthesizer
            .complete(SYSTEM_PROMPT, &user_message)
            .await?;

        let top_similarity = top
            .iter()
            .map(|candidate| candidate.similarity)
            .reduce(f64::max);
        info!(
            matches = total_matches,
            used = top.len(),
            top_similarity = top_similarity.unwrap_or_default(),
            "answered question"
        );

        Ok(ChatAnswer {
            answer,
            matches: total_matches,
            sources: unique_sources(&top),
            top_similarity,
        })
    }
}

/// Highest similarity first; equal scores keep their incoming order.
pub fn rank_matches(mut matches: Vec<SimilarityMatch>, top_k: usize) -> Vec<SimilarityMatch> {
    matches.sort_by(|left, right| right.similarity.total_cmp(&left.similarity));
    matches.truncate(top_k);
    matches
}

pub fn build_context(top: &[SimilarityMatch]) -> String {
    top.iter()
        .enumerate()
        .map(|(position, candidate)| {
            format!(
                "[Source {}: {} | Relevance: {:.1}%]\n{}",
                position + 1,
                candidate.filename,
                candidate.similarity * 100.0,
                candidate.content
            )
        })
        .collect::<Vec<_>>()
        .join(SECTION_DELIMITER)
}

/// Filenames in order of first appearance.
pub fn unique_sources(top: &[SimilarityMatch]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for candidate in top {
        if !sources.contains(&candidate.filename) {
            sources.push(candidate.filename.clone());
        }
    }
    sources
}
