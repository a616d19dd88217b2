use crate::error::{CompletionError, StoreError};
use crate::models::{ChunkRecord, DocumentRecord, SimilarityMatch};
use async_trait::async_trait;

/// Append-only persistence for document metadata and chunk rows.
///
/// Every call is independent; there is no transaction spanning a document
/// and its chunks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns `false` when the backend acknowledged the call but stored no row.
    async fn insert_document(&self, document: &DocumentRecord) -> Result<bool, StoreError>;

    async fn insert_chunk(&self, chunk: &ChunkRecord) -> Result<(), StoreError>;

    /// Most recently uploaded first.
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError>;

    async fn count_chunks(&self, document_id: &str) -> Result<usize, StoreError>;

    async fn chunk_exists_any(&self) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    async fn match_chunks(
        &self,
        query_embedding: &[f32],
        match_threshold: f64,
        match_count: usize,
    ) -> Result<Vec<SimilarityMatch>, StoreError>;
}

#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_message: &str)
        -> Result<String, CompletionError>;
}
