//! Process-local store for development runs and tests.

use crate::error::StoreError;
use crate::models::{ChunkRecord, DocumentRecord, SimilarityMatch};
use crate::traits::{DocumentStore, SimilaritySearch};
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    documents: Vec<DocumentRecord>,
    chunks: Vec<ChunkRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    dimensions: Option<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects chunk inserts whose embedding length differs from `dimensions`,
    /// like a typed vector column would.
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            tables: RwLock::default(),
            dimensions: Some(dimensions),
        }
    }

    pub async fn chunks_for(&self, document_id: &str) -> Vec<ChunkRecord> {
        self.tables
            .read()
            .await
            .chunks
            .iter()
            .filter(|chunk| chunk.document_id == document_id)
            .cloned()
            .collect()
    }
}

fn dot(left: &[f32], right: &[f32]) -> f64 {
    left.iter()
        .zip(right.iter())
        .map(|(a, b)| f64::from(*a) * f64::from(*b))
        .sum()
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert_document(&self, document: &DocumentRecord) -> Result<bool, StoreError> {
        self.tables.write().await.documents.push(document.clone());
        Ok(true)
    }

    async fn insert_chunk(&self, chunk: &ChunkRecord) -> Result<(), StoreError> {
        if let Some(expected) = self.dimensions {
            if chunk.embedding.len() != expected {
                return Err(StoreError::Request(format!(
                    "expected {expected} dimensions, not {}",
                    chunk.embedding.len()
                )));
            }
        }

        self.tables.write().await.chunks.push(chunk.clone());
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let mut documents = self.tables.read().await.documents.clone();
        documents.sort_by(|left, right| right.uploaded_at.cmp(&left.uploaded_at));
        Ok(documents)
    }

    async fn count_chunks(&self, document_id: &str) -> Result<usize, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .chunks
            .iter()
            .filter(|chunk| chunk.document_id == document_id)
            .count())
    }

    async fn chunk_exists_any(&self) -> Result<bool, StoreError> {
        Ok(!self.tables.read().await.chunks.is_empty())
    }
}

#[async_trait]
impl SimilaritySearch for InMemoryStore {
    async fn match_chunks(
        &self,
        query_embedding: &[f32],
        match_threshold: f64,
        match_count: usize,
    ) -> Result<Vec<SimilarityMatch>, StoreError> {
        let tables = self.tables.read().await;

        let mut matches = tables
            .chunks
            .iter()
            .map(|chunk| (chunk, dot(&chunk.embedding, query_embedding)))
            .filter(|(_, similarity)| *similarity > match_threshold)
            .map(|(chunk, similarity)| {
                let filename = tables
                    .documents
                    .iter()
                    .find(|document| document.document_id == chunk.document_id)
                    .map(|document| document.filename.clone())
                    .unwrap_or_else(|| "unknown".to_string());

                SimilarityMatch {
                    content: chunk.content.clone(),
                    filename,
                    similarity,
                    document_id: Some(chunk.document_id.clone()),
                }
            })
            .collect::<Vec<_>>();

        matches.sort_by(|left, right| right.similarity.total_cmp(&left.similarity));
        matches.truncate(match_count);
        Ok(matches)
    }
}
