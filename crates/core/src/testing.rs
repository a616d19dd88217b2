use crate::embeddings::{CharacterNgramEmbedder, Embedder};
use crate::error::{CompletionError, EmbedError, IngestError, StoreError};
use crate::extractor::{PageText, PdfExtractor};
use crate::models::{ChunkRecord, DocumentRecord, SimilarityMatch};
use crate::traits::{AnswerSynthesizer, DocumentStore, SimilaritySearch};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn numbered_words(range: std::ops::Range<usize>) -> String {
    range
        .map(|index| format!("w{index}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct StaticPages(pub Vec<String>);

impl PdfExtractor for StaticPages {
    fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
        Ok(self
            .0
            .iter()
            .enumerate()
            .map(|(index, text)| PageText {
                number: index as u32 + 1,
                text: text.clone(),
            })
            .collect())
    }
}

/// Embeds like [`CharacterNgramEmbedder`] but fails for texts containing any marker.
pub struct FlakyEmbedder {
    pub inner: CharacterNgramEmbedder,
    pub fail_markers: Vec<String>,
    pub calls: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn failing_on(markers: &[&str]) -> Self {
        Self {
            inner: CharacterNgramEmbedder::default(),
            fail_markers: markers.iter().map(|marker| marker.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn reliable() -> Self {
        Self::failing_on(&[])
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    fn dimensions(&self) -> usize {
        self.inner.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let padded = format!(" {text} ");
        if self
            .fail_markers
            .iter()
            .any(|marker| padded.contains(&format!(" {marker} ")))
        {
            return Err(EmbedError::Provider {
                status: 503,
                details: "model is loading".to_string(),
            });
        }
        Ok(self.inner.embed_sync(text))
    }
}

/// Always returns a vector of the wrong length.
pub struct ShortEmbedder;

#[async_trait]
impl Embedder for ShortEmbedder {
    fn dimensions(&self) -> usize {
        crate::DEFAULT_EMBEDDING_DIMENSIONS
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(vec![1.0; 8])
    }
}

/// Acknowledges metadata inserts without storing a row.
#[derive(Default)]
pub struct SilentStore {
    pub chunk_inserts: AtomicUsize,
}

#[async_trait]
impl DocumentStore for SilentStore {
    async fn insert_document(&self, _document: &DocumentRecord) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn insert_chunk(&self, _chunk: &ChunkRecord) -> Result<(), StoreError> {
        self.chunk_inserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        Ok(Vec::new())
    }

    async fn count_chunks(&self, _document_id: &str) -> Result<usize, StoreError> {
        Ok(0)
    }

    async fn chunk_exists_any(&self) -> Result<bool, StoreError> {
        Ok(false)
    }
}

/// Similarity search that returns a fixed candidate list.
pub struct CannedSearch {
    pub matches: Vec<SimilarityMatch>,
    pub requests: Mutex<Vec<(f64, usize)>>,
}

impl CannedSearch {
    pub fn new(matches: Vec<SimilarityMatch>) -> Self {
        Self {
            matches,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SimilaritySearch for CannedSearch {
    async fn match_chunks(
        &self,
        _query_embedding: &[f32],
        match_threshold: f64,
        match_count: usize,
    ) -> Result<Vec<SimilarityMatch>, StoreError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((match_threshold, match_count));
        }
        Ok(self.matches.clone())
    }
}

pub struct BrokenSearch;

#[async_trait]
impl SimilaritySearch for BrokenSearch {
    async fn match_chunks(
        &self,
        _query_embedding: &[f32],
        _match_threshold: f64,
        _match_count: usize,
    ) -> Result<Vec<SimilarityMatch>, StoreError> {
        Err(StoreError::BackendResponse {
            backend: "supabase".to_string(),
            details: "500 Internal Server Error".to_string(),
        })
    }
}

/// Records every prompt and answers with a fixed string.
#[derive(Default)]
pub struct RecordingSynthesizer {
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl RecordingSynthesizer {
    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().map(|prompts| prompts.len()).unwrap_or(0)
    }

    pub fn last_user_message(&self) -> Option<String> {
        self.prompts
            .lock()
            .ok()
            .and_then(|prompts| prompts.last().map(|(_, user)| user.clone()))
    }
}

#[async_trait]
impl AnswerSynthesizer for RecordingSynthesizer {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, CompletionError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((system_prompt.to_string(), user_message.to_string()));
        }
        Ok("synthesized answer".to_string())
    }
}

pub fn similarity_match(filename: &str, similarity: f64, content: &str) -> SimilarityMatch {
    SimilarityMatch {
        content: content.to_string(),
        filename: filename.to_string(),
        similarity,
        document_id: None,
    }
}
