use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata row written once per upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    pub document_id: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    pub document_id: String,
    pub chunk_index: u64,
    pub content: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// A candidate chunk returned by similarity search. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarityMatch {
    pub content: String,
    pub filename: String,
    pub similarity: f64,
    #[serde(default)]
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSummary {
    pub document_id: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadReport {
    pub success: bool,
    pub message: String,
    pub document_id: String,
    pub filename: String,
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatAnswer {
    pub answer: String,
    pub matches: usize,
    pub sources: Vec<String>,
    pub top_similarity: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetrievalConfig {
    /// Minimum similarity a candidate needs to be returned by the search backend.
    pub match_threshold: f64,
    /// Cap on candidates requested from the search backend.
    pub match_count: usize,
    /// Number of ranked candidates fed to the answer synthesizer.
    pub top_k: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.1,
            match_count: 15,
            top_k: 5,
            temperature: 0.2,
            max_tokens: 1_024,
        }
    }
}
