use crate::chunking::{chunk_by_words, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::{ChunkError, EmbedError, IngestError, PipelineError};
use crate::extractor::{join_pages, LopdfExtractor, PageText, PdfExtractor};
use crate::models::{ChunkRecord, DocumentRecord, UploadReport};
use crate::traits::DocumentStore;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

pub fn is_pdf_filename(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".pdf")
}

#[derive(Debug)]
pub struct ChunkFailure {
    pub chunk_index: u64,
    pub error: ChunkError,
}

/// Per-chunk results of one upload, in chunk order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub stored: Vec<u64>,
    pub failed: Vec<ChunkFailure>,
}

impl BatchOutcome {
    pub fn from_results(results: Vec<(u64, Result<(), ChunkError>)>) -> Self {
        let mut outcome = Self::default();
        for (chunk_index, result) in results {
            match result {
                Ok(()) => outcome.stored.push(chunk_index),
                Err(error) => outcome.failed.push(ChunkFailure { chunk_index, error }),
            }
        }
        outcome
    }

    /// At least one stored chunk is a success; none at all is a server error.
    pub fn escalate(&self) -> Result<usize, PipelineError> {
        if !self.stored.is_empty() {
            return Ok(self.stored.len());
        }

        let first_reason = self
            .failed
            .first()
            .map(|failure| failure.error.to_string())
            .unwrap_or_else(|| "no chunks to store".to_string());
        Err(PipelineError::server(format!(
            "failed to store any of {} chunks: {first_reason}",
            self.failed.len()
        )))
    }
}

pub struct UploadPipeline {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn PdfExtractor>,
    chunking: ChunkingConfig,
    concurrency: usize,
}

impl UploadPipeline {
    pub fn new(store: Arc<dyn DocumentStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            extractor: Arc::new(LopdfExtractor),
            chunking: ChunkingConfig::default(),
            concurrency: 1,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PdfExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    /// Number of chunks embedded and stored at the same time. Stored indexes
    /// always follow chunk order regardless of this value.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn upload(&self, filename: &str, bytes: &[u8]) -> Result<UploadReport, PipelineError> {
        info!(filename, bytes = bytes.len(), "uploading document");

        if !is_pdf_filename(filename) {
            return Err(PipelineError::client("Please upload a PDF file"));
        }

        let pages = self.extract_pages(bytes).await?;
        let text = join_pages(&pages);
        info!(filename, pages = pages.len(), text_len = text.len(), "extracted text");

        if text.trim().is_empty() {
            return Err(PipelineError::client("No readable text found in PDF"));
        }

        let document_id = Uuid::new_v4().to_string();
        let chunks = chunk_by_words(&text, self.chunking);
        if chunks.is_empty() {
            return Err(PipelineError::client("Document produced no text chunks"));
        }

        let document = DocumentRecord {
            document_id: document_id.clone(),
            filename: filename.to_string(),
            uploaded_at: Utc::now(),
        };
        let stored_row = self.store.insert_document(&document).await?;
        if !stored_row {
            return Err(PipelineError::server(format!(
                "document metadata for {filename} was not stored"
            )));
        }

        let outcome = self.store_chunks(&document_id, chunks).await;
        for failure in &outcome.failed {
            warn!(
                document_id = %document_id,
                chunk_index = failure.chunk_index,
                reason = %failure.error,
                "skipped chunk"
            );
        }

        let stored = outcome.escalate()?;
        info!(
            document_id = %document_id,
            filename,
            stored,
            skipped = outcome.failed.len(),
            "document stored"
        );

        Ok(UploadReport {
            success: true,
            message: "PDF uploaded successfully".to_string(),
            document_id,
            filename: filename.to_string(),
            chunks: stored,
        })
    }

    /// Runs the CPU-bound extractor on the blocking pool.
    async fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, PipelineError> {
        let extractor = Arc::clone(&self.extractor);
        let bytes = bytes.to_vec();

        tokio::task::spawn_blocking(move || extractor.extract_pages(&bytes))
            .await
            .map_err(|error| PipelineError::server(format!("pdf extraction task failed: {error}")))?
            .map_err(|error| PipelineError::client(format!("Could not read PDF: {error}")))
    }

    async fn store_chunks(&self, document_id: &str, chunks: Vec<String>) -> BatchOutcome {
        let results = stream::iter(chunks.into_iter().enumerate())
            .map(|(index, content)| async move {
                let chunk_index = index as u64;
                let result = self.store_chunk(document_id, chunk_index, content).await;
                (chunk_index, result)
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        BatchOutcome::from_results(results)
    }

    async fn store_chunk(
        &self,
        document_id: &str,
        chunk_index: u64,
        content: String,
    ) -> Result<(), ChunkError> {
        let embedding = self.embedder.embed(&content).await?;

        let expected = self.embedder.dimensions();
        if embedding.len() != expected {
            return Err(EmbedError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            }
            .into());
        }

        let record = ChunkRecord {
            document_id: document_id.to_string(),
            chunk_index,
            content,
            embedding,
            created_at: Utc::now(),
        };
        self.store.insert_chunk(&record).await?;
        Ok(())
    }
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(is_pdf_filename);

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub uploaded: Vec<UploadReport>,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Runs every PDF under `folder` through the upload pipeline, one at a time.
///
/// A file that fails is recorded in `skipped_files`; only an empty folder is an error.
pub async fn ingest_folder_best_effort(
    pipeline: &UploadPipeline,
    folder: &Path,
) -> Result<IngestionReport, IngestError> {
    let files = discover_pdf_files(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            folder.display()
        )));
    }

    let mut uploaded = Vec::new();
    let mut skipped_files = Vec::new();

    for path in files {
        let result = upload_path(pipeline, &path).await;
        match result {
            Ok(report) => uploaded.push(report),
            Err(reason) => skipped_files.push(SkippedPdf { path, reason }),
        }
    }

    Ok(IngestionReport {
        uploaded,
        skipped_files,
    })
}

async fn upload_path(pipeline: &UploadPipeline, path: &Path) -> Result<UploadReport, String> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()).to_string())?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|error| IngestError::Io(error).to_string())?;

    pipeline
        .upload(filename, &bytes)
        .await
        .map_err(|error| error.to_string())
}
