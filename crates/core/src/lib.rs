pub mod catalog;
pub mod chunking;
pub mod completion;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod stores;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::list_documents_with_counts;
pub use chunking::{chunk_by_words, normalize_whitespace, ChunkingConfig, DEFAULT_WORDS_PER_CHUNK};
pub use completion::{ChatCompletionClient, DEFAULT_COMPLETION_MODEL, DEFAULT_COMPLETION_URL};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_EMBEDDING_URL,
};
pub use error::{
    ChunkError, CompletionError, EmbedError, IngestError, PipelineError, StoreError,
};
pub use extractor::{join_pages, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{
    discover_pdf_files, ingest_folder_best_effort, is_pdf_filename, BatchOutcome, ChunkFailure,
    IngestionReport, SkippedPdf, UploadPipeline,
};
pub use models::{
    ChatAnswer, ChunkRecord, DocumentRecord, DocumentSummary, RetrievalConfig, SimilarityMatch,
    UploadReport,
};
pub use orchestrator::{
    ChatCoordinator, NO_DOCUMENTS_MESSAGE, NO_MATCH_MESSAGE, SYSTEM_PROMPT,
};
pub use stores::{InMemoryStore, SupabaseStore};
pub use traits::{AnswerSynthesizer, DocumentStore, SimilaritySearch};
