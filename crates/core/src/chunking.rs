use crate::error::IngestError;

pub const DEFAULT_WORDS_PER_CHUNK: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub words_per_chunk: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            words_per_chunk: DEFAULT_WORDS_PER_CHUNK,
        }
    }
}

impl ChunkingConfig {
    pub fn new(words_per_chunk: usize) -> Result<Self, IngestError> {
        if words_per_chunk == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "words_per_chunk must be greater than zero".to_string(),
            ));
        }
        Ok(Self { words_per_chunk })
    }
}

/// Collapses every whitespace run (including page breaks and NBSP) to a single space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits text into consecutive, non-overlapping windows of `words_per_chunk` words.
///
/// Words are whitespace-delimited; each window is rejoined with single spaces and
/// the last window may be shorter. Empty input yields no chunks.
pub fn chunk_by_words(text: &str, config: ChunkingConfig) -> Vec<String> {
    let words = text.split_whitespace().collect::<Vec<_>>();
    let size = config.words_per_chunk.max(1);

    words
        .chunks(size)
        .map(|window| window.join(" "))
        .filter(|chunk| !chunk.trim().is_empty())
        .collect()
}
