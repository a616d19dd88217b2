use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding provider returned {status}: {details}")]
    Provider { status: u16, details: String },

    #[error("embedding response was malformed: {0}")]
    MalformedResponse(String),

    #[error("embedding has dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion provider returned {status}: {details}")]
    Provider { status: u16, details: String },

    #[error("completion response had no choices")]
    EmptyResponse,
}

/// Why a single chunk was skipped during upload.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("embedding failed: {0}")]
    Embed(#[from] EmbedError),

    #[error("storing chunk failed: {0}")]
    Store(#[from] StoreError),
}

/// Outcome classes surfaced by the upload and query pipelines.
///
/// `Client` maps to a 4xx response and carries a human-readable reason;
/// `Server` maps to a 5xx response and carries the underlying cause.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("{reason}")]
    Client { reason: String },

    #[error("{cause}")]
    Server { cause: String },
}

impl PipelineError {
    pub fn client(reason: impl Into<String>) -> Self {
        Self::Client {
            reason: reason.into(),
        }
    }

    pub fn server(cause: impl Into<String>) -> Self {
        Self::Server {
            cause: cause.into(),
        }
    }

    pub fn is_client(&self) -> bool {
        matches!(self, Self::Client { .. })
    }
}

impl From<EmbedError> for PipelineError {
    fn from(error: EmbedError) -> Self {
        Self::server(error.to_string())
    }
}

impl From<StoreError> for PipelineError {
    fn from(error: StoreError) -> Self {
        Self::server(error.to_string())
    }
}

impl From<CompletionError> for PipelineError {
    fn from(error: CompletionError) -> Self {
        Self::server(error.to_string())
    }
}
