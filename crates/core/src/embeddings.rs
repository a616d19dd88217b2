use crate::error::EmbedError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

/// Output size of `sentence-transformers/all-MiniLM-L6-v2`.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

pub const DEFAULT_EMBEDDING_URL: &str =
    "https://api-inference.huggingface.co/pipeline/feature-extraction/sentence-transformers/all-MiniLM-L6-v2";

/// Text to fixed-length, L2-normalized vector.
///
/// The same embedder must be used for chunk storage and for query encoding,
/// otherwise dot-product similarity is meaningless.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

pub fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}

/// Offline embedder hashing character trigrams into buckets.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.embed_sync(text))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingApi {
    /// `{"inputs": text}` feature-extraction endpoints.
    FeatureExtraction,
    /// `{"model": .., "input": text}` OpenAI-compatible `/embeddings` endpoints.
    OpenAi,
}

/// Embedder backed by a hosted embedding endpoint.
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    api: EmbeddingApi,
    model: Option<String>,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(endpoint: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
            api: EmbeddingApi::FeatureExtraction,
            model: None,
            dimensions,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    pub fn with_openai_model(mut self, model: impl Into<String>) -> Self {
        self.api = EmbeddingApi::OpenAi;
        self.model = Some(model.into());
        self
    }

    fn request_body(&self, text: &str) -> Value {
        match self.api {
            EmbeddingApi::FeatureExtraction => json!({
                "inputs": text,
                "options": { "wait_for_model": true },
            }),
            EmbeddingApi::OpenAi => json!({
                "model": self.model,
                "input": text,
            }),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        debug!(endpoint = %self.endpoint, text_len = text.len(), "embedding text");

        let mut request = self.client.post(&self.endpoint).json(&self.request_body(text));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(EmbedError::Provider {
                status: status.as_u16(),
                details,
            });
        }

        let payload: Value = response.json().await?;
        let mut vector = parse_embedding(&payload)?;
        l2_normalize(&mut vector);
        Ok(vector)
    }
}

/// Accepts `[f, ..]`, `[[f, ..]]`, `{"embedding": [..]}` and `{"data": [{"embedding": [..]}]}`.
pub fn parse_embedding(payload: &Value) -> Result<Vec<f32>, EmbedError> {
    let candidate = payload
        .pointer("/data/0/embedding")
        .or_else(|| payload.get("embedding"))
        .unwrap_or(payload);

    let list = match candidate.as_array() {
        Some(list) => list,
        None => {
            return Err(EmbedError::MalformedResponse(
                "expected an array of numbers".to_string(),
            ))
        }
    };

    let flat = match list.first() {
        Some(Value::Array(inner)) if list.len() == 1 => inner,
        Some(Value::Array(_)) => {
            return Err(EmbedError::MalformedResponse(format!(
                "expected one pooled vector, got {} nested vectors",
                list.len()
            )))
        }
        _ => list,
    };

    if flat.is_empty() {
        return Err(EmbedError::MalformedResponse(
            "embedding vector was empty".to_string(),
        ));
    }

    flat.iter()
        .map(|value| {
            value.as_f64().map(|number| number as f32).ok_or_else(|| {
                EmbedError::MalformedResponse(format!("non-numeric component: {value}"))
            })
        })
        .collect()
}
