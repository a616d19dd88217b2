//! Supabase (PostgREST) backed document store and similarity search.
//!
//! Expects a metadata table (`document_id`, `filename`, `uploaded_at`), a chunk
//! table (`document_id`, `chunk_index`, `content`, `embedding vector(384)`,
//! `created_at`) and a SQL function taking `query_embedding`, `match_threshold`
//! and `match_count` that returns `content`, `filename`, `similarity` and
//! optionally `document_id`.

use crate::error::StoreError;
use crate::models::{ChunkRecord, DocumentRecord, SimilarityMatch};
use crate::traits::{DocumentStore, SimilaritySearch};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

const BACKEND: &str = "supabase";
/// Rows requested per page; PostgREST may still return fewer (`max-rows`).
const PAGE_SIZE: usize = 1_000;

pub struct SupabaseStore {
    client: Client,
    base_url: Url,
    api_key: String,
    documents_table: String,
    chunks_table: String,
    match_function: String,
}

impl SupabaseStore {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, StoreError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            api_key: api_key.into(),
            documents_table: "documents".to_string(),
            chunks_table: "document_chunks".to_string(),
            match_function: "match_documents".to_string(),
        })
    }

    pub fn with_tables(
        mut self,
        documents_table: impl Into<String>,
        chunks_table: impl Into<String>,
    ) -> Self {
        self.documents_table = documents_table.into();
        self.chunks_table = chunks_table.into();
        self
    }

    pub fn with_match_function(mut self, match_function: impl Into<String>) -> Self {
        self.match_function = match_function.into();
        self
    }

    fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        Ok(self.base_url.join(&format!("rest/v1/{table}"))?)
    }

    fn rpc_url(&self) -> Result<Url, StoreError> {
        Ok(self
            .base_url
            .join(&format!("rest/v1/rpc/{}", self.match_function))?)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn documents_page_request(&self, offset: usize) -> Result<RequestBuilder, StoreError> {
        Ok(self
            .client
            .get(self.table_url(&self.documents_table)?)
            .query(&[
                ("select", "document_id,filename,uploaded_at"),
                ("order", "uploaded_at.desc,document_id.asc"),
            ])
            .query(&[("limit", PAGE_SIZE), ("offset", offset)]))
    }

    fn count_request(&self, document_id: &str) -> Result<RequestBuilder, StoreError> {
        let filter = format!("eq.{document_id}");
        Ok(self
            .client
            .get(self.table_url(&self.chunks_table)?)
            .header("Prefer", "count=exact")
            .query(&[
                ("select", "chunk_index"),
                ("document_id", filter.as_str()),
                ("limit", "0"),
            ]))
    }

    async fn rows(&self, request: RequestBuilder) -> Result<Vec<Value>, StoreError> {
        let response = checked(self.authorized(request).send().await?).await?;
        let parsed: Value = response.json().await?;
        match parsed {
            Value::Array(rows) => Ok(rows),
            other => Err(StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("expected a row array, got {other}"),
            }),
        }
    }
}

async fn checked(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(StoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details: if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {body}")
        },
    })
}

#[async_trait]
impl DocumentStore for SupabaseStore {
    async fn insert_document(&self, document: &DocumentRecord) -> Result<bool, StoreError> {
        let request = self
            .client
            .post(self.table_url(&self.documents_table)?)
            .header("Prefer", "return=representation")
            .json(document);

        let stored = self.rows(request).await?;
        debug!(document_id = %document.document_id, rows = stored.len(), "inserted document metadata");
        Ok(!stored.is_empty())
    }

    async fn insert_chunk(&self, chunk: &ChunkRecord) -> Result<(), StoreError> {
        let request = self
            .client
            .post(self.table_url(&self.chunks_table)?)
            .header("Prefer", "return=minimal")
            .json(chunk);

        checked(self.authorized(request).send().await?).await?;
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let mut documents: Vec<DocumentRecord> = Vec::new();
        loop {
            let page = self
                .rows(self.documents_page_request(documents.len())?)
                .await?;
            if page.is_empty() {
                break;
            }
            for row in page {
                documents.push(serde_json::from_value(row)?);
            }
        }

        debug!(documents = documents.len(), "listed documents");
        Ok(documents)
    }

    async fn count_chunks(&self, document_id: &str) -> Result<usize, StoreError> {
        let response = checked(
            self.authorized(self.count_request(document_id)?)
                .send()
                .await?,
        )
        .await?;

        let header = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        content_range_total(header).ok_or_else(|| StoreError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!("missing exact count in content-range: {header:?}"),
        })
    }

    async fn chunk_exists_any(&self) -> Result<bool, StoreError> {
        let request = self
            .client
            .get(self.table_url(&self.chunks_table)?)
            .query(&[("select", "document_id"), ("limit", "1")]);

        Ok(!self.rows(request).await?.is_empty())
    }
}

#[async_trait]
impl SimilaritySearch for SupabaseStore {
    async fn match_chunks(
        &self,
        query_embedding: &[f32],
        match_threshold: f64,
        match_count: usize,
    ) -> Result<Vec<SimilarityMatch>, StoreError> {
        let request = self.client.post(self.rpc_url()?).json(&json!({
            "query_embedding": query_embedding,
            "match_threshold": match_threshold,
            "match_count": match_count,
        }));

        self.rows(request)
            .await?
            .into_iter()
            .map(parse_match)
            .collect()
    }
}

/// Total from a PostgREST `Content-Range` such as `0-24/25` or `*/0`.
fn content_range_total(header: &str) -> Option<usize> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

fn parse_match(row: Value) -> Result<SimilarityMatch, StoreError> {
    let similarity = row
        .pointer("/similarity")
        .and_then(Value::as_f64)
        .ok_or_else(|| StoreError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!("match row without numeric similarity: {row}"),
        })?;
    let content = row
        .pointer("/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let filename = row
        .pointer("/filename")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let document_id = row
        .pointer("/document_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(SimilarityMatch {
        content,
        filename,
        similarity,
        document_id,
    })
}
