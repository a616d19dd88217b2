use anyhow::Context;
use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pdf_chat_core::{
    list_documents_with_counts, ChatAnswer, ChatCoordinator, DocumentStore, DocumentSummary,
    PipelineError, UploadPipeline, UploadReport,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub uploads: Arc<UploadPipeline>,
    pub chat: Arc<ChatCoordinator>,
    pub store: Arc<dyn DocumentStore>,
}

#[derive(Debug)]
pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        Self(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(PipelineError::client(rejection.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self(PipelineError::client(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self.0 {
            PipelineError::Client { reason } => (StatusCode::BAD_REQUEST, reason),
            PipelineError::Server { cause } => {
                error!(%cause, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, cause)
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    question: String,
}

#[derive(Debug, Serialize)]
struct DocumentListResponse {
    count: usize,
    documents: Vec<DocumentSummary>,
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/upload/", post(upload))
        .route("/chat", post(chat))
        .route("/chat/", post(chat))
        .route("/chat/documents", get(documents))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn serve(bind: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(%bind, "listening");

    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to PDF Chatbot API!" }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadReport>, ApiError> {
    let mut multipart = multipart?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| PipelineError::client(format!("Invalid upload body: {error}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|error| PipelineError::client(format!("Could not read upload: {error}")))?;

        let report = state.uploads.upload(&filename, &bytes).await?;
        return Ok(Json(report));
    }

    Err(PipelineError::client("No file uploaded").into())
}

async fn chat(
    State(state): State<AppState>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatAnswer>, ApiError> {
    let Json(request) = request?;
    Ok(Json(state.chat.ask(&request.question).await?))
}

async fn documents(State(state): State<AppState>) -> Result<Json<DocumentListResponse>, ApiError> {
    let documents = list_documents_with_counts(state.store.as_ref()).await?;
    Ok(Json(DocumentListResponse {
        count: documents.len(),
        documents,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use pdf_chat_core::{
        AnswerSynthesizer, CharacterNgramEmbedder, CompletionError, InMemoryStore, IngestError,
        PageText, PdfExtractor, SimilarityMatch, SimilaritySearch, StoreError,
        NO_DOCUMENTS_MESSAGE,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "pdfchatboundary";

    struct FixedText(&'static str);

    impl PdfExtractor for FixedText {
        fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
            Ok(vec![PageText {
                number: 1,
                text: self.0.to_string(),
            }])
        }
    }

    struct StubSynthesizer;

    #[async_trait]
    impl AnswerSynthesizer for StubSynthesizer {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, CompletionError> {
            Ok("The pump runs at forty psi.".to_string())
        }
    }

    struct UnreachableSearch;

    #[async_trait]
    impl SimilaritySearch for UnreachableSearch {
        async fn match_chunks(
            &self,
            _query_embedding: &[f32],
            _match_threshold: f64,
            _match_count: usize,
        ) -> Result<Vec<SimilarityMatch>, StoreError> {
            Err(StoreError::BackendResponse {
                backend: "supabase".to_string(),
                details: "503 Service Unavailable".to_string(),
            })
        }
    }

    fn test_router() -> Router {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(CharacterNgramEmbedder::default());

        let uploads = UploadPipeline::new(store.clone(), embedder.clone())
            .with_extractor(Arc::new(FixedText("The hydraulic pump pressure is forty psi.")));
        let chat = ChatCoordinator::new(
            embedder,
            store.clone(),
            store.clone(),
            Arc::new(StubSynthesizer),
        );

        app_router(AppState {
            uploads: Arc::new(uploads),
            chat: Arc::new(chat),
            store,
        })
    }

    fn multipart_request(filename: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/pdf\r\n\r\n\
             %PDF-1.4 test\r\n\
             --{BOUNDARY}--\r\n"
        );

        Request::builder()
            .method("POST")
            .uri("/upload/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn chat_request(question: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat/")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "question": question }).to_string()))
            .unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn index_greets() {
        let router = test_router();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Welcome to PDF Chatbot API!");
    }

    #[tokio::test]
    async fn non_pdf_upload_is_bad_request() {
        let router = test_router();
        let (status, body) = send(&router, multipart_request("notes.txt")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Please upload a PDF file");
    }

    #[tokio::test]
    async fn empty_question_is_bad_request() {
        let router = test_router();
        let (status, body) = send(&router, chat_request("  ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Question cannot be empty");
    }

    #[tokio::test]
    async fn question_without_field_is_bad_request_with_detail() {
        let router = test_router();
        let request = Request::builder()
            .method("POST")
            .uri("/chat/")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("question"));
    }

    #[tokio::test]
    async fn upload_without_multipart_body_is_bad_request_with_detail() {
        let router = test_router();
        let request = Request::builder()
            .method("POST")
            .uri("/upload/")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn search_failure_is_server_error_with_cause() {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(CharacterNgramEmbedder::default());
        let chat = ChatCoordinator::new(
            embedder.clone(),
            Arc::new(UnreachableSearch),
            store.clone(),
            Arc::new(StubSynthesizer),
        );
        let router = app_router(AppState {
            uploads: Arc::new(UploadPipeline::new(store.clone(), embedder)),
            chat: Arc::new(chat),
            store,
        });

        let (status, body) = send(&router, chat_request("what pressure?")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .contains("503 Service Unavailable"));
    }

    #[tokio::test]
    async fn question_before_any_upload_reports_no_documents() {
        let router = test_router();
        let (status, body) = send(&router, chat_request("what pressure?")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], NO_DOCUMENTS_MESSAGE);
        assert_eq!(body["matches"], 0);
        assert!(body["top_similarity"].is_null());
    }

    #[tokio::test]
    async fn upload_then_list_then_ask() {
        let router = test_router();

        let (status, body) = send(&router, multipart_request("pump.pdf")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["chunks"], 1);
        assert_eq!(body["filename"], "pump.pdf");

        let request = Request::builder()
            .uri("/chat/documents")
            .body(Body::empty())
            .unwrap();
        let (status, listing) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listing["count"], 1);
        assert_eq!(listing["documents"][0]["chunk_count"], 1);
        assert_eq!(listing["documents"][0]["document_id"], body["document_id"]);

        let (status, answer) = send(&router, chat_request("hydraulic pump pressure")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answer["answer"], "The pump runs at forty psi.");
        assert_eq!(answer["matches"], 1);
        assert_eq!(answer["sources"], json!(["pump.pdf"]));
        assert!(answer["top_similarity"].as_f64().unwrap() > 0.1);
    }
}
