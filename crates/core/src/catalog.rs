use crate::error::PipelineError;
use crate::models::DocumentSummary;
use crate::traits::DocumentStore;
use futures::future::try_join_all;

/// Every stored document, newest first, with its stored chunk count.
pub async fn list_documents_with_counts(
    store: &dyn DocumentStore,
) -> Result<Vec<DocumentSummary>, PipelineError> {
    let documents = store.list_documents().await?;

    let counts = try_join_all(
        documents
            .iter()
            .map(|document| store.count_chunks(&document.document_id)),
    )
    .await?;

    Ok(documents
        .into_iter()
        .zip(counts)
        .map(|(document, chunk_count)| DocumentSummary {
            document_id: document.document_id,
            filename: document.filename,
            uploaded_at: document.uploaded_at,
            chunk_count,
        })
        .collect())
}
