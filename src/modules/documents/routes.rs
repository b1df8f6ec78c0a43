use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::app_state::AppState;
use super::handlers::{
    download_document, get_document, list_documents, list_expiring_documents,
    list_worker_documents, review_document, upload_document,
};

/// Room for the multipart framing and text fields around the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn document_routes(max_file_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(list_documents))
        .route(
            "/upload",
            post(upload_document)
                .layer(DefaultBodyLimit::max(max_file_size.saturating_add(MULTIPART_OVERHEAD))),
        )
        .route("/expiring", get(list_expiring_documents))
        .route("/worker/{worker_id}", get(list_worker_documents))
        .route("/{id}", get(get_document).patch(review_document))
        .route("/{id}/file", get(download_document))
}
