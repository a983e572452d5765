use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::features::documents::handlers;
use crate::features::documents::services::{DocumentService, IngestionService};
use crate::shared::constants::MAX_UPLOAD_SIZE;

/// Create routes for the documents feature
///
/// Note: This feature requires authentication
pub fn routes(ingestion: Arc<IngestionService>, documents: Arc<DocumentService>) -> Router {
    let upload = Router::new()
        .route(
            "/api/documents/upload",
            // Room for multipart overhead on top of the largest accepted file
            post(handlers::upload_document)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE + 1024 * 1024)),
        )
        .with_state(ingestion);

    Router::new()
        .route(
            "/api/documents/{id}",
            get(handlers::get_document).delete(handlers::delete_document),
        )
        .with_state(documents)
        .merge(upload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ocr::services::TriggerDispatcher;
    use crate::shared::constants::MAX_FILE_NAME_LENGTH;
    use crate::shared::test_helpers::{
        create_test_user, test_log_sink, with_test_user, MemoryDocumentStore,
        MemoryObjectStorage, RecordingTrigger,
    };
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use serde_json::Value;

    struct Fixture {
        server: TestServer,
        storage: Arc<MemoryObjectStorage>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryDocumentStore::default());
        let storage = Arc::new(MemoryObjectStorage::default());
        let sink = test_log_sink();
        let dispatcher = TriggerDispatcher::new(Arc::new(RecordingTrigger::default()), sink.clone());
        let app = routes(
            Arc::new(IngestionService::new(
                store.clone(),
                storage.clone(),
                dispatcher,
                sink,
            )),
            Arc::new(DocumentService::new(store)),
        );
        let server = TestServer::new(with_test_user(app, create_test_user("owner-1"))).unwrap();

        Fixture { server, storage }
    }

    fn pdf_form(file_name: &str, data: Vec<u8>) -> MultipartForm {
        MultipartForm::new().add_text("title", "Invoice March").add_part(
            "file",
            Part::bytes(data)
                .file_name(file_name.to_string())
                .mime_type("application/pdf"),
        )
    }

    #[tokio::test]
    async fn test_upload_then_duplicate() {
        let f = fixture();
        let content = b"%PDF-1.7 invoice 2024-03".to_vec();

        let response = f
            .server
            .post("/api/documents/upload")
            .multipart(pdf_form("invoice.pdf", content.clone()))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["data"]["outcome"], "created");
        assert_eq!(body["data"]["document"]["ocr_status"], "none");

        let response = f
            .server
            .post("/api/documents/upload")
            .multipart(pdf_form("invoice-copy.pdf", content))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["outcome"], "duplicate_found");
        assert_eq!(body["data"]["existing"]["file_name"], "invoice.pdf");
        assert_eq!(f.storage.object_count(), 1);
    }

    #[tokio::test]
    async fn test_body_over_limit_is_file_too_large() {
        let f = fixture();

        let response = f
            .server
            .post("/api/documents/upload")
            .multipart(pdf_form("huge.pdf", vec![b'x'; MAX_UPLOAD_SIZE + 2 * 1024 * 1024]))
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);

        let body: Value = response.json();
        assert_eq!(body["errors"][0], "file_too_large");
        assert_eq!(f.storage.object_count(), 0);
    }

    #[tokio::test]
    async fn test_file_just_over_size_limit_is_file_too_large() {
        let f = fixture();

        let response = f
            .server
            .post("/api/documents/upload")
            .multipart(pdf_form("big.pdf", vec![b'x'; MAX_UPLOAD_SIZE + 1]))
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);

        let body: Value = response.json();
        assert_eq!(body["errors"][0], "file_too_large");
    }

    #[tokio::test]
    async fn test_overlong_file_name_is_rejected_before_storing() {
        let f = fixture();
        let file_name = format!("{}.pdf", "n".repeat(MAX_FILE_NAME_LENGTH));

        let response = f
            .server
            .post("/api/documents/upload")
            .multipart(pdf_form(&file_name, b"%PDF-1.7 named".to_vec()))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(body["errors"][0], "file_name_too_long");
        assert_eq!(f.storage.object_count(), 0);
    }
}
