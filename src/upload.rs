//! Upload-URL endpoint: validates the request body and issues a time-boxed
//! presigned PUT URL for a freshly generated storage key.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Json};
use axum::response::Json as JsonResponse;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::ApiError;
use crate::store::{ObjectStore, unique_key};

#[derive(Debug)]
pub struct TicketConfig {
    pub presign_ttl: Duration,
}

/// Wire shape shared by the endpoint and the client engine.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadTicketRequest {
    pub(crate) file_name: String,
    pub(crate) content_type: String,
    pub(crate) size: u64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadTicketResponse {
    pub(crate) presigned_url: String,
    pub(crate) key: String,
}

/// `POST /api/s3/upload` — issue `{presignedUrl, key}` for one upload.
///
/// No bytes move through this endpoint; the only side effect is the
/// URL-generation call against the provider.
pub async fn create_upload_url(
    Extension(store): Extension<Arc<dyn ObjectStore>>,
    Extension(ticket): Extension<Arc<TicketConfig>>,
    payload: Result<Json<UploadTicketRequest>, JsonRejection>,
) -> Result<JsonResponse<UploadTicketResponse>, ApiError> {
    let Json(payload) =
        payload.map_err(|_| ApiError::BadRequest("Invalid request body".into()))?;
    let file_name = payload.file_name.trim();
    if file_name.is_empty() {
        return Err(ApiError::BadRequest("Invalid request body".into()));
    }

    let key = unique_key(file_name);
    let presigned_url = store
        .presign_put(&key, &payload.content_type, payload.size, ticket.presign_ttl)
        .await?;
    info!(
        key,
        size = payload.size,
        content_type = payload.content_type,
        "issued upload url"
    );

    Ok(JsonResponse(UploadTicketResponse { presigned_url, key }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::routing::post;
    use tower::ServiceExt;

    use crate::store::testing::MockStore;

    fn make_ticket() -> Arc<TicketConfig> {
        Arc::new(TicketConfig {
            presign_ttl: Duration::from_secs(300),
        })
    }

    fn make_request(payload: UploadTicketRequest) -> Result<Json<UploadTicketRequest>, JsonRejection> {
        Ok(Json(payload))
    }

    fn make_router(store: Arc<MockStore>) -> Router {
        let store: Arc<dyn ObjectStore> = store;
        Router::new()
            .route("/api/s3/upload", post(create_upload_url))
            .layer(Extension(store))
            .layer(Extension(make_ticket()))
    }

    #[tokio::test]
    async fn identical_requests_get_distinct_keys() {
        let store = Arc::new(MockStore::new("https://storage.test"));
        let dyn_store: Arc<dyn ObjectStore> = store.clone();

        let mut keys = Vec::new();
        for _ in 0..2 {
            let JsonResponse(response) = create_upload_url(
                Extension(dyn_store.clone()),
                Extension(make_ticket()),
                make_request(UploadTicketRequest {
                    file_name: "photo.png".to_string(),
                    content_type: "image/png".to_string(),
                    size: 1024,
                }),
            )
            .await
            .unwrap_or_else(|_| panic!("create upload url failed"));
            assert!(response.presigned_url.contains(&response.key));
            keys.push(response.key);
        }

        assert_ne!(keys[0], keys[1]);
        assert_eq!(store.presign_calls(), 2);
    }

    #[tokio::test]
    async fn missing_field_is_rejected_without_provider_call() {
        let store = Arc::new(MockStore::new("https://storage.test"));
        let app = make_router(store.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/s3/upload")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"fileName":"photo.png","size":1024}"#))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert!(response.status().is_client_error());
        assert_eq!(store.presign_calls(), 0);
    }

    #[tokio::test]
    async fn empty_file_name_is_rejected() {
        let store = Arc::new(MockStore::new("https://storage.test"));
        let dyn_store: Arc<dyn ObjectStore> = store.clone();

        let result = create_upload_url(
            Extension(dyn_store),
            Extension(make_ticket()),
            make_request(UploadTicketRequest {
                file_name: "   ".to_string(),
                content_type: "image/png".to_string(),
                size: 1024,
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert_eq!(store.presign_calls(), 0);
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_server_error() {
        let store = Arc::new(MockStore::new("https://storage.test"));
        store
            .fail_presign
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let app = make_router(store);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/s3/upload")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"fileName":"photo.png","contentType":"image/png","size":1024}"#,
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(value["error"], "presign unavailable");
    }

    #[tokio::test]
    async fn success_uses_wire_field_names() {
        let store = Arc::new(MockStore::new("https://storage.test"));
        let app = make_router(store);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/s3/upload")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"fileName":"notes.txt","contentType":"text/plain","size":12}"#,
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert!(value["presignedUrl"].as_str().is_some());
        assert!(value["key"].as_str().expect("key").ends_with("-notes.txt"));
    }
}
