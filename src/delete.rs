//! Delete endpoint: removes a previously uploaded object by storage key.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Json};
use axum::response::Json as JsonResponse;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::store::ObjectStore;

/// Wire shape shared by the endpoint and the client engine. The key is
/// optional so that a client holding no key serializes `null` and gets the
/// missing-parameter rejection instead of a serialization error.
#[derive(Serialize, Deserialize)]
pub(crate) struct DeleteRequest {
    pub(crate) key: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct DeleteResponse {
    pub(crate) message: String,
}

/// `DELETE /api/s3/delete` — delete one object.
///
/// Nonexistent keys are not specially detected; the provider's
/// idempotent-delete semantics apply.
pub async fn delete_object(
    Extension(store): Extension<Arc<dyn ObjectStore>>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<JsonResponse<DeleteResponse>, ApiError> {
    let Json(payload) =
        payload.map_err(|_| ApiError::BadRequest("Invalid request body".into()))?;
    let key = payload.key.as_deref().map(str::trim).unwrap_or_default();
    if key.is_empty() {
        return Err(ApiError::BadRequest("Key is required".into()));
    }

    store.delete(key).await?;
    info!(key, "deleted object");

    Ok(JsonResponse(DeleteResponse {
        message: "File deleted successfully".to_string(),
    }))
}
