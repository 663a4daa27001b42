//! Embedded landing page, the shell the gateway serves at its root.

use axum::body::Body as AxumBody;
use axum::http::{HeaderValue, Request, header};
use axum::response::{IntoResponse, Response};
use rust_embed::RustEmbed;

use crate::error::ApiError;

#[derive(RustEmbed)]
#[folder = "static"]
struct ShellAssets;

/// Fallback handler: serve the landing page and any embedded asset.
pub async fn serve_shell(req: Request<AxumBody>) -> Result<Response, ApiError> {
    let path = req.uri().path().trim_start_matches('/');
    let requested = if path.is_empty() { "index.html" } else { path };
    let Some(asset) = ShellAssets::get(requested) else {
        return Err(ApiError::NotFound("not found".into()));
    };

    let mime = mime_guess::from_path(requested).first_or_octet_stream();
    let content_type = HeaderValue::from_str(mime.essence_str())
        .map_err(|_| ApiError::Internal("invalid mime type".into()))?;
    Ok((
        [(header::CONTENT_TYPE, content_type)],
        AxumBody::from(asset.data.into_owned()),
    )
        .into_response())
}
