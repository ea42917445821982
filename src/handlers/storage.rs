use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use mime_guess::MimeGuess;

use crate::error::{AppError, Result};
use crate::AppState;

/// Public photo URL
/// GET /api/v1/storage/:bucket/*key
pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response> {
    if bucket != state.bucket.name() {
        return Err(AppError::NotFound(format!("Bucket not found: {}", bucket)));
    }

    let data = state.bucket.download(&key).await?;
    let mime = MimeGuess::from_path(&key).first_or_octet_stream();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::CONTENT_LENGTH, data.len())
        .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable")
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}
