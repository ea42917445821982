use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Extension,
};
use chrono::Local;

use crate::error::{AppError, Result};
use crate::models::CurrentUser;
use crate::report;
use crate::services::{FotoService, VistoriaService};
use crate::AppState;

/// Download the PDF report of a record
/// GET /api/v1/vistorias/:id/report
pub async fn download_report(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response> {
    let details = VistoriaService::details(&state.db, &current_user.id, &id).await?;
    let photos: Vec<_> = FotoService::load_all(&state.db, &state.bucket, &id)
        .await?
        .into_iter()
        .map(|(_, data)| data)
        .collect();

    let font = match &state.config.report.font_path {
        Some(path) => match tokio::fs::read(path).await {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!("Report font {} unavailable, using Helvetica: {}", path, e);
                None
            }
        },
        None => None,
    };

    let config = state.config.clone();
    let (rendered, nome_obra) = tokio::task::spawn_blocking(move || {
        report::generate(&config.report, &details, &photos, font.as_deref())
            .map(|r| (r, details.vistoria.nome_obra))
    })
    .await
    .map_err(|e| AppError::Internal(format!("Report task failed: {}", e)))?
    .map_err(|e| AppError::Internal(e.to_string()))?;

    let filename = report::report_filename(&nome_obra, Local::now().date_naive());
    tracing::info!("Generated report {} ({} page(s))", filename, rendered.pages);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_LENGTH, rendered.bytes.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(rendered.bytes))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}
