use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    Extension, Json,
};
use bytes::{Bytes, BytesMut};

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{CurrentUser, FotoUpload, VistoriaFoto};
use crate::services::FotoService;
use crate::AppState;

/// Attach a photo to a record
/// POST /api/v1/vistorias/:id/fotos
///
/// Multipart fields: `file` (required), `legenda`, `ordem` (1-based), `stamp` (`true` to
/// burn the GPS/date overlay in on the server)
pub async fn upload_foto(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(vistoria_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<VistoriaFoto>>> {
    let upload = read_upload(multipart).await?;

    let foto = FotoService::upload(
        &state.db,
        &state.bucket,
        &state.stamper,
        &current_user.id,
        &vistoria_id,
        upload,
    )
    .await?;

    Ok(Json(ApiResponse::success(foto)))
}

async fn field_text(field: Field<'_>, name: &str) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read field {}: {}", name, e)))
}

async fn read_upload(mut multipart: Multipart) -> Result<FotoUpload> {
    let mut data: Option<Bytes> = None;
    let mut mime: Option<String> = None;
    let mut legenda = String::new();
    let mut ordem: Option<i64> = None;
    let mut stamp = false;

    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("Failed to process multipart: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                mime = field.content_type().map(|s| s.to_string());
                let mut buf = BytesMut::new();
                while let Some(chunk) = field.chunk().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read file chunk: {}", e))
                })? {
                    buf.extend_from_slice(&chunk);
                }
                data = Some(buf.freeze());
            }
            "legenda" => {
                legenda = field_text(field, "legenda").await?;
            }
            "ordem" => {
                let text = field_text(field, "ordem").await?;
                ordem = Some(
                    text.trim()
                        .parse()
                        .map_err(|_| AppError::BadRequest(format!("Invalid ordem: {}", text)))?,
                );
            }
            "stamp" => {
                let text = field_text(field, "stamp").await?;
                stamp = matches!(text.trim(), "true" | "1" | "on");
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;
    let ordem = ordem.ok_or_else(|| AppError::BadRequest("ordem is required".to_string()))?;

    Ok(FotoUpload {
        legenda,
        ordem,
        mime: mime.unwrap_or_else(|| "image/jpeg".to_string()),
        data,
        stamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{header, Request};

    async fn multipart(body: &'static str) -> Multipart {
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=X")
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_read_upload_fields() {
        let body = "--X\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"f.png\"\r\n\
            Content-Type: image/png\r\n\r\n\
            PNGDATA\r\n\
            --X\r\n\
            Content-Disposition: form-data; name=\"legenda\"\r\n\r\n\
            Fachada norte\r\n\
            --X\r\n\
            Content-Disposition: form-data; name=\"ordem\"\r\n\r\n\
            2\r\n\
            --X\r\n\
            Content-Disposition: form-data; name=\"stamp\"\r\n\r\n\
            true\r\n\
            --X--\r\n";

        let upload = read_upload(multipart(body).await).await.unwrap();
        assert_eq!(upload.legenda, "Fachada norte");
        assert_eq!(upload.ordem, 2);
        assert_eq!(upload.mime, "image/png");
        assert_eq!(upload.data.as_ref(), b"PNGDATA");
        assert!(upload.stamp);
    }

    #[tokio::test]
    async fn test_truncated_text_field_is_bad_request() {
        // Body ends inside the legenda field, without a closing boundary
        let body = "--X\r\n\
            Content-Disposition: form-data; name=\"legenda\"\r\n\r\n\
            Fachada";

        let result = read_upload(multipart(body).await).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_missing_ordem_is_bad_request() {
        let body = "--X\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"f.jpg\"\r\n\r\n\
            JPEG\r\n\
            --X--\r\n";

        let result = read_upload(multipart(body).await).await;
        assert!(matches!(result, Err(AppError::BadRequest(msg)) if msg == "ordem is required"));
    }
}
