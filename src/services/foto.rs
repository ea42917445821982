use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{extension_for_mime, FotoUpload, VistoriaFoto};
use crate::photo::OverlayStamper;
use crate::services::VistoriaService;
use crate::storage::PhotoBucket;

pub struct FotoService;

impl FotoService {
    /// Store a photo in the bucket and attach it to one of the user's records
    pub async fn upload(
        db: &Database,
        bucket: &PhotoBucket,
        stamper: &OverlayStamper,
        user_id: &str,
        vistoria_id: &str,
        upload: FotoUpload,
    ) -> Result<VistoriaFoto> {
        let vistoria = VistoriaService::get(db, user_id, vistoria_id).await?;

        if upload.data.is_empty() {
            return Err(AppError::BadRequest("Empty photo".to_string()));
        }
        if upload.ordem < 1 {
            return Err(AppError::BadRequest("ordem must be at least 1".to_string()));
        }

        let (data, mime) = if upload.stamp {
            let stamped = stamper
                .stamp(
                    &upload.data,
                    vistoria.position(),
                    chrono::Local::now().naive_local(),
                )
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            (bytes::Bytes::from(stamped), "image/jpeg".to_string())
        } else {
            (upload.data, upload.mime)
        };

        let now = Utc::now();
        let key = PhotoBucket::photo_key(
            user_id,
            vistoria_id,
            now.timestamp_millis(),
            upload.ordem,
            extension_for_mime(&mime),
        );
        let size = data.len() as i64;
        let url = bucket.upload(&key, data).await?;

        let foto = VistoriaFoto {
            id: Uuid::new_v4().to_string(),
            vistoria_id: vistoria_id.to_string(),
            arquivo_url: url,
            storage_path: key,
            legenda: upload.legenda.trim().to_string(),
            ordem: upload.ordem,
            tamanho_arquivo: size,
            tipo_arquivo: mime,
            created_at: now.to_rfc3339(),
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO vistoria_fotos (id, vistoria_id, arquivo_url, storage_path, legenda, ordem, tamanho_arquivo, tipo_arquivo, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&foto.id)
        .bind(&foto.vistoria_id)
        .bind(&foto.arquivo_url)
        .bind(&foto.storage_path)
        .bind(&foto.legenda)
        .bind(foto.ordem)
        .bind(foto.tamanho_arquivo)
        .bind(&foto.tipo_arquivo)
        .bind(&foto.created_at)
        .execute(db.pool())
        .await;

        if let Err(e) = inserted {
            if let Err(cleanup) = bucket.remove(&foto.storage_path).await {
                tracing::warn!("Failed to remove orphaned photo {}: {}", foto.storage_path, cleanup);
            }
            return Err(e.into());
        }

        tracing::debug!("Photo {} attached to vistoria {}", foto.ordem, vistoria_id);
        Ok(foto)
    }

    /// Photos of a record in display order, with their stored bytes
    pub async fn load_all(
        db: &Database,
        bucket: &PhotoBucket,
        vistoria_id: &str,
    ) -> Result<Vec<(VistoriaFoto, Option<bytes::Bytes>)>> {
        let fotos: Vec<VistoriaFoto> = sqlx::query_as(
            "SELECT * FROM vistoria_fotos WHERE vistoria_id = ? ORDER BY ordem ASC, created_at ASC",
        )
        .bind(vistoria_id)
        .fetch_all(db.pool())
        .await?;

        let mut loaded = Vec::with_capacity(fotos.len());
        for foto in fotos {
            let data = match bucket.download(&foto.storage_path).await {
                Ok(data) => Some(data),
                Err(e) => {
                    tracing::warn!("Photo {} unavailable: {}", foto.storage_path, e);
                    None
                }
            };
            loaded.push((foto, data));
        }
        Ok(loaded)
    }
}
