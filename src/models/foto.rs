use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Photo attached to an inspection (table `vistoria_fotos`)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VistoriaFoto {
    pub id: String,
    pub vistoria_id: String,
    pub arquivo_url: String,
    #[serde(skip_serializing, default)]
    pub storage_path: String,
    pub legenda: String,
    pub ordem: i64,
    pub tamanho_arquivo: i64,
    pub tipo_arquivo: String,
    pub created_at: String,
}

/// Photo bytes plus metadata, as received from a multipart upload
#[derive(Debug, Clone)]
pub struct FotoUpload {
    pub legenda: String,
    pub ordem: i64,
    pub mime: String,
    pub data: bytes::Bytes,
    /// Stamp the GPS/timestamp overlay before storing
    pub stamp: bool,
}

/// File extension for a stored photo, derived from its MIME type
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime.split(';').next().unwrap_or("").trim() {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("image/webp; charset=binary"), "webp");
        assert_eq!(extension_for_mime(""), "jpg");
    }
}
