pub mod local;
pub mod provider;

pub use local::*;
pub use provider::*;

use bytes::Bytes;

use crate::config::Config;
use crate::error::Result;

/// Public photo bucket: a storage provider plus the URL scheme used to reach it
pub struct PhotoBucket {
    provider: Box<dyn StorageProvider>,
    name: String,
    public_base: String,
}

impl PhotoBucket {
    pub fn new(provider: Box<dyn StorageProvider>, name: &str, public_base: &str) -> Self {
        Self {
            provider,
            name: name.to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    /// Bucket backed by the configured local directory
    pub fn from_config(config: &Config) -> Self {
        let root = std::path::Path::new(&config.storage.local_path).join(&config.storage.bucket);
        tracing::info!("Photo bucket '{}' stored in {:?}", config.storage.bucket, root);
        Self::new(
            Box::new(LocalStorage::new(root)),
            &config.storage.bucket,
            &config.server.public_url,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Object key for a photo: `{user_id}/{vistoria_id}/{timestamp}-{ordem}.{ext}`
    pub fn photo_key(user_id: &str, vistoria_id: &str, timestamp_millis: i64, ordem: i64, ext: &str) -> String {
        format!("{}/{}/{}-{}.{}", user_id, vistoria_id, timestamp_millis, ordem, ext)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/api/v1/storage/{}/{}", self.public_base, self.name, key)
    }

    pub async fn upload(&self, key: &str, data: Bytes) -> Result<String> {
        self.provider.put(key, data).await?;
        tracing::debug!(
            "Uploaded {} to bucket {} ({})",
            key,
            self.name,
            self.provider.storage_type()
        );
        Ok(self.public_url(key))
    }

    pub async fn download(&self, key: &str) -> Result<Bytes> {
        self.provider.get(key).await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.provider.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_key_layout() {
        assert_eq!(
            PhotoBucket::photo_key("user-1", "vis-9", 1715700000123, 2, "jpg"),
            "user-1/vis-9/1715700000123-2.jpg"
        );
    }

    #[tokio::test]
    async fn test_upload_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = PhotoBucket::new(
            Box::new(LocalStorage::new(dir.path())),
            "vistoria-fotos",
            "https://obras.example.org/",
        );

        let url = bucket
            .upload("u/v/1-1.jpg", Bytes::from_static(b"data"))
            .await
            .unwrap();
        assert_eq!(
            url,
            "https://obras.example.org/api/v1/storage/vistoria-fotos/u/v/1-1.jpg"
        );
        assert_eq!(bucket.download("u/v/1-1.jpg").await.unwrap().as_ref(), b"data");

        bucket.remove("u/v/1-1.jpg").await.unwrap();
        assert!(bucket.download("u/v/1-1.jpg").await.is_err());
    }
}
