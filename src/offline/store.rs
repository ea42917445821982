use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

use super::queue::QueuedVistoria;
use super::Result;

/// Whole-list persistence for the offline queue
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn load(&self) -> Result<Vec<QueuedVistoria>>;
    async fn save(&self, entries: &[QueuedVistoria]) -> Result<()>;
}

/// Queue kept as one JSON array on disk
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl QueueStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<QueuedVistoria>> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&data)?)
    }

    async fn save(&self, entries: &[QueuedVistoria]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        // Readers never observe a half-written file
        let temp = self.temp_path();
        fs::write(&temp, serde_json::to_vec(entries)?).await?;
        fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryStore {
        entries: Mutex<Vec<QueuedVistoria>>,
    }

    #[async_trait]
    impl QueueStore for MemoryStore {
        async fn load(&self) -> Result<Vec<QueuedVistoria>> {
            Ok(self.entries.lock().await.clone())
        }

        async fn save(&self, entries: &[QueuedVistoria]) -> Result<()> {
            *self.entries.lock().await = entries.to_vec();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VistoriaForm;

    fn entry(id: &str) -> QueuedVistoria {
        QueuedVistoria {
            id: id.to_string(),
            data: VistoriaForm::default(),
            fotos: vec![],
            timestamp: 1,
            user_id: "u1".to_string(),
            synced: false,
        }
    }

    #[tokio::test]
    async fn test_missing_or_blank_file_is_empty_queue() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("queue.json"));
        assert!(store.load().await.unwrap().is_empty());

        std::fs::write(dir.path().join("queue.json"), "  \n").unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/queue.json"));

        store.save(&[entry("a"), entry("b")]).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].id, "b");
        assert!(!dir.path().join("nested/queue.json.tmp").exists());

        let raw = std::fs::read_to_string(dir.path().join("nested/queue.json")).unwrap();
        assert!(raw.contains("\"userId\":\"u1\""));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("queue.json"), "{not json").unwrap();
        let store = JsonFileStore::new(dir.path().join("queue.json"));
        assert!(matches!(
            store.load().await,
            Err(crate::offline::OfflineError::Json(_))
        ));
    }
}
