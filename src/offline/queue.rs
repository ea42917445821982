use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::store::QueueStore;
use super::Result;
use crate::models::VistoriaForm;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Photo waiting in the queue; bytes are kept base64-encoded in the JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedFoto {
    #[serde(default)]
    pub legenda: String,
    #[serde(default = "default_mime")]
    pub mime: String,
    pub data: String,
}

fn default_mime() -> String {
    "image/jpeg".to_string()
}

impl QueuedFoto {
    pub fn from_bytes(legenda: &str, mime: &str, data: &[u8]) -> Self {
        Self {
            legenda: legenda.to_string(),
            mime: mime.to_string(),
            data: STANDARD.encode(data),
        }
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(&self.data)?)
    }
}

/// One inspection saved while offline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedVistoria {
    pub id: String,
    pub data: VistoriaForm,
    #[serde(default)]
    pub fotos: Vec<QueuedFoto>,
    /// Unix millis at enqueue time
    pub timestamp: i64,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub synced: bool,
}

/// `offline_{unix_millis}_{9 base36 chars}`
pub fn new_queue_id(now_millis: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("offline_{}_{}", now_millis, suffix)
}

/// Offline queue shared by every user of this device.
///
/// Each mutation reloads the whole list, applies the change and writes it
/// back; the mutex serialises mutations within the process.
pub struct OfflineQueue {
    store: Arc<dyn QueueStore>,
    lock: Mutex<()>,
}

impl OfflineQueue {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub async fn enqueue(
        &self,
        user_id: &str,
        data: VistoriaForm,
        fotos: Vec<QueuedFoto>,
    ) -> Result<QueuedVistoria> {
        let _guard = self.lock.lock().await;

        let now = Utc::now().timestamp_millis();
        let entry = QueuedVistoria {
            id: new_queue_id(now),
            data,
            fotos,
            timestamp: now,
            user_id: user_id.to_string(),
            synced: false,
        };

        let mut entries = self.store.load().await?;
        entries.push(entry.clone());
        self.store.save(&entries).await?;

        tracing::info!(
            "Queued vistoria {} with {} photo(s) for later sync",
            entry.id,
            entry.fotos.len()
        );
        Ok(entry)
    }

    /// Unsynced entries of `user_id`, in insertion order
    pub async fn list_pending(&self, user_id: &str) -> Result<Vec<QueuedVistoria>> {
        let entries = self.store.load().await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.user_id == user_id && !e.synced)
            .collect())
    }

    pub async fn pending_count(&self, user_id: &str) -> Result<usize> {
        Ok(self.list_pending(user_id).await?.len())
    }

    /// Returns false when no entry has that id
    pub async fn mark_synced(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;

        let mut entries = self.store.load().await?;
        let mut found = false;
        for entry in entries.iter_mut().filter(|e| e.id == id) {
            entry.synced = true;
            found = true;
        }
        if found {
            self.store.save(&entries).await?;
        }
        Ok(found)
    }

    pub async fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;

        let mut entries = self.store.load().await?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if removed {
            self.store.save(&entries).await?;
        }
        Ok(removed)
    }

    /// Delete the synced entries of `user_id` along with their photo bytes
    pub async fn purge_synced(&self, user_id: &str) -> Result<usize> {
        let _guard = self.lock.lock().await;

        let mut entries = self.store.load().await?;
        let before = entries.len();
        entries.retain(|e| !(e.user_id == user_id && e.synced));
        let purged = before - entries.len();
        if purged > 0 {
            self.store.save(&entries).await?;
        }
        Ok(purged)
    }

    /// Drop every entry of `user_id`, leaving other users' entries alone
    pub async fn clear_user(&self, user_id: &str) -> Result<usize> {
        let _guard = self.lock.lock().await;

        let mut entries = self.store.load().await?;
        let before = entries.len();
        entries.retain(|e| e.user_id != user_id);
        let removed = before - entries.len();
        self.store.save(&entries).await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::store::memory::MemoryStore;
    use crate::offline::JsonFileStore;

    fn form(nome: &str) -> VistoriaForm {
        VistoriaForm {
            nome_obra: nome.to_string(),
            ..Default::default()
        }
    }

    fn queue() -> OfflineQueue {
        OfflineQueue::new(Arc::new(MemoryStore::default()))
    }

    #[test]
    fn test_queue_id_format() {
        let id = new_queue_id(1715700000123);
        let suffix = id.strip_prefix("offline_1715700000123_").unwrap();
        assert_eq!(suffix.len(), 9);
        assert!(suffix.bytes().all(|b| ID_ALPHABET.contains(&b)));
        assert_ne!(new_queue_id(1), new_queue_id(1));
    }

    #[test]
    fn test_foto_base64_roundtrip() {
        let foto = QueuedFoto::from_bytes("Fachada", "image/png", &[0, 1, 2, 255]);
        assert_eq!(foto.data, "AAEC/w==");
        assert_eq!(foto.bytes().unwrap(), vec![0, 1, 2, 255]);
    }

    #[tokio::test]
    async fn test_list_pending_only_current_user_unsynced() {
        let queue = queue();
        let a1 = queue.enqueue("ana", form("A1"), vec![]).await.unwrap();
        queue.enqueue("rui", form("R1"), vec![]).await.unwrap();
        let a2 = queue.enqueue("ana", form("A2"), vec![]).await.unwrap();
        queue.enqueue("ana", form("A3"), vec![]).await.unwrap();

        assert!(queue.mark_synced(&a2.id).await.unwrap());

        let pending = queue.list_pending("ana").await.unwrap();
        let names: Vec<_> = pending.iter().map(|e| e.data.nome_obra.as_str()).collect();
        assert_eq!(names, vec!["A1", "A3"]);
        assert!(pending.iter().all(|e| e.user_id == "ana" && !e.synced));
        assert_eq!(pending[0].id, a1.id);

        assert_eq!(queue.pending_count("rui").await.unwrap(), 1);
        assert_eq!(queue.pending_count("nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_and_clear_user() {
        let queue = queue();
        let a1 = queue.enqueue("ana", form("A1"), vec![]).await.unwrap();
        queue.enqueue("ana", form("A2"), vec![]).await.unwrap();
        queue.enqueue("rui", form("R1"), vec![]).await.unwrap();

        assert!(queue.remove(&a1.id).await.unwrap());
        assert!(!queue.remove(&a1.id).await.unwrap());
        assert!(!queue.mark_synced("offline_missing").await.unwrap());

        assert_eq!(queue.clear_user("ana").await.unwrap(), 1);
        assert!(queue.list_pending("ana").await.unwrap().is_empty());
        assert_eq!(queue.pending_count("rui").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_synced_keeps_pending_and_other_users() {
        let queue = queue();
        let a1 = queue.enqueue("ana", form("A1"), vec![]).await.unwrap();
        let a2 = queue.enqueue("ana", form("A2"), vec![]).await.unwrap();
        let r1 = queue.enqueue("rui", form("R1"), vec![]).await.unwrap();
        queue.mark_synced(&a1.id).await.unwrap();
        queue.mark_synced(&r1.id).await.unwrap();

        assert_eq!(queue.purge_synced("ana").await.unwrap(), 1);
        assert_eq!(queue.purge_synced("ana").await.unwrap(), 0);

        let pending = queue.list_pending("ana").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a2.id);
        // rui's synced entry is left for rui's own sync pass
        assert!(queue.remove(&r1.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline_vistorias.json");

        let queue = OfflineQueue::new(Arc::new(JsonFileStore::new(&path)));
        let foto = QueuedFoto::from_bytes("Laje", "image/jpeg", b"jpeg");
        queue.enqueue("ana", form("A1"), vec![foto.clone()]).await.unwrap();
        drop(queue);

        let reopened = OfflineQueue::new(Arc::new(JsonFileStore::new(&path)));
        let pending = reopened.list_pending("ana").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].fotos, vec![foto]);
    }
}
