use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::queue::{OfflineQueue, QueuedFoto, QueuedVistoria};
use super::Result;
use crate::models::VistoriaForm;
use crate::validation;

/// Remote side of the synchronizer
#[async_trait]
pub trait SyncBackend: Send + Sync {
    /// Insert a record and return its server id
    async fn insert_vistoria(&self, form: &VistoriaForm) -> Result<String>;

    /// Upload one photo of a record and return its public URL
    async fn upload_foto(&self, vistoria_id: &str, ordem: i64, foto: &QueuedFoto) -> Result<String>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Device is offline, nothing attempted
    Offline,
    /// Another sync is in flight, nothing attempted
    AlreadyRunning,
    Completed(SyncReport),
}

/// Where a submitted record ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Saved { vistoria_id: String },
    Queued { queue_id: String },
}

/// Clears the syncing flag however the sync ends
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Synchronizer {
    queue: Arc<OfflineQueue>,
    backend: Arc<dyn SyncBackend>,
    online: AtomicBool,
    syncing: AtomicBool,
}

impl Synchronizer {
    pub fn new(queue: Arc<OfflineQueue>, backend: Arc<dyn SyncBackend>, online: bool) -> Self {
        Self {
            queue,
            backend,
            online: AtomicBool::new(online),
            syncing: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::AcqRel);
        if was != online {
            tracing::info!("Connectivity changed: {}", if online { "online" } else { "offline" });
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Replay every pending entry of `user_id` against the backend
    pub async fn sync_all(&self, user_id: &str) -> Result<SyncOutcome> {
        if !self.is_online() {
            tracing::debug!("Sync skipped: offline");
            return Ok(SyncOutcome::Offline);
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Sync skipped: already running");
            return Ok(SyncOutcome::AlreadyRunning);
        }
        let _guard = SyncGuard(&self.syncing);

        let pending = self.queue.list_pending(user_id).await?;
        let mut report = SyncReport::default();
        if pending.is_empty() {
            tracing::debug!("No pending vistorias to sync");
            return Ok(SyncOutcome::Completed(report));
        }

        tracing::info!("Syncing {} pending vistoria(s)", pending.len());
        for entry in &pending {
            match self.sync_entry(entry).await {
                Ok(vistoria_id) => {
                    self.queue.mark_synced(&entry.id).await?;
                    report.synced += 1;
                    tracing::info!("Queued {} synced as {}", entry.id, vistoria_id);
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!("Failed to sync {}: {}", entry.id, e);
                }
            }
        }

        if report.synced > 0 {
            let purged = self.queue.purge_synced(user_id).await?;
            tracing::debug!("Purged {} synced entries from the queue", purged);
        }

        tracing::info!(
            "Sync finished: {} synced, {} failed",
            report.synced,
            report.failed
        );
        Ok(SyncOutcome::Completed(report))
    }

    async fn sync_entry(&self, entry: &QueuedVistoria) -> Result<String> {
        let vistoria_id = self.backend.insert_vistoria(&entry.data).await?;
        self.upload_fotos(&vistoria_id, &entry.fotos).await;
        Ok(vistoria_id)
    }

    /// Photos go up in order with `ordem = index + 1`; a failed photo does not stop the rest
    async fn upload_fotos(&self, vistoria_id: &str, fotos: &[QueuedFoto]) -> usize {
        let mut uploaded = 0;
        for (i, foto) in fotos.iter().enumerate() {
            let ordem = i as i64 + 1;
            match self.backend.upload_foto(vistoria_id, ordem, foto).await {
                Ok(_) => uploaded += 1,
                Err(e) => tracing::warn!("Photo {} of {} failed: {}", ordem, vistoria_id, e),
            }
        }
        uploaded
    }

    /// Validate, then save directly when online or queue for later
    pub async fn submit(
        &self,
        user_id: &str,
        form: VistoriaForm,
        fotos: Vec<QueuedFoto>,
    ) -> Result<Submission> {
        let form = validation::validate(form)?;

        if self.is_online() {
            match self.backend.insert_vistoria(&form).await {
                Ok(vistoria_id) => {
                    let uploaded = self.upload_fotos(&vistoria_id, &fotos).await;
                    tracing::info!(
                        "Vistoria {} saved with {}/{} photo(s)",
                        vistoria_id,
                        uploaded,
                        fotos.len()
                    );
                    return Ok(Submission::Saved { vistoria_id });
                }
                Err(e) => tracing::warn!("Online save failed, queueing instead: {}", e),
            }
        }

        let entry = self.queue.enqueue(user_id, form, fotos).await?;
        Ok(Submission::Queued { queue_id: entry.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Objetivo;
    use crate::offline::store::memory::MemoryStore;
    use crate::offline::{JsonFileStore, OfflineError};
    use crate::validation::complete_form;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeBackend {
        inserted: Mutex<Vec<String>>,
        uploads: Mutex<Vec<(String, i64, String)>>,
        fail_nome: Option<String>,
        fail_ordem: Option<i64>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeBackend {
        fn inserted(&self) -> Vec<String> {
            self.inserted.lock().unwrap().clone()
        }

        fn uploads(&self) -> Vec<(String, i64, String)> {
            self.uploads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SyncBackend for FakeBackend {
        async fn insert_vistoria(&self, form: &VistoriaForm) -> Result<String> {
            let id = {
                let mut inserted = self.inserted.lock().unwrap();
                inserted.push(form.nome_obra.clone());
                format!("srv-{}", inserted.len())
            };
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail_nome.as_deref() == Some(form.nome_obra.as_str()) {
                return Err(OfflineError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(id)
        }

        async fn upload_foto(&self, vistoria_id: &str, ordem: i64, foto: &QueuedFoto) -> Result<String> {
            if self.fail_ordem == Some(ordem) {
                return Err(OfflineError::Api {
                    status: 413,
                    message: "too large".to_string(),
                });
            }
            self.uploads
                .lock()
                .unwrap()
                .push((vistoria_id.to_string(), ordem, foto.legenda.clone()));
            Ok(format!("http://x/{}/{}", vistoria_id, ordem))
        }
    }

    fn named(nome: &str) -> VistoriaForm {
        VistoriaForm {
            nome_obra: nome.to_string(),
            ..complete_form()
        }
    }

    fn fotos(legendas: &[&str]) -> Vec<QueuedFoto> {
        legendas
            .iter()
            .map(|l| QueuedFoto::from_bytes(l, "image/jpeg", b"jpeg"))
            .collect()
    }

    fn synchronizer(backend: Arc<FakeBackend>, online: bool) -> Synchronizer {
        let queue = Arc::new(OfflineQueue::new(Arc::new(MemoryStore::default())));
        Synchronizer::new(queue, backend, online)
    }

    #[tokio::test]
    async fn test_sync_all_drains_pending() {
        let backend = Arc::new(FakeBackend::default());
        let sync = synchronizer(backend.clone(), true);
        sync.queue().enqueue("ana", named("Escola"), fotos(&["a", "b"])).await.unwrap();
        sync.queue().enqueue("ana", named("Ponte"), vec![]).await.unwrap();
        sync.queue().enqueue("rui", named("Praça"), vec![]).await.unwrap();

        let outcome = sync.sync_all("ana").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Completed(SyncReport { synced: 2, failed: 0 }));
        assert!(sync.queue().list_pending("ana").await.unwrap().is_empty());
        assert_eq!(sync.queue().pending_count("rui").await.unwrap(), 1);

        assert_eq!(backend.inserted(), vec!["Escola", "Ponte"]);
        assert_eq!(
            backend.uploads(),
            vec![
                ("srv-1".to_string(), 1, "a".to_string()),
                ("srv-1".to_string(), 2, "b".to_string()),
            ]
        );
        assert!(!sync.is_syncing());
    }

    #[tokio::test]
    async fn test_failed_entry_stays_queued_and_photo_failures_are_skipped() {
        let backend = Arc::new(FakeBackend {
            fail_nome: Some("Ponte".to_string()),
            fail_ordem: Some(2),
            ..Default::default()
        });
        let sync = synchronizer(backend.clone(), true);
        sync.queue().enqueue("ana", named("Escola"), fotos(&["a", "b", "c"])).await.unwrap();
        sync.queue().enqueue("ana", named("Ponte"), vec![]).await.unwrap();

        let outcome = sync.sync_all("ana").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Completed(SyncReport { synced: 1, failed: 1 }));

        let pending = sync.queue().list_pending("ana").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].data.nome_obra, "Ponte");

        let ordens: Vec<i64> = backend.uploads().iter().map(|u| u.1).collect();
        assert_eq!(ordens, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_synced_entries_leave_the_queue_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline_vistorias.json");
        let queue = Arc::new(OfflineQueue::new(Arc::new(JsonFileStore::new(&path))));
        let sync = Synchronizer::new(queue, Arc::new(FakeBackend::default()), true);

        let foto = QueuedFoto::from_bytes("Fachada", "image/jpeg", &vec![7u8; 100_000]);
        let entry = sync.queue().enqueue("ana", named("Escola"), vec![foto]).await.unwrap();
        let queued_len = std::fs::metadata(&path).unwrap().len();
        assert!(queued_len > 100_000);

        let outcome = sync.sync_all("ana").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Completed(SyncReport { synced: 1, failed: 0 }));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains(&entry.id));
        assert!(raw.len() < 1000);
        assert!(!sync.queue().remove(&entry.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_sync_offline_is_noop() {
        let backend = Arc::new(FakeBackend::default());
        let sync = synchronizer(backend.clone(), false);
        sync.queue().enqueue("ana", named("Escola"), vec![]).await.unwrap();

        assert_eq!(sync.sync_all("ana").await.unwrap(), SyncOutcome::Offline);
        assert!(backend.inserted().is_empty());
        assert_eq!(sync.queue().pending_count("ana").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_sync_is_noop() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let sync = Arc::new(synchronizer(backend.clone(), true));
        sync.queue().enqueue("ana", named("Escola"), vec![]).await.unwrap();

        let first = tokio::spawn({
            let sync = sync.clone();
            async move { sync.sync_all("ana").await }
        });
        while backend.inserted().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(sync.is_syncing());

        let second = sync.sync_all("ana").await.unwrap();
        assert_eq!(second, SyncOutcome::AlreadyRunning);
        assert_eq!(backend.inserted().len(), 1);

        gate.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first, SyncOutcome::Completed(SyncReport { synced: 1, failed: 0 }));
        assert!(!sync.is_syncing());
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_form_before_backend() {
        let backend = Arc::new(FakeBackend::default());
        let sync = synchronizer(backend.clone(), true);
        let form = VistoriaForm {
            objetivos: vec![],
            ..complete_form()
        };

        let result = sync.submit("ana", form, vec![]).await;
        assert!(matches!(result, Err(OfflineError::Validation(_))));
        assert!(backend.inserted().is_empty());
        assert_eq!(sync.queue().pending_count("ana").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_submit_online_and_offline_paths() {
        let backend = Arc::new(FakeBackend {
            fail_nome: Some("Ponte".to_string()),
            ..Default::default()
        });
        let sync = synchronizer(backend.clone(), true);

        let saved = sync.submit("ana", named("Escola"), fotos(&["a"])).await.unwrap();
        assert_eq!(
            saved,
            Submission::Saved {
                vistoria_id: "srv-1".to_string()
            }
        );

        let fallback = sync.submit("ana", named("Ponte"), vec![]).await.unwrap();
        assert!(matches!(fallback, Submission::Queued { .. }));

        sync.set_online(false);
        let cadastral = VistoriaForm {
            objetivos: vec![Objetivo::AtualizacaoCadastral],
            ..Default::default()
        };
        let queued = sync.submit("ana", cadastral, vec![]).await.unwrap();
        assert!(matches!(queued, Submission::Queued { .. }));

        let pending = sync.queue().list_pending("ana").await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].data.nome_obra, "Atualização Cadastral");
        assert_eq!(backend.inserted().len(), 2);
    }
}
