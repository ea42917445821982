//! Field-client subcommands: sign in, submit with offline fallback, sync and
//! queue inspection.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{GeoPoint, VistoriaForm};
use crate::offline::{
    ClientSession, HttpBackend, JsonFileStore, OfflineQueue, QueuedFoto, Submission,
    SyncOutcome, Synchronizer,
};

pub struct SubmitArgs {
    pub form: PathBuf,
    pub fotos: Vec<PathBuf>,
    pub legendas: Vec<String>,
    pub position: Option<(f64, f64)>,
    pub offline: bool,
}

fn open_queue(config: &Config) -> Arc<OfflineQueue> {
    Arc::new(OfflineQueue::new(Arc::new(JsonFileStore::new(
        &config.client.queue_path,
    ))))
}

/// Load the saved session, probe the server and refresh the token when reachable
async fn connect(config: &Config, force_offline: bool) -> anyhow::Result<(ClientSession, Arc<HttpBackend>, bool)> {
    let mut session = ClientSession::load(&config.client.session_path)
        .await
        .context("No saved session, run `vistoria-obras login` first")?;

    let backend = Arc::new(HttpBackend::new(&config.client.api_url)?);
    backend.set_token(&session.access_token);

    let online = !force_offline && backend.health().await;
    if online {
        if let Some(refresh_token) = session.refresh_token.clone() {
            match backend.refresh(&refresh_token).await {
                Ok(login) => {
                    session = ClientSession::from_login(&login);
                    session.save(&config.client.session_path).await?;
                }
                Err(e) => tracing::warn!("Token refresh failed, using saved token: {}", e),
            }
        }
    }

    Ok((session, backend, online))
}

pub async fn login(config: &Config, email: &str, password: &str) -> anyhow::Result<()> {
    let backend = HttpBackend::new(&config.client.api_url)?;
    let login = backend.login(email, password).await?;

    let session = ClientSession::from_login(&login);
    session.save(&config.client.session_path).await?;

    println!("Signed in as {} <{}>", session.full_name, session.email);
    Ok(())
}

async fn read_fotos(paths: &[PathBuf], legendas: &[String]) -> anyhow::Result<Vec<QueuedFoto>> {
    let mut fotos = Vec::with_capacity(paths.len());
    for (i, path) in paths.iter().enumerate() {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read photo {}", path.display()))?;
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let legenda = legendas.get(i).map(String::as_str).unwrap_or_default();
        fotos.push(QueuedFoto::from_bytes(legenda, mime.as_ref(), &data));
    }
    Ok(fotos)
}

pub async fn submit(config: &Config, args: SubmitArgs) -> anyhow::Result<()> {
    let raw = tokio::fs::read(&args.form)
        .await
        .with_context(|| format!("Failed to read form {}", args.form.display()))?;
    let mut form: VistoriaForm = serde_json::from_slice(&raw).context("Invalid form JSON")?;

    let (session, backend, online) = connect(config, args.offline).await?;

    form.prefill_inspector(&session.full_name);
    if let Some((latitude, longitude)) = args.position {
        form.apply_location(GeoPoint { latitude, longitude });
    }

    let fotos = read_fotos(&args.fotos, &args.legendas).await?;
    let synchronizer = Synchronizer::new(open_queue(config), backend, online);

    match synchronizer.submit(&session.user_id, form, fotos).await? {
        Submission::Saved { vistoria_id } => println!("Vistoria saved: {}", vistoria_id),
        Submission::Queued { queue_id } => {
            println!("Offline: vistoria queued as {}", queue_id);
            return Ok(());
        }
    }

    // A reachable server is a good moment to flush older entries too
    report_sync(synchronizer.sync_all(&session.user_id).await?);
    Ok(())
}

fn report_sync(outcome: SyncOutcome) {
    match outcome {
        SyncOutcome::Offline => println!("Server unreachable, nothing synced"),
        SyncOutcome::AlreadyRunning => println!("A sync is already running"),
        SyncOutcome::Completed(report) if report.synced == 0 && report.failed == 0 => {}
        SyncOutcome::Completed(report) => println!(
            "Synced {} vistoria(s), {} still pending",
            report.synced, report.failed
        ),
    }
}

pub async fn sync(config: &Config) -> anyhow::Result<()> {
    let (session, backend, online) = connect(config, false).await?;
    let synchronizer = Synchronizer::new(open_queue(config), backend, online);

    let outcome = synchronizer.sync_all(&session.user_id).await?;
    if matches!(&outcome, SyncOutcome::Completed(r) if r.synced == 0 && r.failed == 0) {
        println!("Nothing to sync");
    }
    report_sync(outcome);
    Ok(())
}

pub async fn pending(config: &Config, remove: Option<String>, clear: bool) -> anyhow::Result<()> {
    let session = ClientSession::load(&config.client.session_path)
        .await
        .context("No saved session, run `vistoria-obras login` first")?;
    let queue = open_queue(config);

    if let Some(id) = remove {
        if queue.remove(&id).await? {
            println!("Removed {}", id);
        } else {
            println!("No queued vistoria {}", id);
        }
        return Ok(());
    }

    if clear {
        let removed = queue.clear_user(&session.user_id).await?;
        println!("Removed {} queued vistoria(s)", removed);
        return Ok(());
    }

    let entries = queue.list_pending(&session.user_id).await?;
    if entries.is_empty() {
        println!("No pending vistorias");
        return Ok(());
    }

    for entry in &entries {
        let queued_at = chrono::DateTime::from_timestamp_millis(entry.timestamp)
            .map(|t| t.with_timezone(&chrono::Local).format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{}  {}  {}  ({} foto(s))",
            entry.id,
            queued_at,
            entry.data.nome_obra,
            entry.fotos.len()
        );
    }
    println!("{} pending", entries.len());
    Ok(())
}
