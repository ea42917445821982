//! Field-client side: a durable queue of inspections captured without
//! connectivity, and the synchronizer that replays it against the server.

pub mod client;
pub mod queue;
pub mod store;
pub mod sync;

pub use client::{ClientSession, HttpBackend};
pub use queue::{OfflineQueue, QueuedFoto, QueuedVistoria};
pub use store::{JsonFileStore, QueueStore};
pub use sync::{Submission, SyncBackend, SyncOutcome, SyncReport, Synchronizer};

use crate::validation::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum OfflineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid queue data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid form: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid photo data: {0}")]
    Photo(#[from] base64::DecodeError),

    #[error("Not logged in")]
    NotAuthenticated,
}

pub type Result<T> = std::result::Result<T, OfflineError>;
