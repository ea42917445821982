use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use super::queue::QueuedFoto;
use super::sync::SyncBackend;
use super::{OfflineError, Result};
use crate::models::{extension_for_mime, CreatedVistoria, LoginRequest, LoginResponse, VistoriaForm, VistoriaFoto};

/// Signed-in user as remembered by the field client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSession {
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl ClientSession {
    pub fn from_login(login: &LoginResponse) -> Self {
        Self {
            user_id: login.user.id.clone(),
            email: login.user.email.clone(),
            full_name: login.user.full_name.clone(),
            access_token: login.access_token.clone(),
            refresh_token: login.refresh_token.clone(),
        }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        match tokio::fs::read(path.as_ref()).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OfflineError::NotAuthenticated),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_vec_pretty(self)?).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    message: String,
    data: Option<T>,
}

/// Server API client used by the synchronizer
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    pub fn set_token(&self, token: &str) {
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token.to_string());
        }
    }

    fn token(&self) -> Result<String> {
        self.token
            .read()
            .ok()
            .and_then(|t| t.clone())
            .ok_or(OfflineError::NotAuthenticated)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<Envelope<serde_json::Value>>(&body)
                .map(|e| e.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(OfflineError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> = serde_json::from_slice(&body)?;
        envelope.data.ok_or_else(|| OfflineError::Api {
            status: status.as_u16(),
            message: "Response without data".to_string(),
        })
    }

    /// Connectivity probe
    pub async fn health(&self) -> bool {
        match self
            .client
            .get(self.url("/health"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                tracing::debug!("Health check failed: {}", e);
                false
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let login: LoginResponse = Self::parse(response).await?;
        self.set_token(&login.access_token);
        Ok(login)
    }

    /// Exchange a refresh token for a new token pair
    pub async fn refresh(&self, refresh_token: &str) -> Result<LoginResponse> {
        let response = self
            .client
            .post(self.url("/auth/refresh"))
            .header("X-Refresh-Token", refresh_token)
            .send()
            .await?;
        let login: LoginResponse = Self::parse(response).await?;
        self.set_token(&login.access_token);
        Ok(login)
    }
}

#[async_trait]
impl SyncBackend for HttpBackend {
    async fn insert_vistoria(&self, form: &VistoriaForm) -> Result<String> {
        let response = self
            .client
            .post(self.url("/vistorias"))
            .bearer_auth(self.token()?)
            .json(form)
            .send()
            .await?;
        let created: CreatedVistoria = Self::parse(response).await?;
        Ok(created.id)
    }

    async fn upload_foto(&self, vistoria_id: &str, ordem: i64, foto: &QueuedFoto) -> Result<String> {
        let data = foto.bytes()?;
        let file_name = format!("foto-{}.{}", ordem, extension_for_mime(&foto.mime));
        let part = Part::bytes(data)
            .file_name(file_name)
            .mime_str(&foto.mime)?;

        let form = Form::new()
            .part("file", part)
            .text("legenda", foto.legenda.clone())
            .text("ordem", ordem.to_string());

        let response = self
            .client
            .post(self.url(&format!("/vistorias/{}/fotos", vistoria_id)))
            .bearer_auth(self.token()?)
            .multipart(form)
            .send()
            .await?;
        let foto: VistoriaFoto = Self::parse(response).await?;
        Ok(foto.arquivo_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        assert!(matches!(
            ClientSession::load(&path).await,
            Err(OfflineError::NotAuthenticated)
        ));

        let session = ClientSession {
            user_id: "u1".to_string(),
            email: "ana@prefeitura.gov.br".to_string(),
            full_name: "Ana Lima".to_string(),
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
        };
        session.save(&path).await.unwrap();

        let loaded = ClientSession::load(&path).await.unwrap();
        assert_eq!(loaded.user_id, "u1");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn test_requests_need_token() {
        let backend = HttpBackend::new("http://127.0.0.1:9/api/v1/").unwrap();
        assert_eq!(backend.url("/health"), "http://127.0.0.1:9/api/v1/health");

        let result = backend.insert_vistoria(&VistoriaForm::default()).await;
        assert!(matches!(result, Err(OfflineError::NotAuthenticated)));
    }
}
