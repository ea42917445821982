use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base used to build public photo URLs
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    #[serde(default = "default_jwt_secret")]
    pub secret: String,
    #[serde(default)]
    pub previous_secrets: Vec<String>,
    #[serde(default = "default_access_token_expire")]
    pub access_token_expire_minutes: u64,
    #[serde(default = "default_refresh_token_expire")]
    pub refresh_token_expire_days: u64,
    #[serde(default)]
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_local_path")]
    pub local_path: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
}

/// Fixed header lines printed on every report
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_prefecture")]
    pub prefecture: String,
    #[serde(default = "default_secretariat")]
    pub secretariat: String,
    #[serde(default = "default_report_title")]
    pub title: String,
    /// TTF used instead of the built-in Helvetica
    #[serde(default)]
    pub font_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverlayConfig {
    #[serde(default = "default_overlay_label")]
    pub label: String,
    #[serde(default)]
    pub font_path: Option<String>,
    #[serde(default)]
    pub logo_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_dist_path")]
    pub dist_path: String,
}

/// Settings for the field client (submit/sync subcommands)
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_queue_path")]
    pub queue_path: String,
    #[serde(default = "default_session_path")]
    pub session_path: String,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_db_path() -> String {
    "data/vistorias.db".to_string()
}

fn default_jwt_secret() -> String {
    "your-super-secret-key-change-it".to_string()
}

fn default_access_token_expire() -> u64 {
    60
}

fn default_refresh_token_expire() -> u64 {
    30
}

fn default_local_path() -> String {
    "data/uploads".to_string()
}

fn default_bucket() -> String {
    "vistoria-fotos".to_string()
}

fn default_max_upload() -> usize {
    20 * 1024 * 1024
}

fn default_prefecture() -> String {
    "PREFEITURA MUNICIPAL DE PRESIDENTE GETÚLIO".to_string()
}

fn default_secretariat() -> String {
    "SECRETARIA DE PLANEJAMENTO E DESENVOLVIMENTO ECONÔMICO".to_string()
}

fn default_report_title() -> String {
    "RELATÓRIO DE VISTORIA DE OBRAS".to_string()
}

fn default_overlay_label() -> String {
    "PMPG - Planejamento Urbano".to_string()
}

fn default_dist_path() -> String {
    "web/dist".to_string()
}

fn default_api_url() -> String {
    "http://localhost:8080/api/v1".to_string()
}

fn default_queue_path() -> String {
    "data/offline_vistorias.json".to_string()
}

fn default_session_path() -> String {
    "data/session.json".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_jwt_secret(),
            previous_secrets: Vec::new(),
            access_token_expire_minutes: default_access_token_expire(),
            refresh_token_expire_days: default_refresh_token_expire(),
            cookie_secure: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_path: default_local_path(),
            bucket: default_bucket(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            prefecture: default_prefecture(),
            secretariat: default_secretariat(),
            title: default_report_title(),
            font_path: None,
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            label: default_overlay_label(),
            font_path: None,
            logo_path: None,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            dist_path: default_dist_path(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            queue_path: default_queue_path(),
            session_path: default_session_path(),
        }
    }
}

impl Config {
    /// Load configuration for the server: file, env overrides, directories, JWT secret
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_client()?;
        config.ensure_directories()?;
        config.ensure_jwt_secret()?;
        Ok(config)
    }

    /// Load configuration without touching server-side state
    pub fn load_client() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Ensure JWT secret is secure and persisted
    fn ensure_jwt_secret(&mut self) -> anyhow::Result<()> {
        if self.jwt.secret == default_jwt_secret() || self.jwt.secret.is_empty() {
            let secret_path = Path::new("data/.jwt_secret");

            if secret_path.exists() {
                let secret = fs::read_to_string(secret_path)?;
                self.jwt.secret = secret.trim().to_string();
                tracing::info!("Loaded persisted JWT secret from data/.jwt_secret");
            } else {
                let secret = uuid::Uuid::new_v4().to_string();

                if let Some(parent) = secret_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                fs::write(secret_path, &secret)?;
                self.jwt.secret = secret;
                tracing::info!("Generated and persisted new JWT secret to data/.jwt_secret");
            }
        }
        Ok(())
    }

    /// Load configuration from conf.ini or config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["conf.ini", "config.toml", "data/conf.ini", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    /// Format: VO_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("VO_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("VO_CONF_SERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = lookup("VO_CONF_SERVER_PUBLIC_URL") {
            self.server.public_url = val.trim_end_matches('/').to_string();
        }

        if let Some(val) = lookup("VO_CONF_DATABASE_PATH") {
            self.database.path = val;
        }

        if let Some(val) = lookup("VO_CONF_JWT_SECRET") {
            self.jwt.secret = val;
        }
        if let Some(val) = lookup("VO_CONF_JWT_PREVIOUS_SECRETS") {
            self.jwt.previous_secrets = val
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
        }
        if let Some(val) = lookup("VO_CONF_JWT_ACCESS_EXPIRE") {
            if let Ok(minutes) = val.parse() {
                self.jwt.access_token_expire_minutes = minutes;
            }
        }
        if let Some(val) = lookup("VO_CONF_JWT_REFRESH_EXPIRE") {
            if let Ok(days) = val.parse() {
                self.jwt.refresh_token_expire_days = days;
            }
        }
        if let Some(val) = lookup("VO_CONF_JWT_COOKIE_SECURE") {
            if let Ok(v) = val.parse() {
                self.jwt.cookie_secure = v;
            }
        }

        if let Some(val) = lookup("VO_CONF_STORAGE_LOCAL_PATH") {
            self.storage.local_path = val;
        }
        if let Some(val) = lookup("VO_CONF_STORAGE_BUCKET") {
            if !val.trim().is_empty() {
                self.storage.bucket = val;
            }
        }
        if let Some(val) = lookup("VO_CONF_STORAGE_MAX_UPLOAD") {
            if let Ok(bytes) = val.parse() {
                self.storage.max_upload_bytes = bytes;
            }
        }

        if let Some(val) = lookup("VO_CONF_REPORT_FONT_PATH") {
            self.report.font_path = Some(val).filter(|v| !v.trim().is_empty());
        }

        if let Some(val) = lookup("VO_CONF_OVERLAY_FONT_PATH") {
            self.overlay.font_path = Some(val).filter(|v| !v.trim().is_empty());
        }
        if let Some(val) = lookup("VO_CONF_OVERLAY_LOGO_PATH") {
            self.overlay.logo_path = Some(val).filter(|v| !v.trim().is_empty());
        }

        if let Some(val) = lookup("VO_CONF_WEB_DIST_PATH") {
            self.web.dist_path = val;
        }

        if let Some(val) = lookup("VO_CONF_CLIENT_API_URL") {
            self.client.api_url = val.trim_end_matches('/').to_string();
        }
        if let Some(val) = lookup("VO_CONF_CLIENT_QUEUE_PATH") {
            self.client.queue_path = val;
        }
        if let Some(val) = lookup("VO_CONF_CLIENT_SESSION_PATH") {
            self.client.session_path = val;
        }
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }

        fs::create_dir_all(&self.storage.local_path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_file_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [overlay]
            font_path = "fonts/DejaVuSans.ttf"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.bucket, "vistoria-fotos");
        assert_eq!(config.overlay.font_path.as_deref(), Some("fonts/DejaVuSans.ttf"));
        assert_eq!(config.overlay.label, "PMPG - Planejamento Urbano");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("VO_CONF_SERVER_PORT", "7000"),
            ("VO_CONF_SERVER_PUBLIC_URL", "https://vistorias.example.org/"),
            ("VO_CONF_JWT_PREVIOUS_SECRETS", "a, b,,c"),
            ("VO_CONF_CLIENT_API_URL", "https://vistorias.example.org/api/v1/"),
            ("VO_CONF_OVERLAY_LOGO_PATH", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.public_url, "https://vistorias.example.org");
        assert_eq!(config.jwt.previous_secrets, vec!["a", "b", "c"]);
        assert_eq!(config.client.api_url, "https://vistorias.example.org/api/v1");
        assert!(config.overlay.logo_path.is_none());
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "VO_CONF_SERVER_PORT").then(|| "abc".to_string()));
        assert_eq!(config.server.port, 8080);
    }
}
