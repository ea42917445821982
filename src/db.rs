use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::error::Result;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(path: &str) -> Result<Self> {
        let url = format!("sqlite:{}?mode=rwc", path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database with migrations applied
    #[cfg(test)]
    pub async fn in_memory() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db = Self { pool };
        db.run_migrations().await.unwrap();
        db
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',
                is_active INTEGER NOT NULL DEFAULT 1,
                token_version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                full_name TEXT NOT NULL,
                user_type TEXT NOT NULL DEFAULT 'fiscal',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                FOREIGN KEY (id) REFERENCES users(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS refresh_tokens (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                token_hash TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS obra_vistorias (
                id TEXT PRIMARY KEY,
                user_id TEXT,
                nome_obra TEXT NOT NULL,
                localizacao TEXT NOT NULL,
                numero_contrato TEXT,
                empresa_responsavel TEXT,
                engenheiro_responsavel TEXT,
                fiscal_prefeitura TEXT,
                data_vistoria TEXT NOT NULL,
                hora_vistoria TEXT NOT NULL,
                latitude REAL,
                longitude REAL,
                objetivo_atualizacao_cadastral INTEGER NOT NULL DEFAULT 0,
                objetivo_inicio_obra INTEGER NOT NULL DEFAULT 0,
                objetivo_vistoria_rotina INTEGER NOT NULL DEFAULT 0,
                objetivo_medicao INTEGER NOT NULL DEFAULT 0,
                objetivo_vistoria_tecnica INTEGER NOT NULL DEFAULT 0,
                objetivo_encerramento INTEGER NOT NULL DEFAULT 0,
                objetivo_outros TEXT,
                descricao_atividades TEXT NOT NULL,
                situacao_conformidade INTEGER NOT NULL DEFAULT 0,
                situacao_pendencias INTEGER NOT NULL DEFAULT 0,
                situacao_irregularidades INTEGER NOT NULL DEFAULT 0,
                situacao_paralisada INTEGER NOT NULL DEFAULT 0,
                situacao_finalizada INTEGER NOT NULL DEFAULT 0,
                detalhes_pendencias TEXT,
                recomendacoes TEXT,
                fiscal_nome TEXT,
                fiscal_matricula TEXT,
                representante_nome TEXT,
                representante_cargo TEXT,
                status TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vistoria_fotos (
                id TEXT PRIMARY KEY,
                vistoria_id TEXT NOT NULL,
                arquivo_url TEXT NOT NULL,
                storage_path TEXT NOT NULL,
                legenda TEXT NOT NULL DEFAULT '',
                ordem INTEGER NOT NULL,
                tamanho_arquivo INTEGER NOT NULL DEFAULT 0,
                tipo_arquivo TEXT NOT NULL DEFAULT 'image/jpeg',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                FOREIGN KEY (vistoria_id) REFERENCES obra_vistorias(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_obra_vistorias_user_id ON obra_vistorias(user_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_obra_vistorias_contrato ON obra_vistorias(user_id, numero_contrato)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_vistoria_fotos_vistoria_id ON vistoria_fotos(vistoria_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user_id ON refresh_tokens(user_id)")
            .execute(&self.pool)
            .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }
}
