use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    Claims, CreateUserRequest, CurrentUser, LoginRequest, LoginResponse, Profile, RefreshToken,
    User, UserResponse, UserRole,
};

/// Authentication service
pub struct AuthService;

impl AuthService {
    /// Register a new user together with their inspector profile
    pub async fn register(db: &Database, req: CreateUserRequest) -> Result<UserResponse> {
        if !req.email.contains('@') {
            return Err(AppError::BadRequest("Invalid email format".to_string()));
        }

        if req.password.len() < 6 {
            return Err(AppError::BadRequest(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        let full_name = req.full_name.trim();
        if full_name.is_empty() {
            return Err(AppError::BadRequest("Full name is required".to_string()));
        }

        let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(&req.email)
            .fetch_optional(db.pool())
            .await?;

        if existing.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        // The first account administers the installation
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(db.pool())
            .await?;

        let role = if count.0 == 0 {
            UserRole::Admin
        } else {
            UserRole::User
        };

        let password_hash = Self::hash_password(&req.password)?;

        let user_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let mut tx = db.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(&req.email)
        .bind(&password_hash)
        .bind(role.as_str())
        .bind(&now)
        .bind(&now)
        .execute(tx.as_mut())
        .await?;

        sqlx::query(
            r#"
            INSERT INTO profiles (id, full_name, user_type, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(full_name)
        .bind("fiscal")
        .bind(&now)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;

        tracing::info!("Registered user {} ({})", user_id, role.as_str());
        Self::user_response(db, &user_id).await
    }

    async fn user_response(db: &Database, user_id: &str) -> Result<UserResponse> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(db.pool())
            .await?;
        let profile: Option<Profile> = sqlx::query_as("SELECT * FROM profiles WHERE id = ?")
            .bind(user_id)
            .fetch_optional(db.pool())
            .await?;
        Ok(UserResponse::new(user, profile))
    }

    /// Login user
    pub async fn login(db: &Database, config: &Config, req: LoginRequest) -> Result<LoginResponse> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(&req.email)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

        if !user.is_active {
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }

        if !Self::verify_password(&req.password, &user.password_hash)? {
            return Err(AppError::Unauthorized("Invalid email or password".to_string()));
        }

        let access_token = Self::generate_access_token(&user, config)?;
        let refresh_token = Self::generate_refresh_token(db, &user.id, config).await?;

        Ok(LoginResponse {
            access_token,
            refresh_token: Some(refresh_token),
            token_type: "Bearer".to_string(),
            expires_in: config.jwt.access_token_expire_minutes * 60,
            user: Self::user_response(db, &user.id).await?,
        })
    }

    /// Refresh access token, rotating the refresh token
    pub async fn refresh_token(
        db: &Database,
        config: &Config,
        refresh_token: &str,
    ) -> Result<LoginResponse> {
        let mut tx = db.pool().begin().await?;

        let token_hash = Self::hash_token(refresh_token);

        let stored_token: RefreshToken =
            sqlx::query_as("SELECT * FROM refresh_tokens WHERE token_hash = ?")
                .bind(&token_hash)
                .fetch_optional(tx.as_mut())
                .await?
                .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

        let expires_at = chrono::DateTime::parse_from_rfc3339(&stored_token.expires_at)
            .map_err(|_| AppError::Internal("Invalid token expiry format".to_string()))?;

        if expires_at < Utc::now() {
            sqlx::query("DELETE FROM refresh_tokens WHERE id = ?")
                .bind(&stored_token.id)
                .execute(tx.as_mut())
                .await?;
            tx.commit().await?;
            return Err(AppError::Unauthorized("Refresh token expired".to_string()));
        }

        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&stored_token.user_id)
            .fetch_one(tx.as_mut())
            .await?;

        if !user.is_active {
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }

        let access_token = Self::generate_access_token(&user, config)?;
        let new_refresh_token =
            Self::generate_refresh_token_tx(tx.as_mut(), &user.id, config).await?;

        sqlx::query("DELETE FROM refresh_tokens WHERE id = ?")
            .bind(&stored_token.id)
            .execute(tx.as_mut())
            .await?;

        tx.commit().await?;

        Ok(LoginResponse {
            access_token,
            refresh_token: Some(new_refresh_token),
            token_type: "Bearer".to_string(),
            expires_in: config.jwt.access_token_expire_minutes * 60,
            user: Self::user_response(db, &user.id).await?,
        })
    }

    /// Logout user (invalidate access and refresh tokens)
    pub async fn logout(db: &Database, user_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE users SET token_version = token_version + 1, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(user_id)
            .execute(db.pool())
            .await?;
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(db.pool())
            .await?;
        Ok(())
    }

    /// Resolve the user owning a live refresh token (page-load guard)
    pub async fn session_user(db: &Database, refresh_token: &str) -> Result<Option<CurrentUser>> {
        let token_hash = Self::hash_token(refresh_token);
        let row: Option<(String, String, String, bool)> = sqlx::query_as(
            r#"
            SELECT u.id, u.email, u.role, u.is_active
            FROM refresh_tokens t JOIN users u ON u.id = t.user_id
            WHERE t.token_hash = ? AND t.expires_at > ?
            "#,
        )
        .bind(&token_hash)
        .bind(Utc::now().to_rfc3339())
        .fetch_optional(db.pool())
        .await?;

        Ok(row
            .filter(|(_, _, _, active)| *active)
            .map(|(id, email, role, _)| CurrentUser {
                id,
                email,
                role: UserRole::from_str(&role),
            }))
    }

    /// Generate access token (JWT)
    fn generate_access_token(user: &User, config: &Config) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::minutes(config.jwt.access_token_expire_minutes as i64);

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            ver: user.token_version,
            jti: Uuid::new_v4().to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt.secret.as_bytes()),
        )?;

        Ok(token)
    }

    async fn generate_refresh_token(db: &Database, user_id: &str, config: &Config) -> Result<String> {
        let mut tx = db.pool().begin().await?;
        let token = Self::generate_refresh_token_tx(tx.as_mut(), user_id, config).await?;
        tx.commit().await?;
        Ok(token)
    }

    async fn generate_refresh_token_tx(
        conn: &mut sqlx::SqliteConnection,
        user_id: &str,
        config: &Config,
    ) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        let token_hash = Self::hash_token(&token);

        let id = Uuid::new_v4().to_string();
        let expires_at =
            (Utc::now() + Duration::days(config.jwt.refresh_token_expire_days as i64)).to_rfc3339();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&token_hash)
        .bind(&expires_at)
        .bind(&now)
        .execute(conn)
        .await?;

        Ok(token)
    }

    /// Validate access token and extract claims
    pub fn validate_token(token: &str, config: &Config) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let keys = std::iter::once(config.jwt.secret.as_str())
            .chain(config.jwt.previous_secrets.iter().map(|s| s.as_str()));

        for secret in keys {
            if let Ok(token_data) = decode::<Claims>(
                token,
                &DecodingKey::from_secret(secret.as_bytes()),
                &validation,
            ) {
                return Ok(token_data.claims);
            }
        }

        Err(AppError::Unauthorized("Invalid token".to_string()))
    }

    /// Hash password using Argon2
    fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();

        Ok(password_hash)
    }

    /// Verify password against hash
    fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash token for storage
    fn hash_token(token: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
pub(crate) async fn register_test_user(db: &Database, email: &str, full_name: &str) -> UserResponse {
    AuthService::register(
        db,
        CreateUserRequest {
            email: email.to_string(),
            full_name: full_name.to_string(),
            password: "segredo123".to_string(),
        },
    )
    .await
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.jwt.secret = "test-secret".to_string();
        config
    }

    #[tokio::test]
    async fn test_register_creates_profile_and_first_admin() {
        let db = Database::in_memory().await;

        let first = register_test_user(&db, "ana@prefeitura.gov.br", "Ana Lima").await;
        let second = register_test_user(&db, "rui@prefeitura.gov.br", "Rui Costa").await;

        assert_eq!(first.role, "admin");
        assert_eq!(first.full_name, "Ana Lima");
        assert_eq!(second.role, "user");
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        let db = Database::in_memory().await;
        register_test_user(&db, "ana@prefeitura.gov.br", "Ana Lima").await;

        let dup = AuthService::register(
            &db,
            CreateUserRequest {
                email: "ana@prefeitura.gov.br".to_string(),
                full_name: "Outra".to_string(),
                password: "segredo123".to_string(),
            },
        )
        .await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));

        let short = AuthService::register(
            &db,
            CreateUserRequest {
                email: "x@y.z".to_string(),
                full_name: "X".to_string(),
                password: "123".to_string(),
            },
        )
        .await;
        assert!(matches!(short, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_login_refresh_logout_cycle() {
        let db = Database::in_memory().await;
        let config = test_config();
        register_test_user(&db, "ana@prefeitura.gov.br", "Ana Lima").await;

        let bad = AuthService::login(
            &db,
            &config,
            LoginRequest {
                email: "ana@prefeitura.gov.br".to_string(),
                password: "errada".to_string(),
            },
        )
        .await;
        assert!(matches!(bad, Err(AppError::Unauthorized(_))));

        let login = AuthService::login(
            &db,
            &config,
            LoginRequest {
                email: "ana@prefeitura.gov.br".to_string(),
                password: "segredo123".to_string(),
            },
        )
        .await
        .unwrap();

        let claims = AuthService::validate_token(&login.access_token, &config).unwrap();
        assert_eq!(claims.sub, login.user.id);

        let refresh = login.refresh_token.unwrap();
        let session = AuthService::session_user(&db, &refresh).await.unwrap();
        assert_eq!(session.map(|u| u.id), Some(login.user.id.clone()));

        let rotated = AuthService::refresh_token(&db, &config, &refresh).await.unwrap();
        assert!(AuthService::session_user(&db, &refresh).await.unwrap().is_none());
        let new_refresh = rotated.refresh_token.unwrap();
        assert!(AuthService::session_user(&db, &new_refresh).await.unwrap().is_some());

        AuthService::logout(&db, &login.user.id).await.unwrap();
        assert!(AuthService::session_user(&db, &new_refresh).await.unwrap().is_none());
    }

    #[test]
    fn test_validate_token_accepts_previous_secret() {
        let mut config = test_config();
        let user = User {
            id: "u1".to_string(),
            email: "a@b.c".to_string(),
            password_hash: String::new(),
            role: "user".to_string(),
            is_active: true,
            token_version: 0,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let token = AuthService::generate_access_token(&user, &config).unwrap();

        config.jwt.previous_secrets = vec!["test-secret".to_string()];
        config.jwt.secret = "rotated".to_string();
        assert_eq!(AuthService::validate_token(&token, &config).unwrap().sub, "u1");

        config.jwt.previous_secrets.clear();
        assert!(AuthService::validate_token(&token, &config).is_err());
    }
}
