use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::config::Config;
use crate::db::Database;
use crate::error::AppError;
use crate::models::{CurrentUser, UserRole};
use crate::services::AuthService;
use crate::AppState;

/// Guards the inspection API.
///
/// Handlers behind it receive the caller as `Extension<CurrentUser>` and scope
/// their queries to that user's records.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return Err(AppError::Unauthorized(
                "Missing or invalid Authorization header".to_string(),
            ));
        }
    };

    let current_user = authenticate(&state.db, &state.config, token).await?;
    request.extensions_mut().insert(current_user);

    Ok(next.run(request).await)
}

/// Resolve a bearer token to its account.
///
/// `AuthService::logout` bumps `users.token_version`, so access tokens issued
/// before a logout are refused here even while their signature and expiry are
/// still valid. The field client then has to run `vistoria-obras login` again.
pub(crate) async fn authenticate(
    db: &Database,
    config: &Config,
    token: &str,
) -> Result<CurrentUser, AppError> {
    let claims = AuthService::validate_token(token, config)?;

    let (email, role, is_active, token_version): (String, String, i64, i64) =
        sqlx::query_as("SELECT email, role, is_active, token_version FROM users WHERE id = ?")
            .bind(&claims.sub)
            .fetch_one(db.pool())
            .await
            .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    if is_active == 0 {
        return Err(AppError::Forbidden("Account is disabled".to_string()));
    }

    if token_version != claims.ver {
        return Err(AppError::Unauthorized("Session expired".to_string()));
    }

    Ok(CurrentUser {
        id: claims.sub,
        email,
        role: UserRole::from_str(&role),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoginRequest;
    use crate::services::auth::register_test_user;

    #[tokio::test]
    async fn test_logout_invalidates_issued_access_tokens() {
        let db = Database::in_memory().await;
        let mut config = Config::default();
        config.jwt.secret = "test-secret".to_string();
        register_test_user(&db, "ana@prefeitura.gov.br", "Ana Lima").await;

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

        let user = authenticate(&db, &config, &login.access_token).await.unwrap();
        assert_eq!(user.id, login.user.id);
        assert_eq!(user.email, "ana@prefeitura.gov.br");

        AuthService::logout(&db, &login.user.id).await.unwrap();

        let result = authenticate(&db, &config, &login.access_token).await;
        assert!(matches!(result, Err(AppError::Unauthorized(msg)) if msg == "Session expired"));
    }

    #[tokio::test]
    async fn test_disabled_account_is_forbidden() {
        let db = Database::in_memory().await;
        let mut config = Config::default();
        config.jwt.secret = "test-secret".to_string();
        register_test_user(&db, "rui@prefeitura.gov.br", "Rui Costa").await;

        let login = AuthService::login(
            &db,
            &config,
            LoginRequest {
                email: "rui@prefeitura.gov.br".to_string(),
                password: "segredo123".to_string(),
            },
        )
        .await
        .unwrap();

        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(&login.user.id)
            .execute(db.pool())
            .await
            .unwrap();

        let result = authenticate(&db, &config, &login.access_token).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
