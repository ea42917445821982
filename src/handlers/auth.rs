use axum::{extract::State, http::HeaderMap, response::IntoResponse, Extension, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{CreateUserRequest, CurrentUser, LoginRequest, UserResponse};
use crate::services::AuthService;
use crate::AppState;

/// Refresh token cookie; scoped to `/` so page loads can be guarded too
pub const REFRESH_COOKIE: &str = "vo_refresh";

fn refresh_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .path("/")
        .build()
}

/// Register a new user
/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let user = AuthService::register(&state.db, req).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// Login user
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let response = AuthService::login(&state.db, &state.config, req).await?;

    let jar = match response.refresh_token.as_ref() {
        Some(token) => jar.add(refresh_cookie(token.clone(), state.config.jwt.cookie_secure)),
        None => jar,
    };

    Ok((jar, Json(ApiResponse::success(response))))
}

/// Refresh access token
/// POST /api/v1/auth/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let refresh_token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| {
            headers
                .get("X-Refresh-Token")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string())
        })
        .ok_or_else(|| AppError::Unauthorized("Missing refresh token".to_string()))?;

    let response = AuthService::refresh_token(&state.db, &state.config, &refresh_token).await?;

    let jar = match response.refresh_token.as_ref() {
        Some(token) => jar.add(refresh_cookie(token.clone(), state.config.jwt.cookie_secure)),
        None => jar,
    };

    Ok((jar, Json(ApiResponse::success(response))))
}

/// Logout user
/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    AuthService::logout(&state.db, &current_user.id).await?;
    let remove = refresh_cookie(String::new(), state.config.jwt.cookie_secure);
    Ok((
        jar.remove(remove),
        Json(ApiResponse::<()>::success_message("Logged out successfully")),
    ))
}
