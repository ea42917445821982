//! Application shell: page routes with their auth guards, plus the static
//! front-end bundle served from the configured dist directory.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use mime_guess::MimeGuess;
use std::path::{Component, Path, PathBuf};

use crate::handlers::auth::REFRESH_COOKIE;
use crate::services::AuthService;
use crate::AppState;

/// Client-side pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppRoute {
    Auth,
    Home,
    Vistorias,
    Vistoria(String),
}

impl AppRoute {
    pub fn resolve(path: &str) -> Option<AppRoute> {
        let path = path.trim_end_matches('/');
        match path {
            "" => Some(AppRoute::Home),
            "/auth" => Some(AppRoute::Auth),
            "/vistorias" => Some(AppRoute::Vistorias),
            _ => path
                .strip_prefix("/vistoria/")
                .filter(|id| !id.is_empty() && !id.contains('/'))
                .map(|id| AppRoute::Vistoria(id.to_string())),
        }
    }

    /// Pages only meant for signed-out visitors
    pub fn public_only(&self) -> bool {
        matches!(self, AppRoute::Auth)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    Render,
    Redirect(&'static str),
    NotFound,
}

pub fn guard(route: Option<&AppRoute>, authenticated: bool) -> Guard {
    match route {
        None => Guard::NotFound,
        Some(route) if route.public_only() && authenticated => Guard::Redirect("/vistorias"),
        Some(route) if !route.public_only() && !authenticated => Guard::Redirect("/auth"),
        Some(_) => Guard::Render,
    }
}

pub fn cache_control_for(path: &str) -> HeaderValue {
    if path == "index.html" || path == "sw.js" {
        HeaderValue::from_static("no-store")
    } else if path.starts_with("assets/") {
        HeaderValue::from_static("public, max-age=31536000, immutable")
    } else {
        HeaderValue::from_static("public, max-age=3600")
    }
}

fn dist_file(dist: &str, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path);
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    (safe && !path.is_empty()).then(|| Path::new(dist).join(relative))
}

async fn serve_file(dist: &str, path: &str, status: StatusCode) -> Response {
    let Some(full_path) = dist_file(dist, path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::read(&full_path).await {
        Ok(bytes) => {
            let mime = MimeGuess::from_path(path).first_or_octet_stream();
            let content_type = HeaderValue::from_str(mime.as_ref())
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
            (
                status,
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CACHE_CONTROL, cache_control_for(path)),
                ],
                Body::from(bytes),
            )
                .into_response()
        }
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::error!("Failed to read {:?}: {}", full_path, e);
            }
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Fallback for every non-API path
pub async fn page(State(state): State<AppState>, jar: CookieJar, uri: Uri) -> Response {
    let dist = state.config.web.dist_path.as_str();
    let path = uri.path();
    let relative = path.trim_start_matches('/');

    // Bundle files (sw.js, manifest.json, assets/...)
    if relative.rsplit('/').next().is_some_and(|name| name.contains('.')) {
        return serve_file(dist, relative, StatusCode::OK).await;
    }

    let authenticated = match jar.get(REFRESH_COOKIE) {
        Some(cookie) => match AuthService::session_user(&state.db, cookie.value()).await {
            Ok(user) => user.is_some(),
            Err(e) => {
                tracing::warn!("Session lookup failed: {}", e);
                false
            }
        },
        None => false,
    };

    match guard(AppRoute::resolve(path).as_ref(), authenticated) {
        Guard::Render => serve_file(dist, "index.html", StatusCode::OK).await,
        Guard::Redirect(to) => Redirect::to(to).into_response(),
        Guard::NotFound => serve_file(dist, "index.html", StatusCode::NOT_FOUND).await,
    }
}

/// API responses are never cached unless the handler says otherwise
pub async fn no_store(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .entry(header::CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-store"));
    response
}
