mod commands;
mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod offline;
mod photo;
mod report;
mod services;
mod shell;
mod storage;
mod validation;
mod wizard;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::photo::OverlayStamper;
use crate::storage::PhotoBucket;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub bucket: Arc<PhotoBucket>,
    pub stamper: Arc<OverlayStamper>,
}

#[derive(Parser)]
#[command(name = "vistoria-obras")]
#[command(about = "Building-inspection reports: API server and offline field client")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server (default)
    Serve,

    /// Sign in and remember the session for the field commands
    Login {
        #[arg(long, env = "VO_EMAIL")]
        email: String,
        #[arg(long, env = "VO_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Submit an inspection form (JSON); queued locally when the server is unreachable
    Submit {
        /// Form JSON file
        form: PathBuf,
        /// Photo files, in display order
        #[arg(long = "foto")]
        fotos: Vec<PathBuf>,
        /// Captions, matched to --foto by position
        #[arg(long = "legenda")]
        legendas: Vec<String>,
        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,
        /// Queue without contacting the server
        #[arg(long)]
        offline: bool,
    },

    /// Send queued inspections to the server
    Sync,

    /// Show or manage the local queue
    Pending {
        /// Remove one queued entry
        #[arg(long)]
        remove: Option<String>,
        /// Drop every queued entry of the signed-in user
        #[arg(long, conflicts_with = "remove")]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vistoria_obras=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Login { email, password } => {
            commands::login(&Config::load_client()?, &email, &password).await
        }
        Command::Submit {
            form,
            fotos,
            legendas,
            lat,
            lon,
            offline,
        } => {
            let args = commands::SubmitArgs {
                form,
                fotos,
                legendas,
                position: lat.zip(lon),
                offline,
            };
            commands::submit(&Config::load_client()?, args).await
        }
        Command::Sync => commands::sync(&Config::load_client()?).await,
        Command::Pending { remove, clear } => {
            commands::pending(&Config::load_client()?, remove, clear).await
        }
    }
}

async fn serve() -> anyhow::Result<()> {
    tracing::info!("Starting vistoria-obras server...");

    let config = Arc::new(Config::load()?);
    tracing::info!("Configuration loaded");

    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized");

    let bucket = Arc::new(PhotoBucket::from_config(&config));
    let stamper = Arc::new(OverlayStamper::from_config(&config.overlay));

    let state = AppState {
        db,
        config: config.clone(),
        bucket,
        stamper,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh_token))
        .route(
            "/form",
            get(handlers::form::get_form).post(handlers::form::resolve_form),
        )
        .route("/storage/:bucket/*key", get(handlers::storage::get_object));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/profile", get(handlers::profile::get_profile))
        .route(
            "/vistorias",
            get(handlers::vistoria::list_vistorias).post(handlers::vistoria::create_vistoria),
        )
        .route("/vistorias/stats", get(handlers::vistoria::get_stats))
        .route(
            "/vistorias/autocomplete",
            get(handlers::vistoria::get_autocomplete),
        )
        .route(
            "/vistorias/by-contract/:numero",
            get(handlers::vistoria::get_by_contract),
        )
        .route("/vistorias/:id", get(handlers::vistoria::get_vistoria))
        .route("/vistorias/:id/fotos", post(handlers::foto::upload_foto))
        .route(
            "/vistorias/:id/report",
            get(handlers::report::download_report),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    let api = public_routes
        .merge(protected_routes)
        .layer(axum::middleware::from_fn(shell::no_store));

    Router::new()
        .nest("/api/v1", api)
        .fallback(shell::page)
        .layer(DefaultBodyLimit::max(state.config.storage.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
