//! Signature Panel Server
//!
//! A small upload service that stamps the examination signature panel onto
//! result PDFs. Provides:
//!
//! - `GET /`: the upload page
//! - `GET /health`: liveness plus per-variant asset readiness
//! - `POST /api/stamp/:variant`: multipart upload, PDF download in return
//!
//! ## Variants
//!
//! - `background`: each page is placed over the institutional background
//! - `panel`: the panel is stamped onto the pages as they are
//!
//! Assets are looked up on every request, so dropping `times.ttf` or
//! `TR background.pdf` into the asset directory takes effect without a
//! restart.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use sigpanel_core::{AssetPaths, PanelLayout, Variant};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;

use api::{handle_health, handle_index, handle_stamp};

/// Command-line arguments for the signature panel server
#[derive(Parser, Debug)]
#[command(name = "sigpanel-server")]
#[command(about = "Stamps the signature panel onto uploaded result PDFs")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "SIGPANEL_PORT", default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "SIGPANEL_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory holding times.ttf and "TR background.pdf"
    /// (defaults to the working directory)
    #[arg(long, env = "SIGPANEL_ASSETS_DIR")]
    assets_dir: Option<PathBuf>,

    /// Processing timeout in milliseconds
    #[arg(long, env = "SIGPANEL_TIMEOUT_MS", default_value = "30000")]
    timeout_ms: u64,

    /// Largest accepted upload in megabytes
    #[arg(long, env = "SIGPANEL_MAX_UPLOAD_MB", default_value = "25")]
    max_upload_mb: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Where the font and background are read from
    pub assets: AssetPaths,
    /// Panel geometry and signatories
    pub layout: Arc<PanelLayout>,
    /// Processing timeout in milliseconds
    pub timeout_ms: u64,
}

/// Build the router with all routes and middleware
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/api/stamp/:variant", post(handle_stamp))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting signature panel server on {}:{}", args.host, args.port);

    let assets = match &args.assets_dir {
        Some(dir) => AssetPaths::in_dir(dir),
        None => AssetPaths::default(),
    };

    // Missing assets are reported per request; warn early so deployments notice
    for variant in Variant::ALL {
        let missing = assets.missing(variant);
        if !missing.is_empty() {
            warn!("{} variant is not ready, missing: {:?}", variant, missing);
        }
    }

    let state = AppState {
        assets,
        layout: Arc::new(PanelLayout::default()),
        timeout_ms: args.timeout_ms,
    };

    let app = build_router(state, args.max_upload_mb * 1024 * 1024);

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Processing timeout: {}ms", args.timeout_ms);
    info!("Upload limit: {}MB", args.max_upload_mb);

    axum::serve(listener, app).await?;

    Ok(())
}
