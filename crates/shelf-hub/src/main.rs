use clap::Parser;
use shelf_store::Catalog;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod config;

use auth::AuthService;
use config::Config;

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser)]
#[command(
    name = "shelf-hub",
    version,
    about = "SHELF product analytics query service"
)]
struct Args {
    /// Path to config file
    #[arg(long, default_value = "shelf-hub.toml")]
    config: PathBuf,

    /// Server bind address (overrides `[server] bind`)
    #[arg(long)]
    bind: Option<String>,

    /// Product CSV (overrides `[data] csv_path`)
    #[arg(long)]
    data: Option<PathBuf>,
}

// =============================================================================
// Application State
// =============================================================================

pub struct AppState {
    pub catalog: Catalog,
    pub auth: AuthService,
    pub start_time: Instant,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "shelf_hub=info,shelf_store=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(data) = args.data {
        config.data.csv_path = data;
    }
    config.apply_env(|key| std::env::var(key).ok());

    if config.uses_default_secret() {
        tracing::warn!("⚠️  Using the built-in JWT secret. Set SHELF_SECRET_KEY in production.");
    }

    let catalog = match Catalog::open(&config.data.csv_path, config.data.index_options()) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!("Failed to load {:?}: {}", config.data.csv_path, e);
            std::process::exit(1);
        }
    };
    let stats = catalog.snapshot().stats();

    let addr: SocketAddr = match config.server.bind.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Invalid bind address {:?}: {}", config.server.bind, e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        catalog,
        auth: AuthService::new(&config.auth),
        start_time: Instant::now(),
    });

    spawn_reload_listener(state.clone());

    let app = api::router(state);

    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("  📦 SHELF v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("  Health:     http://{}/", addr);
    tracing::info!("  Token:      http://{}/auth/token", addr);
    tracing::info!("  API:        http://{}/api/products/search", addr);
    tracing::info!("  Data:       {:?}", config.data.csv_path);
    tracing::info!(
        "  Records:    {} ({} brands, {} categories)",
        stats.total_records,
        stats.brands_count,
        stats.categories_count
    );
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

// =============================================================================
// Reload on SIGHUP
// =============================================================================

#[cfg(unix)]
fn spawn_reload_listener(state: Arc<AppState>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!("SIGHUP reload unavailable: {}", e);
            return;
        }
    };

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            tracing::info!("SIGHUP received, reloading dataset");
            let reload_state = state.clone();
            let result = tokio::task::spawn_blocking(move || reload_state.catalog.reload()).await;
            match result {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::error!("Reload failed, keeping current snapshot: {}", e),
                Err(e) => tracing::error!("Reload task panicked: {}", e),
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_listener(_state: Arc<AppState>) {}
