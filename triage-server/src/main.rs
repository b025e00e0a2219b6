//! review-triage - customer review collection and admin triage service
//!
//! Serves the customer submission surface and the admin dashboard surface on
//! two ports from one process sharing a single store handle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use triage_common::config::{
    effective_admin_token, resolve_api_key, resolve_config, StoreBackend, TomlConfig,
};
use triage_common::events::EventBus;
use triage_common::store::open_store;
use triage_server::enrich::{Enricher, GeminiClient, GeminiSettings};
use triage_server::{build_admin_router, build_customer_router, AppState};

/// Command-line arguments; each overrides the matching config file setting
#[derive(Parser, Debug)]
#[command(name = "review-triage")]
#[command(about = "Customer review collection and AI-assisted triage")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "TRIAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the review file or database
    #[arg(long, env = "TRIAGE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Address both surfaces bind to
    #[arg(long, env = "TRIAGE_BIND")]
    bind: Option<String>,

    /// Customer submission port
    #[arg(long, env = "TRIAGE_CUSTOMER_PORT")]
    customer_port: Option<u16>,

    /// Admin dashboard port
    #[arg(long, env = "TRIAGE_ADMIN_PORT")]
    admin_port: Option<u16>,

    /// Store backend: csv, sqlite or memory
    #[arg(long, env = "TRIAGE_STORE")]
    store: Option<StoreBackend>,

    /// Admin bearer token (empty disables admin auth)
    #[arg(long, env = "TRIAGE_ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TRIAGE_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, mut config: TomlConfig) -> TomlConfig {
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(port) = self.customer_port {
            config.customer_port = port;
        }
        if let Some(port) = self.admin_port {
            config.admin_port = port;
        }
        if let Some(backend) = self.store {
            config.store.backend = backend;
        }
        if let Some(token) = self.admin_token {
            config.admin_token = Some(token);
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        config
    }
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.logging.level)));

    let (file_layer, stderr_layer) = match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file));
            (Some(layer), None)
        }
        None => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before the global subscriber exists; log through a scoped one
    let bootstrap = tracing_subscriber::fmt().with_env_filter(EnvFilter::new("info")).finish();
    let config = tracing::subscriber::with_default(bootstrap, || resolve_config(args.config.as_deref()))
        .context("Failed to load configuration")?;
    let config = args.apply(config);

    init_tracing(&config)?;

    info!(
        "Starting review-triage v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Data folder: {}", config.data_dir.display());

    let store = open_store(&config.store, &config.data_dir)
        .await
        .context("Failed to open review store")?;

    let event_bus = EventBus::new(100);
    let mut state = AppState::new(store, event_bus)
        .with_admin_token(effective_admin_token(&config))
        .with_enrich_on_submit(config.ai.enrich_on_submit)
        .with_batch_delay(Duration::from_millis(config.ai.batch_delay_ms));

    match resolve_api_key(&config.ai) {
        Some(api_key) => {
            let client = GeminiClient::new(GeminiSettings {
                api_key,
                model: config.ai.model.clone(),
                endpoint: config.ai.endpoint.clone(),
                timeout: Duration::from_secs(config.ai.timeout_secs),
            })
            .context("Failed to create generation client")?;
            info!("✓ AI enrichment enabled (model {})", config.ai.model);
            state = state.with_enricher(Enricher::new(Arc::new(client)));
        }
        None => warn!("No API key configured; AI enrichment disabled"),
    }

    if state.admin_token.is_some() {
        info!("✓ Admin authentication enabled");
    } else {
        warn!("Admin authentication disabled (admin_token empty)");
    }
    if state.enrich_on_submit && state.enricher.is_none() {
        warn!("enrich_on_submit is set but AI enrichment is disabled; submissions stay pending");
    }

    let customer_addr = (config.bind_address.as_str(), config.customer_port);
    let admin_addr = (config.bind_address.as_str(), config.admin_port);
    let customer_listener = TcpListener::bind(customer_addr)
        .await
        .with_context(|| format!("Failed to bind customer port {}", config.customer_port))?;
    let admin_listener = TcpListener::bind(admin_addr)
        .await
        .with_context(|| format!("Failed to bind admin port {}", config.admin_port))?;

    info!("Customer form on http://{}:{}", config.bind_address, config.customer_port);
    info!("Admin dashboard on http://{}:{}", config.bind_address, config.admin_port);

    let shutdown = CancellationToken::new();
    let signal_state = state.clone();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_state.cancel_batch().await;
        signal_token.cancel();
    });

    let customer = axum::serve(customer_listener, build_customer_router(state.clone()))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let admin = axum::serve(admin_listener, build_admin_router(state))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());

    tokio::try_join!(
        async { customer.await.context("Customer server error") },
        async { admin.await.context("Admin server error") },
    )?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
