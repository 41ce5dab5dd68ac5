//! countmein server binary.

use countmein_ingest::{Ingestor, SqliteStore};
use countmein_server::{app, config, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Anything that stops the server from coming up or serving.
#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Pool(#[from] countmein_db::PoolError),

    #[error("failed to check out a connection for migrations: {0}")]
    Connection(#[from] r2d2::Error),

    #[error(transparent)]
    Migration(#[from] countmein_db::MigrationError),

    #[error("listener failed: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // The subscriber may not be installed yet, so report on stderr too.
        tracing::error!(error = %e, "countmein server stopped");
        eprintln!("countmein-server: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let (path, source) = config::config_path(std::env::args().nth(1), |key| {
        std::env::var(key).ok()
    });
    let config = config::load_config(Some(&path))?;

    init_logging(&config.logging);
    tracing::info!(path = %path, source = ?source, "loaded configuration");

    let pool = countmein_db::create_pool(
        &config.database.path,
        countmein_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )?;
    let applied = countmein_db::run_migrations(&*pool.get()?)?;
    tracing::info!(
        path = %config.database.path,
        applied,
        "announcement database ready"
    );

    let ingestor = Ingestor::new(
        Arc::new(SqliteStore::new(pool)),
        config.ingest.validation_policy(),
        tracing::info_span!("ingest"),
    );

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening for announcements");

    axum::serve(listener, app(AppState::new(ingestor)))
        .with_graceful_shutdown(async {
            let signal = shutdown_signal().await;
            tracing::info!(signal, "draining in-flight requests");
        })
        .await?;

    tracing::info!("countmein server shut down");
    Ok(())
}

fn init_logging(logging: &config::LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolves with the name of the first shutdown signal received. If the
/// SIGTERM handler cannot be installed only Ctrl+C is awaited.
async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                return tokio::select! {
                    _ = tokio::signal::ctrl_c() => "SIGINT",
                    _ = terminate.recv() => "SIGTERM",
                };
            }
            Err(e) => tracing::warn!(error = %e, "SIGTERM handler unavailable"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Ctrl+C handler unavailable, running until killed");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}
