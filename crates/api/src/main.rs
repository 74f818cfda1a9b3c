//! API server entry point.

use std::sync::Arc;

use api::config::LogFormat;
use api::{AppState, Collaborators, Config};
use domain::{CacheKey, InMemoryCatalog, InMemoryChatService};
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use tokio::signal;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn open_store(config: &Config) -> Result<Arc<dyn EventStore>, BoxError> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresEventStore::connect(url).await?;
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL event store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, events are kept in memory only");
            Ok(Arc::new(InMemoryEventStore::new()))
        }
    }
}

/// Logs what went stale. A UI gateway would subscribe the same way and push
/// refreshes to the affected user.
fn log_invalidations(mut invalidations: broadcast::Receiver<CacheKey>) {
    tokio::spawn(async move {
        loop {
            match invalidations.recv().await {
                Ok(key) => tracing::debug!(?key, "cache invalidated"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "invalidation listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let store = open_store(&config).await?;
    let catalog = match &config.catalog_seed_path {
        Some(path) => InMemoryCatalog::load_seed(path).await?,
        None => InMemoryCatalog::new(),
    };
    let collaborators = Collaborators {
        catalog: Arc::new(catalog),
        chat: Arc::new(InMemoryChatService::new()),
    };

    let state = Arc::new(AppState::new(store, collaborators, &config));
    log_invalidations(state.invalidations.subscribe());

    // The seed knows nothing of deletions made on earlier runs
    state.guard.reapply_deletions().await?;

    // Replay whatever the store already holds into the dashboards
    let replayed = state.projection_processor.run_catch_up().await?;
    tracing::info!(events = replayed, "read models caught up");

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting marketplace API");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}
