mod api;
mod bullhorn;
mod connector;
mod profile;
mod scheduler;
mod sync;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use jobfeed_config::{init_tracing, AppConfig, SyncConfig};
use jobfeed_db::jobs::pg_repository::PgJobRepository;
use jobfeed_db::sync::pg_repository::PgSyncRepository;

use crate::api::{build_router, AppState, SERVICE_NAME};
use crate::bullhorn::client::{BullhornClient, BullhornClientConfig};
use crate::connector::Connector;
use crate::profile::ListingProfile;
use crate::scheduler::Scheduler;
use crate::sync::reconciler::Reconciler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing("info");

    let config = AppConfig::from_env().context("failed to load config")?;
    let sync_config = SyncConfig::from_env().context("failed to load sync config")?;
    tracing::info!(
        service = SERVICE_NAME,
        listing_mode = sync_config.listing_mode.as_str(),
        max_window_size = sync_config.max_window_size,
        max_deletions_per_run = sync_config.max_deletions_per_run,
        "starting"
    );

    let mut bullhorn_config = BullhornClientConfig::from_env()
        .map_err(anyhow::Error::msg)?
        .context("BULLHORN_CLIENT_ID, BULLHORN_CLIENT_SECRET and BULLHORN_REFRESH_TOKEN must be set")?;
    bullhorn_config.page_size = sync_config.page_size;
    let client = BullhornClient::new(bullhorn_config).context("failed to create bullhorn client")?;

    let pool = jobfeed_db::create_pool(&config.database_url)
        .await
        .context("failed to connect to database")?;
    jobfeed_db::apply_schema(&pool)
        .await
        .context("failed to apply schema")?;

    let jobs = PgJobRepository::new(pool.clone());
    let sync_repo = PgSyncRepository::new(pool);
    let profile = ListingProfile::for_mode(sync_config.listing_mode);
    let interval = sync_config.sync_interval();

    let reconciler: Arc<dyn Connector> = Arc::new(Reconciler::new(
        Arc::new(client),
        jobs.clone(),
        sync_repo.clone(),
        sync_config,
        profile,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (scheduler, triggers) = Scheduler::new(reconciler, interval, shutdown_rx);
    let scheduler_task = tokio::spawn(scheduler.run());

    let state = AppState {
        jobs: Arc::new(jobs),
        sync_repo: Arc::new(sync_repo),
        triggers,
        listing_type: profile.listing_type,
    };
    let app = build_router(state);
    let addr: SocketAddr = config.bind_addr().parse().context("invalid bind address")?;

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind")?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_task.await {
        tracing::error!(error = %e, "scheduler task panicked");
    }
    tracing::info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
