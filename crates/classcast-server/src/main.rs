use anyhow::Result;
use classcast_registry::{DiskStore, SessionRegistry, Sweeper, SystemClock};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use classcast_server::config::Settings;
use classcast_server::intake::UploadStore;
use classcast_server::routes::build_router;
use classcast_server::security::{DownloadLimiter, IpWhitelist, OriginPolicy};
use classcast_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,classcast_server=debug,classcast_registry=debug")
            }),
        )
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    info!("🚀 Starting ClassCast server...");

    // Load configuration
    let settings = Arc::new(Settings::load()?);
    info!("✅ Configuration loaded");

    // Upload directory
    let uploads = Arc::new(UploadStore::new(&settings.storage));
    uploads.prepare().await?;
    info!("✅ Upload directory ready at {:?}", uploads.dir());

    // Session registry + background sweep
    let registry = Arc::new(SessionRegistry::new(
        settings.registry_config()?,
        Arc::new(SystemClock),
        Arc::new(DiskStore),
    ));
    let sweeper = Sweeper::new(registry.clone(), settings.sweep_interval()).spawn();

    let limiter = Arc::new(DownloadLimiter::new(&settings.rate_limit));
    let pruner = {
        let limiter = limiter.clone();
        let interval = settings.sweep_interval();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                limiter.prune();
            }
        })
    };

    // Initialize security
    let ip_whitelist = Arc::new(IpWhitelist::new(&settings.security.allowed_ips)?);
    let origins = Arc::new(OriginPolicy::detect(
        &settings.server.host,
        settings.server.port,
        &settings.security.lan_ips,
        &settings.security.extra_origins,
    ));
    info!(
        "✅ Security ready: {} whitelist entries, origins {:?}",
        ip_whitelist.get_whitelist().len(),
        origins.allowed_origins().collect::<Vec<_>>()
    );

    let state = AppState {
        settings: settings.clone(),
        registry,
        uploads,
        limiter,
        ip_whitelist,
        origins: origins.clone(),
    };

    let app = build_router(state);

    // Server address
    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🎯 ClassCast server listening on {}", addr);
    for url in origins.banner_urls() {
        info!("  {}", url);
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    pruner.abort();
    info!("👋 ClassCast server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
