//! Beacon control plane service
//!
//! REST API for remote configuration, heartbeats and license validation

use anyhow::{Context, Result};
use beacon_common::{SharedClock, SystemClock};
use beacon_control_plane::{
    create_router, AppState, Config, ControlPlane, CredentialAuthority, MemoryStore, RedisStore,
    StorageBackend, Store,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon_control_plane=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Starting Beacon control plane");
    info!("Storage backend: {:?}", config.storage_backend);

    // Initialize storage
    let store: Arc<dyn Store> = match config.storage_backend {
        StorageBackend::Redis => {
            info!("Redis URL: {}", config.redis_url);
            Arc::new(
                RedisStore::new(&config.redis_url)
                    .await
                    .context("Failed to initialize storage")?,
            )
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; nothing survives a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let clock: SharedClock = Arc::new(SystemClock);
    let (plane, _touch_worker) = ControlPlane::start(store, clock, &config.maintenance_message);

    let mut authority = CredentialAuthority::new(config.grant_ttl()?);
    match (&config.admin_username, &config.admin_password) {
        (Some(user), Some(password)) => {
            authority = authority.with_principal(user, password);
            info!("Admin principal configured: {}", user);
        }
        _ => warn!("No admin principal configured; admin routes will reject every request"),
    }

    // Create application state
    let state = AppState {
        plane,
        authority: Arc::new(authority),
        trust_proxy: config.trust_proxy,
    };

    // Create router
    let app = create_router(state);

    // Bind and serve
    let addr = config.api_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    info!("Beacon control plane running on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
