//! Beacon control plane
//!
//! Serves remote configuration, heartbeats and license validation to client
//! applications, plus the admin actions that drive licenses and project
//! credentials.

pub mod admin;
pub mod config;
pub mod handlers;
pub mod licensing;
pub mod memory;
pub mod models;
pub mod pipeline;
pub mod reauth;
pub mod service;
pub mod storage;
pub mod worker;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::{Config, StorageBackend};
pub use handlers::AppState;
pub use licensing::NewLicense;
pub use memory::MemoryStore;
pub use pipeline::ConfigRequest;
pub use reauth::{CredentialAuthority, ElevatedGrant, ReAuthenticate};
pub use service::ControlPlane;
pub use storage::{BindOutcome, RedisStore, Store};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/v1/config/{public_id}", get(handlers::config_handler))
        .route(
            "/v1/heartbeat/{public_id}",
            post(handlers::heartbeat_handler),
        )
        .route(
            "/v1/validate-license",
            post(handlers::validate_license_handler),
        )
        .route(
            "/admin/projects/{public_id}/licenses",
            post(handlers::generate_license_handler),
        )
        .route(
            "/admin/projects/{public_id}/licenses/{key}/revoke",
            post(handlers::revoke_license_handler),
        )
        .route(
            "/admin/projects/{public_id}/licenses/{key}/reset-hardware",
            post(handlers::reset_hardware_handler),
        )
        .route(
            "/admin/projects/{public_id}/instances",
            get(handlers::list_instances_handler),
        )
        .route(
            "/admin/projects/{public_id}/secret/reveal",
            post(handlers::reveal_secret_handler),
        )
        .route(
            "/admin/projects/{public_id}/secret/rotate",
            post(handlers::rotate_secret_handler),
        )
        .route(
            "/admin/projects/{public_id}/api-keys",
            post(handlers::create_api_key_handler),
        )
        .route(
            "/admin/projects/{public_id}/api-keys/{key_id}",
            delete(handlers::revoke_api_key_handler),
        )
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
