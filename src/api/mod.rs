//! HTTP API - axum router over the core accounting operations.
//!
//! Admin endpoints live under `/admin/finance` and require [`auth::AdminUser`]; the
//! user-facing commission endpoints live under `/commissions`. Handlers are thin: they
//! parse the request, call into `crate::core`, and wrap the result in the JSON envelope
//! from [`response`].

/// Bearer-token issuing, verification and extractors
pub mod auth;
mod commissions;
mod finance;
mod params;
/// JSON envelopes and error-to-status mapping
pub mod response;

use crate::{
    config::AppConfig,
    errors::{Error, Result},
};
use axum::{
    Json, Router,
    http::{Method, Uri},
    routing::get,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Shared state for axum handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
    /// Loaded service configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Bundles a connection and configuration.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: AppConfig) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
        }
    }
}

/// Build the axum router (separated for testing).
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .nest("/admin/finance", finance::routes())
        .nest("/commissions", commissions::routes())
        .fallback(unknown_route)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Binds `bind_addr` and serves the API until Ctrl-C.
pub async fn serve(state: AppState) -> Result<()> {
    let bind_addr = state.config.server.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "finance API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("finance API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}

#[derive(Debug, Serialize)]
struct Health {
    service: &'static str,
    version: &'static str,
}

async fn health() -> Json<response::ApiSuccess<Health>> {
    response::success(Health {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn unknown_route(uri: Uri) -> Error {
    Error::NotFound {
        entity: "Route",
        id: uri.path().to_string(),
    }
}
