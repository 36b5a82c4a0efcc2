//! ActivityPub Inbox - a multi-site inbox with follower bookkeeping
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - POST/GET /:site_id/inbox                                 │
//! │  - /health, /metrics                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - InboxService (façade, bounded worker pool)               │
//! │  - SiteRegistry                                             │
//! │  - Activity dispatch (federation)                           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx): sites, followers                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Inbox façade and site registry
//! - `federation`: Activity shapes and dispatch
//! - `data`: Database layer
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod federation;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Inbox façade
    pub inbox: Arc<service::InboxService>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Validate site configuration
    /// 2. Connect to SQLite database
    /// 3. Create the schema and register the sites
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Validate site configuration
        let sites = config.site_configs()?;

        // 2. Connect to SQLite database
        let db = data::Database::connect(&config.database.path).await?;

        // 3. Create the schema and register the sites
        let inbox = service::InboxService::init(
            Arc::new(db),
            sites,
            config.inbox.max_concurrent_operations,
        )
        .await?;

        for site_id in inbox.sites().site_ids() {
            tracing::info!(site_id, "Serving inbox");
        }

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            inbox: Arc::new(inbox),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::inbox_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}
