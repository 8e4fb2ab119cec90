//! Misdinar Roster Backend
//!
//! REST backend that assigns altar servers and organists to parish services,
//! keeping the master table and roster snapshots in a blob store.

mod api;
mod auth;
mod codec;
mod config;
mod errors;
mod ledger;
mod models;
mod reaper;
mod repository;
mod selector;
mod store;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use repository::Repository;
use selector::SelectionRules;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Misdinar Roster Backend");
    tracing::info!("Master table: {}", config.data_file);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (MISDINAR_API_PSK). Authentication is disabled!");
    }

    let store = store::open_store(&config.store).await?;

    // Drop rosters for services that have already happened
    let today = chrono::Local::now().date_naive();
    let report = reaper::reap_stale_rosters(store.as_ref(), today).await?;
    tracing::info!(
        "Roster cleanup: {} deleted, {} kept, {} skipped",
        report.deleted.len(),
        report.kept,
        report.skipped.len()
    );

    let rules = SelectionRules::new(config.special_quota_divisor);
    let repo = Arc::new(Repository::open(store, config.data_file.clone(), rules).await?);

    // Create application state
    let state = AppState {
        repo,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Catalog
        .route("/categories", get(api::list_categories))
        .route("/groups", get(api::list_groups))
        .route("/revision", get(api::get_revision))
        // Master table
        .route("/people", get(api::list_people))
        .route("/people", post(api::create_person))
        .route("/people", put(api::import_people))
        .route("/people/export", get(api::export_people))
        .route("/people/{id}", get(api::get_person))
        .route("/people/{id}", delete(api::delete_person))
        // Rosters
        .route("/rosters", get(api::list_rosters))
        .route("/rosters", post(api::confirm_roster))
        .route("/rosters/preview", post(api::preview_roster))
        .route("/rosters/reap", post(api::reap_rosters))
        .route("/rosters/{name}", get(api::get_roster))
        .route("/rosters/{name}/candidates", get(api::list_candidates))
        .route("/rosters/{name}/replace", post(api::replace_member))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
