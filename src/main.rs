//! Waveplay backend - main entry point.
//!
//! Wires the entitlement core together: PostgreSQL repositories, the Stripe
//! client, the in-process event bus, and the HTTP surface.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use waveplay::adapters::events::InMemoryEventBus;
use waveplay::adapters::http::{entitlement_router, EntitlementAppState};
use waveplay::adapters::postgres::{PostgresSubscriptionRepository, PostgresUserProfileRepository};
use waveplay::adapters::stripe::{StripeConfig, StripeProcessorClient};
use waveplay::application::EntitlementQueries;
use waveplay::config::AppConfig;
use waveplay::domain::entitlement::{
    EntitlementStore, EventIngestionHandler, ReconciliationService, WebhookVerifier,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_tracing(&config);

    info!(
        environment = ?config.server.environment,
        "Starting Waveplay entitlement service"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    if config.database.run_migrations {
        sqlx::migrate!()
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
        info!("Database migrations applied");
    }

    // Outbound adapters
    let subscriptions = Arc::new(PostgresSubscriptionRepository::new(pool.clone()));
    let profiles = Arc::new(PostgresUserProfileRepository::new(pool));
    let event_bus = Arc::new(InMemoryEventBus::new());
    let stripe_client = Arc::new(StripeProcessorClient::new(StripeConfig::new(
        config.payment.stripe_api_key.clone(),
    )));

    // Domain services. Store-change events go to the in-process bus;
    // subscribers attach via EventSubscriber.
    let store = Arc::new(EntitlementStore::new(
        subscriptions,
        profiles.clone(),
        event_bus,
    ));
    let ingestion = Arc::new(EventIngestionHandler::new(
        store.clone(),
        stripe_client.clone(),
        config.payment.require_livemode,
    ));
    let reconciliation = Arc::new(ReconciliationService::new(
        store.clone(),
        stripe_client,
        profiles,
    ));
    let queries = Arc::new(EntitlementQueries::new(store));

    let state = EntitlementAppState {
        webhook_verifier: Arc::new(WebhookVerifier::new(
            config.payment.stripe_webhook_secret.clone(),
        )),
        ingestion,
        reconciliation,
        entitlement_reader: queries,
    };

    let app = Router::new()
        .nest("/api", entitlement_router())
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(cors_layer(&config));

    let addr = config.server.socket_addr();
    info!(%addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone()));

    if config.server.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
