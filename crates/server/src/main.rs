//! Partsmith server - headless auto-parts commerce backend.
//!
//! # Architecture
//!
//! - Axum JSON API consumed by a browser storefront on another origin
//! - Stripe Checkout for payment; webhooks drive order state
//! - `PostgreSQL` for catalog, orders, and carts
//! - Background sweep mirroring the shop's eBay listings into the catalog
//!
//! Migrations are NOT run on startup; run them explicitly via:
//! `cargo run -p partsmith-cli -- migrate`

#![cfg_attr(not(test), forbid(unsafe_code))]

use axum::{Router, ServiceExt, extract::Request};
use sentry::integrations::tracing as sentry_tracing;
use tower::Layer;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use partsmith_server::config::AppConfig;
use partsmith_server::db;
use partsmith_server::ebay::EbayClient;
use partsmith_server::routes;
use partsmith_server::services::EmailService;
use partsmith_server::state::AppState;
use partsmith_server::sync::spawn_sync_job;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &AppConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Initialize tracing with EnvFilter and Sentry integration
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "partsmith_server=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    let mailer = config.email.as_ref().map(|email_config| {
        EmailService::new(email_config).expect("Failed to set up the SMTP transport")
    });
    if mailer.is_none() {
        tracing::info!("SMTP not configured; order emails disabled");
    }

    // The sweep owns its own eBay client; the request path never needs one.
    if let Some(ebay_config) = config.ebay.as_ref().filter(|ebay| ebay.sync_enabled) {
        let client = EbayClient::new(ebay_config.clone());
        let _sync_job = spawn_sync_job(client, pool.clone(), ebay_config);
        tracing::info!(interval = ?ebay_config.sync_interval, "Catalog sync job started");
    } else {
        tracing::info!("Catalog sync disabled");
    }

    let state = AppState::new(config.clone(), pool, mailer);

    let router = Router::new()
        .merge(routes::routes())
        .layer(TraceLayer::new_for_http())
        // The storefront is served from another origin
        .layer(CorsLayer::permissive())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    // Path normalization has to wrap the router to affect route matching
    let app = NormalizePathLayer::trim_trailing_slash().layer(router);

    let addr = config.socket_addr();
    tracing::info!("partsmith-server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
