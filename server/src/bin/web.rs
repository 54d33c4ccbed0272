//! Givewire Web Server - donation API and webhook receiver.
//!
//! This binary provides the HTTP surface for:
//! - Creating hosted checkout sessions for one-time and recurring donations
//! - Receiving and verifying payment-completion webhooks
//! - Retrieving session details for the thank-you page
//! - Serving the public recent-donations feed

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use givewire::web::{
    create_checkout, donations_feed, get_session, health, stripe_webhook, webhook_probe,
    AppState,
};
use givewire::webhook::Forwarder;
use givewire::{Config, StripeClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        stripe_key_configured = !config.stripe_secret_key.is_empty(),
        webhook_secret_configured = config.webhook_secret.is_some(),
        forward_configured = config.forward_url.is_some(),
        excluded_email_count = config.excluded_emails.len(),
        invoice_forwarding_disabled = config.disable_invoice_forwarding,
        "config_loaded"
    );

    if config.webhook_secret.is_none() {
        warn!("webhook_secret_missing_running_degraded");
    }

    // Shared HTTP client for all outbound calls
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.request_timeout_ms))
        .pool_max_idle_per_host(10)
        .build()
        .context("Failed to create HTTP client")?;

    let stripe = StripeClient::new(http.clone(), config.stripe_secret_key.clone());
    let forwarder = Forwarder::from_config(http, &config);

    // Create application state
    let state = AppState::new(config.clone(), stripe, forwarder);

    // CORS for the browser-facing endpoints, restricted to the allow-list
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "invalid_allowed_origin_skipped");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static("idempotency-key")]);

    // Build the router
    let app = Router::new()
        .route("/health", get(health))
        .route("/webhooks/stripe", post(stripe_webhook).get(webhook_probe))
        .route("/session", get(get_session))
        .route("/checkout", post(create_checkout))
        .route("/feed", get(donations_feed))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
