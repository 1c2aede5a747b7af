//! Kids Camp HTTP Server
//!
//! Axum-based server for camp bookings and their Saferpay payments.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use camp_booking::MemoryBookingStore;
use camp_payments::{
    LogMailer, MemoryLedger, MockGateway, PaymentGateway, PaymentOrchestrator, SaferpayClient,
};

use crate::config::ServerConfig;
use crate::handlers::{create_payment, finalize_payment, health_check, payment_failed};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env();

    // Initialize payments
    let payments = gateway(&config).map(|gateway| {
        Arc::new(PaymentOrchestrator::new(
            Arc::new(MemoryBookingStore::new()),
            Arc::new(MemoryLedger::new()),
            gateway,
            Arc::new(LogMailer::new(config.operator_email.clone())),
            config.orchestrator_config(),
        ))
    });

    if config.poll.is_some() {
        tracing::info!("✓ Background payment polling enabled");
    }

    let state = AppState {
        payments,
        poll: config.poll.clone(),
    };

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🏕  camp-server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health           - Health check");
    tracing::info!("  POST /payment          - Book and start payment");
    tracing::info!("  GET  /payment/finalize - Settle payment after redirect");
    tracing::info!("  POST /payment/failed   - Gateway fail notification");
    tracing::info!("");

    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Pick the payment gateway
fn gateway(config: &ServerConfig) -> Option<Arc<dyn PaymentGateway>> {
    match SaferpayClient::from_env() {
        Ok(client) => {
            tracing::info!("✓ Saferpay configured");
            Some(Arc::new(client))
        }
        Err(e) if config.local => {
            tracing::warn!("⚠ Saferpay not configured ({}) - using mock gateway", e);
            Some(Arc::new(MockGateway::new()))
        }
        Err(e) => {
            tracing::warn!("⚠ Saferpay not configured ({}) - payments disabled", e);
            tracing::warn!("  Set SAFERPAY_CUSTOMER_ID, SAFERPAY_TERMINAL_ID, SAFERPAY_API_USER and SAFERPAY_API_PASSWORD in .env");
            None
        }
    }
}

/// Build router
fn app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        // Payments
        .route("/payment", post(create_payment))
        .route("/payment/finalize", get(finalize_payment))
        .route("/payment/failed", post(payment_failed))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
