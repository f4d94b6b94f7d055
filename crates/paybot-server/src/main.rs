//! paybot server
//!
//! Runs the Telegram bot (long polling) next to an axum server that
//! receives ToyyibPay payment callbacks.

mod handlers;
mod state;
mod telegram;

use std::sync::Arc;

use anyhow::Context;
use axum::{routing::{get, post}, Router};
use teloxide::Bot;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paybot_payments::{BillPolicy, JsonFileStore, PaymentConfig, ToyyibPayClient};

use crate::handlers::{health_check, payment_callback, payment_return, subscription_status};
use crate::state::AppState;
use crate::telegram::TelegramMessenger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PaymentConfig::from_env()?;
    let token = std::env::var("TELOXIDE_TOKEN").context("TELOXIDE_TOKEN not set")?;
    let bot = Bot::new(token);

    let gateway = Arc::new(ToyyibPayClient::new(&config)?);
    let store = Arc::new(JsonFileStore::new(&config.data_file));
    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));

    match &config.category_code {
        Some(code) => tracing::info!(category_code = %code, "Reusing fixed ToyyibPay category"),
        None => tracing::info!("Creating a ToyyibPay category per payment"),
    }
    tracing::info!(path = %config.data_file.display(), "Subscription data file");

    let state = AppState::new(
        gateway,
        store,
        messenger,
        BillPolicy::from(&config),
        config.subscription_days,
    );

    let bot_task = tokio::spawn(telegram::run(bot, state.clone()));

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("paybot listening on http://{}", addr);
    tracing::info!("  GET  /health                        - Health check");
    tracing::info!("  POST /payment_callback              - ToyyibPay callback");
    tracing::info!("  GET  /payment_return                - Payer redirect");
    tracing::info!("  GET  /api/subscription/{{user_id}}    - Subscription status");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    bot_task.abort();
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/payment_callback", post(payment_callback))
        .route("/payment_return", get(payment_return))
        .route("/api/subscription/{user_id}", get(subscription_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
