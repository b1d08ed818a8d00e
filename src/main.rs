use axum::http::HeaderValue;
use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod error;
mod integrations;
mod models;
mod services;
mod utils;
mod websocket;

use config::Config;
use constants::API_VERSION;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cryptoquest_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting CryptoQuest Backend Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let app_state = api::AppState::build(config)?;
    tracing::info!(
        gateway = app_state.subscriptions.gateway_name(),
        ai_providers = ?app_state.chat.configured(),
        "services ready"
    );

    let subscriptions = app_state.subscriptions.clone();
    let app = build_router(app_state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let running watches record an aborted outcome before exit
    subscriptions.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Lightning subscriptions and merch
        .route("/api/strike/plans", get(api::payments::get_plans))
        .route("/api/strike/merch", get(api::payments::get_merch))
        .route(
            "/api/strike/subscription/create",
            post(api::payments::create_subscription),
        )
        .route(
            "/api/strike/invoice/{invoice_id}/status",
            get(api::payments::invoice_status),
        )
        .route(
            "/api/strike/invoice/{invoice_id}/quote",
            post(api::payments::quote_invoice),
        )
        .route(
            "/api/strike/invoice/{invoice_id}/watch",
            post(api::payments::start_watch)
                .get(api::payments::watch_status)
                .delete(api::payments::cancel_watch),
        )
        .route("/api/strike/merch/quote", post(api::payments::merch_quote))
        .route(
            "/api/strike/sandbox/invoice/{invoice_id}/state",
            post(api::payments::set_sandbox_state),
        )
        // Card payments
        .route(
            "/api/stripe/subscription",
            post(api::stripe::create_subscription),
        )
        .route(
            "/api/stripe/subscription/{subscription_id}",
            get(api::stripe::subscription_status),
        )
        .route(
            "/api/stripe/payment-intent",
            post(api::stripe::create_payment_intent),
        )
        .route(
            "/api/stripe/payment-intent/{payment_intent_id}",
            get(api::stripe::payment_intent_status),
        )
        // AI
        .route("/api/ai/chat", post(api::ai::chat))
        .route("/api/ai/contract-analysis", post(api::ai::contract_analysis))
        .route("/api/ai/market-insights", post(api::ai::market_insights))
        .route("/api/ai/gaming-strategy", post(api::ai::gaming_strategy))
        .route(
            "/api/ai/investment-analysis",
            post(api::ai::investment_analysis),
        )
        // Wallets and chain data
        .route(
            "/api/wallet/wallets",
            get(api::wallet::list_wallets).post(api::wallet::create_wallet),
        )
        .route(
            "/api/wallet/wallets/{wallet_id}/balances",
            get(api::wallet::wallet_balances),
        )
        .route("/api/wallet/{address}/nfts", get(api::wallet::wallet_nfts))
        .route("/api/wallet/{address}/tokens", get(api::wallet::token_balances))
        .route(
            "/api/wallet/{address}/transactions",
            get(api::wallet::wallet_transactions),
        )
        .route(
            "/api/wallet/token/{address}/price",
            get(api::wallet::token_price),
        )
        // Agent actions
        .route(
            "/api/agentkit",
            get(api::agentkit::overview).post(api::agentkit::execute_action),
        )
        .route("/api/agentkit/superpay", post(api::agentkit::superpay))
        .route(
            "/api/agentkit/paymaster",
            put(api::agentkit::update_paymaster),
        )
        // Game data
        .route("/api/users", post(api::game::create_user))
        .route("/api/users/{id}", get(api::game::get_user))
        .route(
            "/api/users/wallet/{address}",
            get(api::game::get_user_by_wallet),
        )
        .route("/api/players", post(api::game::create_player))
        // GET is keyed by wallet address, PATCH by player id
        .route(
            "/api/players/{player}",
            get(api::game::get_player).patch(api::game::update_player),
        )
        .route(
            "/api/players/{player}/quests",
            get(api::game::player_quests),
        )
        .route(
            "/api/players/{player}/quests/{quest_id}/complete",
            post(api::game::complete_quest),
        )
        .route(
            "/api/guilds",
            get(api::game::list_guilds).post(api::game::create_guild),
        )
        .route("/api/quests", get(api::game::active_quests))
        .route(
            "/api/items",
            get(api::game::list_items).post(api::game::create_item),
        )
        .route("/api/transactions", post(api::game::create_transaction))
        .route(
            "/api/transactions/{wallet_address}",
            get(api::game::wallet_transactions),
        )
        .route(
            "/api/transactions/hash/{tx_hash}/status",
            patch(api::game::update_transaction_status),
        )
        .route("/api/staking", post(api::game::create_staking_position))
        .route(
            "/api/staking/{wallet_address}",
            get(api::game::staking_positions),
        )
        .route(
            "/api/dao/proposals",
            get(api::game::list_proposals).post(api::game::create_proposal),
        )
        .route(
            "/api/dao/proposals/{proposal_id}/votes",
            get(api::game::proposal_votes),
        )
        .route("/api/dao/votes", post(api::game::cast_vote))
        .route("/api/cqt-price", get(api::game::cqt_price))
        // WebSocket
        .route("/ws/payments", get(websocket::payments::handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
