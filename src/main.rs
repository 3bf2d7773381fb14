//! Private Swap Engine
//!
//! HTTP API server driving private token swaps against an AMM contract:
//! wallet connection, quoting, allowance approval and `swapPrivate`
//! submission over JSON-RPC.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use private_swap_engine::api;
use private_swap_engine::chain::rpc::RpcClient;
use private_swap_engine::chain::wallet::RpcWallet;
use private_swap_engine::chain::WalletConnector;
use private_swap_engine::config::EngineConfig;
use private_swap_engine::swap::tokens::format_address;
use private_swap_engine::swap::{SessionManager, TokenCatalog};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = EngineConfig::from_env()?;
    match config.contract_address {
        Some(address) => tracing::info!("Swap contract: {}", format_address(&address)),
        None => tracing::warn!("SWAP_CONTRACT_ADDRESS not set; quotes and approvals will fail"),
    }
    tracing::info!(
        "RPC {} (chain {}), slippage {} bps",
        config.rpc_url,
        config.chain_id,
        config.slippage_bps
    );

    let client = Arc::new(RpcClient::new(config.rpc_url.clone()));
    let catalog = Arc::new(TokenCatalog::default());
    tracing::info!("Token catalog: {} tokens", catalog.all().len());

    // Each session gets its own wallet over the shared client
    let wallet_client = client.clone();
    let chain_id = config.chain_id;
    let account = config.wallet_account;
    let poll_interval = config.receipt_poll_interval;
    let wallet_factory = Box::new(move || -> Arc<dyn WalletConnector> {
        Arc::new(RpcWallet::new(
            wallet_client.clone(),
            chain_id,
            account,
            poll_interval,
        ))
    });

    let session_manager = Arc::new(SessionManager::new(
        config.flow_settings(),
        catalog,
        client,
        wallet_factory,
    ));
    tracing::info!("SessionManager initialized");

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api::router(session_manager))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let addr = config.bind_addr;
    tracing::info!("Starting server on {}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET    /health                             - Health check");
    tracing::info!("  GET    /api/tokens?q=                      - Search token catalog");
    tracing::info!("  POST   /api/session                        - Start a swap flow");
    tracing::info!("  GET    /api/session/:id                    - Flow state");
    tracing::info!("  DELETE /api/session/:id                    - Drop a swap flow");
    tracing::info!("  POST   /api/session/:id/reset              - Reset to initial state");
    tracing::info!("  DELETE /api/session/:id/last-tx            - Dismiss last receipt");
    tracing::info!("  POST   /api/session/:id/wallet/connect     - Connect wallet");
    tracing::info!("  POST   /api/session/:id/wallet/disconnect  - Disconnect wallet");
    tracing::info!("  POST   /api/session/:id/wallet/refresh     - Re-read wallet");
    tracing::info!("  POST   /api/session/:id/step               - Move between steps");
    tracing::info!("  POST   /api/session/:id/pair               - Select tokens or flip");
    tracing::info!("  POST   /api/session/:id/amount             - Set amount or max");
    tracing::info!("  POST   /api/session/:id/privacy            - Toggle privacy");
    tracing::info!("  POST   /api/session/:id/quote/refresh      - Re-run quote");
    tracing::info!("  POST   /api/session/:id/allowance/refresh  - Re-read allowance");
    tracing::info!("  POST   /api/session/:id/approve            - Approve input amount");
    tracing::info!("  POST   /api/session/:id/swap               - Submit private swap");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}
