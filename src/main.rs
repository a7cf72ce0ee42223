//! Solana Rebound Agent - returns deposits to a random recent depositor
//!
//! # WARNING
//! - This agent custodies real funds and forwards them autonomously.
//! - The wallet key exists only inside the enclave; there is no recovery
//!   path outside the rofl-appd key service.
//! - Depositors not selected in their deposit's cycle are never rewarded.

use std::collections::HashMap;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

// Use the library crate
use solana_rebound::chain::RpcChainClient;
use solana_rebound::config::Config;
use solana_rebound::monitor::Monitor;
use solana_rebound::rofl::{KeyKind, RoflClient};
use solana_rebound::wallet::WalletIdentity;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("solana_rebound=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path =
        std::env::var("REBOUND_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = match Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Provision the wallet before any cycle can begin; every failure in
    // here is fatal and nothing gets published on a partial identity.
    let wallet = match provision(&config).await {
        Ok(wallet) => wallet,
        Err(e) => {
            error!("Startup provisioning failed: {}", e);
            std::process::exit(1);
        }
    };

    info!("Solana Address: {}", wallet.pubkey());
    info!("Monitoring for incoming transactions...");

    let chain = RpcChainClient::new(
        config.rpc.endpoint.clone(),
        std::time::Duration::from_millis(config.rpc.timeout_ms),
        config.commitment(),
        config.monitor.signature_page_limit,
    );

    let monitor = Monitor::new(chain, wallet, config.monitor.clone(), None);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received ctrl-c, shutting down");
            signal_token.cancel();
        }
    });

    monitor.run(shutdown).await;

    Ok(())
}

/// Derive the wallet from the enclave and publish its discovery metadata
async fn provision(config: &Config) -> solana_rebound::Result<WalletIdentity> {
    let rofl = RoflClient::new(&config.rofl.socket_path);

    let app_id = rofl.app_id().await?;
    info!("Running as {}", app_id);

    // Generate Ed25519 key inside the ROFL enclave
    let key_material = rofl
        .generate_key(&config.rofl.key_id, KeyKind::Ed25519)
        .await?;
    let wallet = WalletIdentity::from_enclave_seed(&key_material)?;

    // Publish wallet address and network to instance metadata
    let metadata = HashMap::from([
        ("address".to_string(), wallet.pubkey().to_string()),
        ("network".to_string(), config.rofl.network.clone()),
    ]);
    rofl.set_metadata(&metadata).await?;

    Ok(wallet)
}
