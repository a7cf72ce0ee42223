//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub rofl: RoflConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_commitment")]
    pub commitment: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            commitment: default_commitment(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between balance polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Lamports withheld from a forwarded balance to cover the transfer fee
    #[serde(default = "default_fee_reserve_lamports")]
    pub fee_reserve_lamports: u64,

    /// Max signatures fetched per history scan
    #[serde(default = "default_signature_page_limit")]
    pub signature_page_limit: usize,

    /// Consecutive failed cycles before switching to the degraded interval
    #[serde(default = "default_degraded_after_failures")]
    pub degraded_after_failures: u32,

    /// Poll interval once degraded, until a cycle succeeds again
    #[serde(default = "default_degraded_interval_secs")]
    pub degraded_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            fee_reserve_lamports: default_fee_reserve_lamports(),
            signature_page_limit: default_signature_page_limit(),
            degraded_after_failures: default_degraded_after_failures(),
            degraded_interval_secs: default_degraded_interval_secs(),
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn degraded_interval(&self) -> Duration {
        Duration::from_secs(self.degraded_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoflConfig {
    /// Path to the rofl-appd Unix socket
    #[serde(default = "default_appd_socket")]
    pub socket_path: String,

    /// Key id passed to the enclave key derivation endpoint
    #[serde(default = "default_key_id")]
    pub key_id: String,

    /// Network label published alongside the wallet address
    #[serde(default = "default_network")]
    pub network: String,
}

impl Default for RoflConfig {
    fn default() -> Self {
        Self {
            socket_path: default_appd_socket(),
            key_id: default_key_id(),
            network: default_network(),
        }
    }
}

fn default_rpc_endpoint() -> String {
    "https://api.testnet.solana.com".to_string()
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_fee_reserve_lamports() -> u64 {
    5000
}

fn default_signature_page_limit() -> usize {
    1000
}

fn default_degraded_after_failures() -> u32 {
    5
}

fn default_degraded_interval_secs() -> u64 {
    300
}

fn default_appd_socket() -> String {
    "/run/rofl-appd.sock".to_string()
}

fn default_key_id() -> String {
    "solana-wallet".to_string()
}

fn default_network() -> String {
    "testnet".to_string()
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix REBOUND_)
            .add_source(
                config::Environment::with_prefix("REBOUND")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.monitor.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }

        if self.monitor.degraded_interval_secs < self.monitor.poll_interval_secs {
            anyhow::bail!("degraded_interval_secs must not undercut poll_interval_secs");
        }

        if self.monitor.signature_page_limit == 0 || self.monitor.signature_page_limit > 1000 {
            anyhow::bail!(
                "signature_page_limit must be between 1 and 1000, got {}",
                self.monitor.signature_page_limit
            );
        }

        match self.rpc.commitment.as_str() {
            "processed" | "confirmed" | "finalized" => {}
            other => anyhow::bail!("Unknown commitment level: {}", other),
        }

        if self.rofl.key_id.is_empty() {
            anyhow::bail!("rofl.key_id must not be empty");
        }

        Ok(())
    }

    /// Commitment config for the RPC client
    pub fn commitment(&self) -> solana_sdk::commitment_config::CommitmentConfig {
        match self.rpc.commitment.as_str() {
            "processed" => solana_sdk::commitment_config::CommitmentConfig::processed(),
            "finalized" => solana_sdk::commitment_config::CommitmentConfig::finalized(),
            _ => solana_sdk::commitment_config::CommitmentConfig::confirmed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config {
            rpc: RpcConfig::default(),
            monitor: MonitorConfig::default(),
            rofl: RoflConfig::default(),
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.monitor.fee_reserve_lamports, 5000);
        assert_eq!(config.monitor.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.rofl.socket_path, "/run/rofl-appd.sock");
    }

    #[test]
    fn test_rejects_zero_interval() {
        let config = Config {
            rpc: RpcConfig::default(),
            monitor: MonitorConfig {
                poll_interval_secs: 0,
                ..Default::default()
            },
            rofl: RoflConfig::default(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_commitment() {
        let config = Config {
            rpc: RpcConfig {
                commitment: "instant".to_string(),
                ..Default::default()
            },
            monitor: MonitorConfig::default(),
            rofl: RoflConfig::default(),
        };
        assert!(config.validate().is_err());
    }
}
