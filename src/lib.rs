//! Solana Rebound Agent Library
//!
//! ROFL enclave agent that watches a derived Solana wallet and returns
//! incoming deposits to a randomly chosen recent depositor.

pub mod chain;
pub mod config;
pub mod error;
pub mod monitor;
pub mod rofl;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
