//! Error types for the rebound agent

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the rebound agent
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // rofl-appd provisioning channel errors (all startup-fatal)
    #[error("rofl-appd socket missing: {0}")]
    AppdUnavailable(String),

    #[error("rofl-appd request failed: {0}")]
    Appd(String),

    #[error("Invalid key material from rofl-appd: {0}")]
    InvalidKeyMaterial(String),

    #[error("Invalid app id from rofl-appd: {0}")]
    InvalidAppId(String),

    #[error("Metadata publish failed: status {status}: {body}")]
    MetadataRejected { status: u16, body: String },

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Invalid signature in RPC response: {0}")]
    InvalidSignature(String),

    // Forwarding errors
    #[error("Transaction send failed: {0}")]
    TransactionSend(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is transient (safe to retry on the next cycle)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_) | Error::InvalidSignature(_) | Error::TransactionSend(_)
        )
    }

    /// Check if this error must abort startup before any cycle begins
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            Error::AppdUnavailable(_)
                | Error::Appd(_)
                | Error::InvalidKeyMaterial(_)
                | Error::InvalidAppId(_)
                | Error::MetadataRejected { .. }
                | Error::Config(_)
        )
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        Error::Rpc(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

// Conversions from the hyper client stack used for the appd socket
impl From<hyper::Error> for Error {
    fn from(e: hyper::Error) -> Self {
        Error::Appd(e.to_string())
    }
}

impl From<hyper_util::client::legacy::Error> for Error {
    fn from(e: hyper_util::client::legacy::Error) -> Self {
        Error::Appd(e.to_string())
    }
}

impl From<hyper::http::Error> for Error {
    fn from(e: hyper::http::Error) -> Self {
        Error::Appd(e.to_string())
    }
}
