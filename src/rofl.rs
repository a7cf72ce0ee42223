//! rofl-appd provisioning channel client
//!
//! Talks to the enclave key service over its local Unix socket. All three
//! operations are used at startup only; a missing socket is fatal before
//! any request is attempted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::Request;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use hyperlocal::{UnixConnector, Uri};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Key kinds supported by the enclave key derivation endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyKind {
    #[serde(rename = "secp256k1")]
    Secp256k1,
    #[serde(rename = "ed25519")]
    Ed25519,
    #[serde(rename = "raw-256")]
    Raw256,
    #[serde(rename = "raw-386")]
    Raw386,
}

#[derive(Serialize)]
struct GenerateKeyRequest<'a> {
    key_id: &'a str,
    kind: KeyKind,
}

#[derive(Deserialize)]
struct GenerateKeyResponse {
    key: String,
}

/// Client for the rofl-appd Unix socket
pub struct RoflClient {
    socket_path: PathBuf,
    client: Client<UnixConnector, Full<Bytes>>,
}

impl RoflClient {
    /// Create a client for the given socket path
    pub fn new<P: AsRef<Path>>(socket_path: P) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            client: Client::builder(TokioExecutor::new()).build(UnixConnector),
        }
    }

    /// Derive key material for the given id and kind
    ///
    /// Returns hex key material normalized to a 0x prefix.
    pub async fn generate_key(&self, key_id: &str, kind: KeyKind) -> Result<String> {
        self.ensure_socket()?;

        let body = serde_json::to_vec(&GenerateKeyRequest { key_id, kind })?;
        let uri: hyper::Uri = Uri::new(&self.socket_path, "/rofl/v1/keys/generate").into();
        let request = Request::post(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))?;

        let response = self.client.request(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();

        if !status.is_success() {
            return Err(Error::Appd(format!(
                "key generation returned {}: {}",
                status,
                String::from_utf8_lossy(&bytes)
            )));
        }

        let parsed: GenerateKeyResponse = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Appd(format!("bad key response: {}", e)))?;
        if parsed.key.is_empty() {
            return Err(Error::Appd("empty key in response".to_string()));
        }

        debug!("Derived key material for id '{}'", key_id);

        Ok(normalize_hex(parsed.key))
    }

    /// Publish key/value metadata for external discovery
    pub async fn set_metadata(&self, metadata: &HashMap<String, String>) -> Result<()> {
        self.ensure_socket()?;

        let body = serde_json::to_vec(metadata)?;
        let uri: hyper::Uri = Uri::new(&self.socket_path, "/rofl/v1/metadata").into();
        let request = Request::post(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))?;

        let response = self.client.request(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();

        if status.as_u16() >= 400 {
            return Err(Error::MetadataRejected {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).to_string(),
            });
        }

        Ok(())
    }

    /// Fetch and validate the enclave app identifier
    pub async fn app_id(&self) -> Result<String> {
        self.ensure_socket()?;

        let uri: hyper::Uri = Uri::new(&self.socket_path, "/rofl/v1/app/id").into();
        let request = Request::get(uri).body(Full::new(Bytes::new()))?;

        let response = self.client.request(request).await?;
        let bytes = response.into_body().collect().await?.to_bytes();

        validate_app_id(&String::from_utf8_lossy(&bytes))
    }

    fn ensure_socket(&self) -> Result<()> {
        if !self.socket_path.exists() {
            return Err(Error::AppdUnavailable(
                self.socket_path.display().to_string(),
            ));
        }
        Ok(())
    }
}

/// Normalize hex key material to a 0x prefix
fn normalize_hex(key: String) -> String {
    if key.starts_with("0x") {
        key
    } else {
        format!("0x{}", key)
    }
}

/// Validate an app identifier against the rofl1 bech32-style prefix pattern
fn validate_app_id(raw: &str) -> Result<String> {
    let id = raw.trim();
    let pattern = regex::Regex::new(r"^rofl1[0-9a-z]+$").expect("valid app id pattern");
    if !pattern.is_match(id) {
        return Err(Error::InvalidAppId(raw.to_string()));
    }
    Ok(id.to_string())
}
