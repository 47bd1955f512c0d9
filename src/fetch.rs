//! Download of the remote setup script.
//!
//! One GET, no retry. Any transport error or non-2xx status is a failure,
//! and nothing downstream runs. When a SHA-256 pin is configured the body
//! is checked against it before it is handed to the runtime.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

/// User-Agent header sent with requests.
const USER_AGENT: &str = concat!("tina-setup/", env!("CARGO_PKG_VERSION"));

/// Script text fetched from a source URL. Opaque, never parsed here.
#[derive(Debug, Clone)]
pub struct RemoteScript {
    pub url: String,
    pub body: String,
}

impl RemoteScript {
    /// Lowercase hex SHA-256 of the body
    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(self.body.as_bytes()))
    }

    /// Fails unless the body hashes to `expected` (hex, case-insensitive).
    pub fn verify_sha256(&self, expected: &str) -> Result<()> {
        let actual = self.sha256_hex();
        if actual.eq_ignore_ascii_case(expected.trim()) {
            Ok(())
        } else {
            Err(anyhow!(
                "Integrity check failed for {}: expected sha256 {}, got {actual}",
                self.url,
                expected.trim()
            ))
        }
    }
}

/// Fetches script text from a URL.
#[async_trait]
pub trait ScriptFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RemoteScript>;
}

/// `reqwest`-backed fetcher.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher. Without a timeout a stalled server blocks forever.
    pub fn new(timeout: Option<Duration>) -> Self {
        let client = build_client(USER_AGENT, timeout).unwrap_or_else(|e| {
            warn!("Cannot build HTTP client ({e}), using defaults without timeout");
            Client::new()
        });

        Self { client }
    }

    /// Creates a fetcher around an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn build_client(user_agent: &str, timeout: Option<Duration>) -> reqwest::Result<Client> {
    let mut builder = Client::builder().user_agent(user_agent);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

#[async_trait]
impl ScriptFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<RemoteScript> {
        let parsed = url::Url::parse(url).map_err(|e| anyhow!("Invalid URL {url}: {e}"))?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(anyhow!(
                    "Unsupported URL scheme '{scheme}' (only http/https)"
                ));
            }
        }

        info!("Downloading setup script from {url}");

        let response = self.client.get(parsed).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Request failed with status code {}", status.as_u16()));
        }

        let body = response.text().await?;
        debug!("Fetched {} bytes from {url}", body.len());

        Ok(RemoteScript {
            url: url.to_string(),
            body,
        })
    }
}
