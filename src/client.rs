//! Outbound lookup boundary
//!
//! The stream assembler talks to the vulnerability database through the
//! [`VulnLookup`] seam; [`LookupClient`] is the production implementation.
//! One POST per invocation, no retries, no request timeout: the only bounded
//! wait is the external call's own completion.

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::request::RequestBody;
use async_trait::async_trait;
use reqwest::Client;

/// Capability of performing one search against the vulnerability database.
#[async_trait]
pub trait VulnLookup: Send + Sync {
    /// POST the request body and return the raw newline-delimited response
    /// body exactly as the service produced it.
    async fn search(&self, body: &RequestBody) -> Result<String>;
}

/// HTTP client for the lookup service.
///
/// Carries its configuration by value at construction time; nothing here
/// reads ambient global state.
#[derive(Debug, Clone)]
pub struct LookupClient {
    client: Client,
    endpoint: String,
    virtual_host: String,
    credential: String,
}

impl LookupClient {
    /// Create a new lookup client from injected configuration.
    pub fn new(config: &RelayConfig) -> Result<Self> {
        // No .timeout(): the upstream request is allowed to run as long as
        // the service needs; heartbeats cover the wait.
        let client = Client::builder()
            .user_agent(format!("cvemap-relay/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.lookup.endpoint.clone(),
            virtual_host: config.lookup.virtual_host.clone(),
            credential: config.credential.clone(),
        })
    }

    /// Endpoint the client will POST to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl VulnLookup for LookupClient {
    async fn search(&self, body: &RequestBody) -> Result<String> {
        tracing::debug!("POST {} (host {})", self.endpoint, self.virtual_host);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.credential))
            .header("Host", &self.virtual_host)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::network(format!("Lookup request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::network(format!(
                "Lookup service error {}: {}",
                status,
                error_text.trim()
            )));
        }

        let text = response.text().await?;
        tracing::debug!("lookup response: {} bytes", text.len());
        Ok(text)
    }
}
