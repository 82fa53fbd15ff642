//! Public IP resolution for the `"current"` sentinel

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IpLookupError {
    #[error("public IP lookup failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("public IP lookup returned malformed data: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait PublicIpResolver: Send + Sync {
    async fn lookup(&self) -> Result<IpAddr, IpLookupError>;
}

/// Resolves the caller's public IP via a plain-text HTTP endpoint
pub struct HttpIpResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpIpResolver {
    pub fn new() -> Self {
        Self::with_endpoint("https://checkip.amazonaws.com")
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client with static configuration");
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl Default for HttpIpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PublicIpResolver for HttpIpResolver {
    async fn lookup(&self) -> Result<IpAddr, IpLookupError> {
        let body = self
            .client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let trimmed = body.trim();
        trimmed
            .parse()
            .map_err(|_| IpLookupError::Malformed(trimmed.to_string()))
    }
}

/// Fixed resolver for tests and offline runs
pub struct FixedIpResolver(pub IpAddr);

#[async_trait]
impl PublicIpResolver for FixedIpResolver {
    async fn lookup(&self) -> Result<IpAddr, IpLookupError> {
        Ok(self.0)
    }
}
