//! GCP Client
//!
//! Combines credentials and the HTTP client. URLs come fully resolved from
//! bound adapters, so the client itself carries no project or region.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use anyhow::{Context, Result};
use serde_json::Value;

#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
}

impl GcpClient {
    /// Client authenticated with Application Default Credentials
    pub async fn new() -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        Ok(Self {
            credentials,
            http: GcpHttpClient::new()?,
        })
    }

    /// Client that sends a fixed bearer token
    pub fn with_static_token(token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            credentials: GcpCredentials::from_token(token),
            http: GcpHttpClient::new()?,
        })
    }

    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }
}
