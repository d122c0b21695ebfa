//! GCP API interaction module
//!
//! Authentication, the HTTP client and gcloud configuration defaults. This
//! layer only calls URLs the resource catalog has already resolved.
//!
//! # Module Structure
//!
//! - [`auth`] - Access tokens (ADC or static) and gcloud project/region defaults
//! - [`client`] - Main GCP client for making API requests
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use gcp_blast::gcp::client::GcpClient;
//!
//! async fn example(url: &str) -> anyhow::Result<()> {
//!     let client = GcpClient::new().await?;
//!     let body = client.get(url).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
