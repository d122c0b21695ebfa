//! HTTP utilities for GCP REST API calls

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Truncate a response body and strip control characters before logging
fn sanitize_for_log(body: &str) -> String {
    let truncated = match body.char_indices().nth(MAX_LOG_BODY_LENGTH) {
        Some((cut, _)) => format!("{}... [truncated, {} bytes total]", &body[..cut], body.len()),
        None => body.to_string(),
    };

    truncated.replace(char::is_control, "")
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    /// Client whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("gcp-blast/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(anyhow::anyhow!("API request failed: {}", status));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).context("Failed to parse response JSON")
    }
}

/// Format a GCP API error for display
/// Security: Sanitizes error messages to avoid leaking sensitive API details
pub fn format_gcp_error(error: &anyhow::Error) -> String {
    let error_str = format!("{:#}", error);

    let known = [
        ("403", "Permission denied. Check the IAM permissions listed by `describe`."),
        ("401", "Authentication failed. Run 'gcloud auth application-default login'."),
        ("404", "Resource not found."),
        ("429", "Rate limit exceeded. Please try again later."),
        ("400", "Invalid request. Check the query and scope parameters."),
        ("500", "GCP service temporarily unavailable. Please try again."),
        ("503", "GCP service temporarily unavailable. Please try again."),
    ];
    if let Some((_, message)) = known
        .iter()
        .find(|(code, _)| error_str.contains(&format!("API request failed: {}", code)))
    {
        return message.to_string();
    }

    if error_str.contains("API request failed") {
        return "Request failed. Check your network connection and try again.".to_string();
    }

    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(120)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates() {
        let body = "x".repeat(500);
        let logged = sanitize_for_log(&body);
        assert!(logged.starts_with(&"x".repeat(200)));
        assert!(logged.contains("500 bytes total"));
    }

    #[test]
    fn test_sanitize_strips_control_chars() {
        assert_eq!(sanitize_for_log("a\nb\tc"), "abc");
    }

    #[test]
    fn test_format_known_status() {
        let error = anyhow::anyhow!("API request failed: 403 Forbidden");
        assert!(format_gcp_error(&error).starts_with("Permission denied"));

        let error = anyhow::anyhow!("API request failed: 418 I'm a teapot");
        assert!(format_gcp_error(&error).starts_with("Request failed"));
    }
}
