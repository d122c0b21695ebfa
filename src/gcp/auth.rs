//! GCP Authentication
//!
//! Access tokens come from Application Default Credentials (ADC) or, for
//! tests and CI, from a fixed bearer token. Project and region defaults are
//! read from the environment and the gcloud configuration.

use anyhow::{Context, Result};
use gcp_auth::TokenProvider;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default scopes for GCP API access
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

/// Refresh tokens this long before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Assumed token lifetime (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Where access tokens come from
#[derive(Clone)]
pub enum GcpCredentials {
    Adc {
        provider: Arc<dyn TokenProvider>,
        token_cache: Arc<RwLock<Option<CachedToken>>>,
    },
    Static(String),
}

#[derive(Clone)]
pub struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl GcpCredentials {
    /// Credentials from Application Default Credentials
    pub async fn new() -> Result<Self> {
        let provider = gcp_auth::provider().await.context(
            "Failed to initialize GCP authentication. Run 'gcloud auth application-default login'",
        )?;

        Ok(Self::Adc {
            provider,
            token_cache: Arc::new(RwLock::new(None)),
        })
    }

    /// A fixed bearer token, never refreshed
    pub fn from_token(token: impl Into<String>) -> Self {
        Self::Static(token.into())
    }

    /// Get an access token for API calls
    pub async fn get_token(&self) -> Result<String> {
        let (provider, token_cache) = match self {
            Self::Static(token) => return Ok(token.clone()),
            Self::Adc { provider, token_cache } => (provider, token_cache),
        };

        {
            let cache = token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = provider
            .token(DEFAULT_SCOPES)
            .await
            .context("Failed to get access token")?;
        let token_str = token.as_str().to_string();

        let expires_at = Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;
        *token_cache.write().await = Some(CachedToken {
            token: token_str.clone(),
            expires_at,
        });

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            (DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(token_str)
    }
}

/// Get the gcloud configuration directory
pub fn get_gcloud_config_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CLOUDSDK_CONFIG") {
        return Some(PathBuf::from(path));
    }

    dirs::config_dir().map(|p| p.join("gcloud"))
}

/// Validate a GCP project ID format
/// Project IDs must be 6-30 characters, lowercase letters, digits, and hyphens
/// Must start with a letter and cannot end with a hyphen
pub fn validate_project_id(project: &str) -> bool {
    if project.len() < 6 || project.len() > 30 {
        return false;
    }

    match project.chars().next() {
        Some(c) if c.is_ascii_lowercase() => {},
        _ => return false,
    }

    if project.ends_with('-') {
        return false;
    }

    project.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Region names are lowercase letters, digits and hyphens (`us-central1`)
fn validate_region(region: &str) -> bool {
    !region.is_empty()
        && region.contains('-')
        && region.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Value of `key` inside `[section]` of an INI-style gcloud file
fn ini_value(content: &str, section: &str, key: &str) -> Option<String> {
    let header = format!("[{}]", section);
    let mut in_section = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            in_section = line == header;
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((name, value)) = line.split_once('=') {
            if name.trim() == key {
                return Some(value.trim().to_string());
            }
        }
    }

    None
}

/// Contents of the active gcloud configuration file
fn active_configuration(config_dir: &std::path::Path) -> Option<String> {
    let active_config = std::fs::read_to_string(config_dir.join("active_config")).ok()?;
    let config_name = active_config.trim();

    // Security: Validate config name to prevent path traversal
    if !config_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        tracing::warn!("Invalid characters in active_config name");
        return None;
    }

    std::fs::read_to_string(
        config_dir
            .join("configurations")
            .join(format!("config_{}", config_name)),
    )
    .ok()
}

/// Read the default project from the environment or gcloud configuration
/// Security: Validates project ID format before returning
pub fn get_default_project() -> Option<String> {
    for var in ["CLOUDSDK_CORE_PROJECT", "GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"] {
        if let Ok(project) = std::env::var(var) {
            if validate_project_id(&project) {
                return Some(project);
            }
            tracing::warn!("Invalid project ID format in {}", var);
        }
    }

    let config_dir = get_gcloud_config_dir()?;

    if let Ok(content) = std::fs::read_to_string(config_dir.join("properties")) {
        if let Some(project) = ini_value(&content, "core", "project").filter(|p| validate_project_id(p)) {
            return Some(project);
        }
    }

    active_configuration(&config_dir)
        .and_then(|content| ini_value(&content, "core", "project"))
        .filter(|p| validate_project_id(p))
}

/// Read the default region from the environment or gcloud configuration
///
/// Falls back to the region of the configured default zone.
pub fn get_default_region() -> Option<String> {
    if let Ok(region) = std::env::var("CLOUDSDK_COMPUTE_REGION") {
        if validate_region(&region) {
            return Some(region);
        }
        tracing::warn!("Invalid region format in CLOUDSDK_COMPUTE_REGION");
    }

    let content = active_configuration(&get_gcloud_config_dir()?)?;
    ini_value(&content, "compute", "region")
        .or_else(|| ini_value(&content, "compute", "zone").map(|zone| region_of_zone(&zone)))
        .filter(|r| validate_region(r))
}

/// `us-central1-a` -> `us-central1`
pub fn region_of_zone(zone: &str) -> String {
    match zone.rsplit_once('-') {
        Some((region, suffix)) if suffix.len() == 1 => region.to_string(),
        _ => zone.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_project_id() {
        assert!(validate_project_id("my-project-123"));
        assert!(!validate_project_id("short"));
        assert!(!validate_project_id("1-starts-with-digit"));
        assert!(!validate_project_id("ends-with-hyphen-"));
        assert!(!validate_project_id("Has-Upper-Case"));
    }

    #[test]
    fn test_ini_value_reads_section() {
        let content = "[core]\naccount = me@example.com\nproject = my-project-123\n\n[compute]\n# comment\nzone = europe-west1-b\n";
        assert_eq!(ini_value(content, "core", "project").as_deref(), Some("my-project-123"));
        assert_eq!(ini_value(content, "compute", "zone").as_deref(), Some("europe-west1-b"));
        assert_eq!(ini_value(content, "compute", "project"), None);
    }

    #[test]
    fn test_region_of_zone() {
        assert_eq!(region_of_zone("us-central1-a"), "us-central1");
        assert_eq!(region_of_zone("europe-west1"), "europe-west1");
    }

    #[tokio::test]
    async fn test_static_token() {
        let credentials = GcpCredentials::from_token("abc");
        assert_eq!(credentials.get_token().await.unwrap(), "abc");
    }
}
