//! Configuration Management
//!
//! Reads the persisted defaults for gcp-blast from `<config_dir>/gcp-blast/config.json`.

use crate::gcp::auth;
use crate::resource::ScopeParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// User configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Default project ID
    #[serde(default)]
    pub project_id: Option<String>,
    /// Default region for regional types
    #[serde(default)]
    pub region: Option<String>,
    /// Default zone or location for location-scoped types
    #[serde(default)]
    pub location: Option<String>,
    /// Extra `*.json` declarations layered over the built-in ones
    #[serde(default)]
    pub declarations_dir: Option<PathBuf>,
}

impl Config {
    /// Directory holding config and log files
    pub fn app_dir() -> Option<PathBuf> {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .map(|p| p.join("gcp-blast"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::app_dir().map(|p| p.join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Missing or unreadable files give the default configuration
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Get effective project (CLI > config > environment > gcloud default)
    pub fn effective_project(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.project_id.clone())
            .or_else(auth::get_default_project)
    }

    /// Get effective region (CLI > config > environment > gcloud default)
    pub fn effective_region(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.region.clone())
            .or_else(auth::get_default_region)
    }

    /// Get effective location (CLI > config)
    pub fn effective_location(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string).or_else(|| self.location.clone())
    }

    /// Scope parameters for binding adapters
    ///
    /// A missing project is left empty so binding reports which parameter is
    /// absent for the type being resolved.
    pub fn scope_params(&self, project: Option<&str>, region: Option<&str>, location: Option<&str>) -> ScopeParams {
        ScopeParams {
            project: self.effective_project(project).unwrap_or_default(),
            region: self.effective_region(region),
            location: self.effective_location(location),
        }
    }
}
