//! Scope Model
//!
//! How a resource type is addressed, and which positional parameters an
//! endpoint needs before it can produce URLs.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Addressing granularity of a resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeLevel {
    /// Project-owned but not placed anywhere (e.g. `.../global/urlMaps`)
    Global,
    /// Addressed directly under the project
    Project,
    /// Lives under `regions/{region}`
    Regional,
    /// Lives under a location or zone (`locations/{location}`, `zones/{location}`)
    Location,
}

impl ScopeLevel {
    pub const ALL: [ScopeLevel; 4] = [
        ScopeLevel::Global,
        ScopeLevel::Project,
        ScopeLevel::Regional,
        ScopeLevel::Location,
    ];

    /// Names of the positional parameters, in order
    pub fn required_params(self) -> &'static [&'static str] {
        match self {
            Self::Global | Self::Project => &["project"],
            Self::Regional => &["project", "region"],
            Self::Location => &["project", "location"],
        }
    }

    /// Template placeholder that must appear for this scope, beyond `{project}`
    pub(crate) fn scope_placeholder(self) -> Option<&'static str> {
        match self {
            Self::Global | Self::Project => None,
            Self::Regional => Some("region"),
            Self::Location => Some("location"),
        }
    }

    /// Check a positional parameter list against this scope
    ///
    /// Rejects missing or empty parameters (reporting the first offending
    /// position) and surplus parameters.
    pub fn validate_params(self, params: &[&str]) -> Result<(), ConfigurationError> {
        let required = self.required_params();

        for (position, name) in required.iter().enumerate() {
            match params.get(position) {
                Some(value) if !value.trim().is_empty() => {},
                _ => {
                    return Err(ConfigurationError::MissingScopeParameter {
                        scope: self,
                        position,
                        name,
                    })
                },
            }
        }

        if params.len() > required.len() {
            return Err(ConfigurationError::TooManyScopeParameters {
                scope: self,
                expected: required.len(),
                got: params.len(),
            });
        }

        Ok(())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Project => "project",
            Self::Regional => "regional",
            Self::Location => "location",
        }
    }
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope values available to the caller (from config or CLI)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeParams {
    pub project: String,
    pub region: Option<String>,
    pub location: Option<String>,
}

impl ScopeParams {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Default::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Positional parameters for `scope`
    ///
    /// Absent values come back as empty strings so that binding reports
    /// exactly which one is missing.
    pub fn positional(&self, scope: ScopeLevel) -> Vec<&str> {
        match scope {
            ScopeLevel::Global | ScopeLevel::Project => vec![self.project.as_str()],
            ScopeLevel::Regional => vec![self.project.as_str(), self.region.as_deref().unwrap_or("")],
            ScopeLevel::Location => vec![self.project.as_str(), self.location.as_deref().unwrap_or("")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_param_counts() {
        assert_eq!(ScopeLevel::Global.required_params().len(), 1);
        assert_eq!(ScopeLevel::Project.required_params().len(), 1);
        assert_eq!(ScopeLevel::Regional.required_params(), &["project", "region"]);
        assert_eq!(ScopeLevel::Location.required_params(), &["project", "location"]);
    }

    #[test]
    fn test_missing_region_is_reported_by_position() {
        let err = ScopeLevel::Regional
            .validate_params(&["proj1", ""])
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingScopeParameter {
                scope: ScopeLevel::Regional,
                position: 1,
                name: "region",
            }
        );
    }

    #[test]
    fn test_whitespace_counts_as_empty() {
        assert!(ScopeLevel::Project.validate_params(&["  "]).is_err());
    }

    #[test]
    fn test_surplus_params_rejected() {
        let err = ScopeLevel::Global
            .validate_params(&["proj1", "us-central1"])
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::TooManyScopeParameters { expected: 1, got: 2, .. }
        ));
    }

    #[test]
    fn test_positional_from_params() {
        let params = ScopeParams::new("proj1").with_region("europe-west1");
        assert_eq!(params.positional(ScopeLevel::Regional), vec!["proj1", "europe-west1"]);
        assert_eq!(params.positional(ScopeLevel::Location), vec!["proj1", ""]);
        assert!(ScopeLevel::Location
            .validate_params(&params.positional(ScopeLevel::Location))
            .is_err());
    }
}
