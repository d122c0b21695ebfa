//! Error types for the resource catalog
//!
//! Three kinds of failure exist at this layer: a resource type that cannot be
//! configured (bad scope parameters or a malformed declaration), a lookup for
//! a type nobody registered, and an operation the type does not support.
//! None of them are retried here.

use crate::resource::{Operation, ResourceTypeId, ScopeLevel};
use thiserror::Error;

/// Result alias used by the catalog and resolver
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level catalog error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("unknown resource type: {type_id}")]
    NotFound { type_id: ResourceTypeId },

    #[error("{operation} is not supported for {type_id}")]
    Unsupported {
        type_id: ResourceTypeId,
        operation: Operation,
    },
}

impl Error {
    pub fn not_found(type_id: impl Into<ResourceTypeId>) -> Self {
        Self::NotFound {
            type_id: type_id.into(),
        }
    }

    pub fn unsupported(type_id: impl Into<ResourceTypeId>, operation: Operation) -> Self {
        Self::Unsupported {
            type_id: type_id.into(),
            operation,
        }
    }

    /// Whether callers should skip the type rather than fail the whole run
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Unsupported { .. })
    }
}

/// A resource type that cannot be turned into a working resolver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Positional scope parameter `position` (0-based) was absent or empty
    #[error("{scope} scope is missing parameter #{position} ({name})")]
    MissingScopeParameter {
        scope: ScopeLevel,
        position: usize,
        name: &'static str,
    },

    #[error("{scope} scope takes {expected} parameter(s), got {got}")]
    TooManyScopeParameters {
        scope: ScopeLevel,
        expected: usize,
        got: usize,
    },

    #[error("invalid endpoint template `{template}`: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("invalid declaration for {type_id}: {reason}")]
    InvalidDeclaration { type_id: String, reason: String },

    #[error("failed to parse declarations: {0}")]
    Parse(String),
}

impl ConfigurationError {
    pub fn template(template: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template: template.to_string(),
            reason: reason.into(),
        }
    }

    pub fn declaration(type_id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDeclaration {
            type_id: type_id.to_string(),
            reason: reason.into(),
        }
    }
}
