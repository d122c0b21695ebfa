//! Resource-type catalog and blast-radius engine for Google Cloud
//!
//! Every supported GCP resource type is declared once (scope, URL templates,
//! unique attribute keys, IAM needs, field-path edges to other types and
//! Terraform lookups). From those declarations the crate resolves API URLs,
//! answers "what does a change here affect" over the type graph, extracts
//! linked resources from live bodies, and checks the declarations for
//! consistency.
//!
//! - [`resource`] - the catalog itself, traversal and validation
//! - [`gcp`] - authentication and HTTP access to resolved URLs
//! - [`config`] - persisted defaults for the command-line tool

pub mod config;
pub mod error;
pub mod gcp;
pub mod resource;

pub use error::{ConfigurationError, Error, Result};
