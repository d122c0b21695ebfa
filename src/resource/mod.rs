//! Resource abstraction layer
//!
//! Resource types are declared in JSON files compiled into the binary, so a
//! new type can be added without code changes. Each declaration contributes
//! three things at once: adapter metadata (scope, endpoints, unique keys,
//! IAM needs), blast propagation edges, and Terraform lookups.
//!
//! # Architecture
//!
//! - [`scope`] - Scope levels and their positional parameters
//! - [`endpoint`] - URL templates bound to a scope into Get/List/Search URLs
//! - [`adapter`] - Per-type adapter metadata
//! - [`blast`] - Field-path graph between types and its traversals
//! - [`terraform`] - Terraform resource to lookup query mappings
//! - [`registry`] - Loads declarations and freezes them into a [`Catalog`]
//! - [`validate`] - Consistency checks over a catalog
//! - [`fetcher`] - Fetches resources from GCP APIs with pagination support
//!
//! # Example
//!
//! ```ignore
//! use gcp_blast::resource::{builtin, Propagation, ScopeParams};
//!
//! let catalog = builtin();
//! let bound = catalog.bind("gcp-compute-forwarding-rule", &ScopeParams::new("p").with_region("us-central1"))?;
//! let url = bound.get_url("fr-1")?;
//! let radius = catalog.blast_radius("gcp-compute-backend-service", Propagation::Downstream, None)?;
//! ```

pub mod adapter;
pub mod blast;
pub mod endpoint;
mod fetcher;
pub mod links;
pub mod registry;
pub mod scope;
pub mod terraform;
pub mod validate;

pub use adapter::{AdapterMeta, AdapterRegistry, Category, ResourceTypeId};
pub use blast::{
    linked_queries, traverse_instances, BlastGraph, BlastMap, BlastPropagation, BlastRadius,
    Direction, EdgeRef, Hop, Impact, InstanceHop, InstanceSource, LinkedQuery, Propagation,
};
pub use endpoint::{BoundAdapter, EndpointFunc, Enumeration, Operation, UrlTemplate, QUERY_SEPARATOR};
pub use fetcher::{fetch_collection, fetch_item, fetch_offerable, Collection};
pub use registry::{builtin, Catalog, CatalogBuilder, Declaration};
pub use scope::{ScopeLevel, ScopeParams};
pub use terraform::{TerraformLookup, TerraformMapping, TerraformMethod, TerraformRegistry};
pub use validate::{validate, Finding, SchemaSnapshot, Severity};
