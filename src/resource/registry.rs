//! Resource Registry - Load resource type declarations from JSON
//!
//! Declarations are embedded at compile time and merged into a [`Catalog`]:
//! the adapter metadata table, the blast propagation graph and the Terraform
//! mapping table. [`CatalogBuilder`] is the only writer; once built, a
//! catalog is immutable and can be shared freely between threads.

use super::adapter::{AdapterMeta, AdapterRegistry, ResourceTypeId};
use super::blast::{
    self, BlastGraph, BlastMap, BlastRadius, Direction, InstanceHop, InstanceSource, LinkedQuery,
    Propagation,
};
use super::endpoint::BoundAdapter;
use super::scope::ScopeParams;
use super::terraform::{TerraformMapping, TerraformRegistry};
use crate::error::{ConfigurationError, Error, Result};
use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

/// Embedded declaration files (compiled into the binary)
const RESOURCE_FILES: &[(&str, &str)] = &[
    ("compute.json", include_str!("../resources/compute.json")),
    ("secretmanager.json", include_str!("../resources/secretmanager.json")),
    ("kms.json", include_str!("../resources/kms.json")),
    ("pubsub.json", include_str!("../resources/pubsub.json")),
    ("storage.json", include_str!("../resources/storage.json")),
    ("monitoring.json", include_str!("../resources/monitoring.json")),
    ("aiplatform.json", include_str!("../resources/aiplatform.json")),
];

/// Everything one resource type contributes at registration
#[derive(Debug, Clone, Deserialize)]
pub struct Declaration {
    #[serde(flatten)]
    pub meta: AdapterMeta,
    #[serde(default)]
    pub blast_propagation: BlastMap,
    #[serde(default)]
    pub terraform: TerraformMapping,
    /// Keys no part of the declaration recognises
    #[serde(flatten)]
    unknown: BTreeMap<String, Value>,
}

impl Declaration {
    pub fn new(meta: AdapterMeta, blast_propagation: BlastMap, terraform: TerraformMapping) -> Self {
        Self {
            meta,
            blast_propagation,
            terraform,
            unknown: BTreeMap::new(),
        }
    }

    fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        let id = self.meta.type_id.as_str();
        if !self.unknown.is_empty() {
            let keys: Vec<&str> = self.unknown.keys().map(String::as_str).collect();
            return Err(ConfigurationError::declaration(
                id,
                format!("unknown key(s) `{}`", keys.join("`, `")),
            ));
        }
        self.meta.validate()?;

        for (field, impact) in &self.blast_propagation {
            if field.split('.').any(str::is_empty) {
                return Err(ConfigurationError::declaration(
                    id,
                    format!("malformed field path `{}`", field),
                ));
            }
            if impact.target.as_str().is_empty() {
                return Err(ConfigurationError::declaration(
                    id,
                    format!("edge `{}` has no target type", field),
                ));
            }
            if !impact.propagation.inbound && !impact.propagation.outbound {
                return Err(ConfigurationError::declaration(
                    id,
                    format!("edge `{}` sets neither `in` nor `out`", field),
                ));
            }
        }
        Ok(())
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeclarationFile {
    #[serde(default)]
    adapters: BTreeMap<String, Declaration>,
}

/// Single writer for the three registries
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    adapters: AdapterRegistry,
    graph: BlastGraph,
    terraform: TerraformRegistry,
    duplicates: Vec<ResourceTypeId>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preloaded with the embedded declarations
    pub fn builtin() -> std::result::Result<Self, ConfigurationError> {
        let mut builder = Self::new();
        for (name, content) in RESOURCE_FILES {
            let count = builder.load_json(content)?;
            tracing::debug!("Loaded {} resource types from {}", count, name);
        }
        Ok(builder)
    }

    /// Register one type's metadata, edges and Terraform mapping together
    ///
    /// The declaration is validated before anything is written. Registering a
    /// type twice replaces the earlier declaration in all three registries.
    pub fn register(
        &mut self,
        type_id: impl Into<ResourceTypeId>,
        mut declaration: Declaration,
    ) -> std::result::Result<(), ConfigurationError> {
        let type_id = type_id.into();
        declaration.meta.type_id = type_id.clone();
        declaration.validate()?;

        if self.adapters.contains(type_id.as_str()) {
            tracing::warn!("Duplicate registration for {}, last write wins", type_id);
            self.duplicates.push(type_id.clone());
        }

        self.adapters.register(type_id.clone(), declaration.meta);
        self.graph.register(type_id.clone(), declaration.blast_propagation);
        self.terraform.register(type_id, declaration.terraform);
        Ok(())
    }

    /// Parse and register every declaration in one JSON document
    ///
    /// All declarations are parsed and validated first; a bad entry rejects
    /// the whole document. Returns the number of types registered.
    pub fn load_json(&mut self, content: &str) -> std::result::Result<usize, ConfigurationError> {
        let file: DeclarationFile =
            serde_json::from_str(content).map_err(|e| ConfigurationError::Parse(e.to_string()))?;

        let mut declarations = Vec::with_capacity(file.adapters.len());
        for (type_id, mut declaration) in file.adapters {
            declaration.meta.type_id = ResourceTypeId::from(type_id.as_str());
            declaration.validate()?;
            declarations.push((type_id, declaration));
        }

        let count = declarations.len();
        for (type_id, declaration) in declarations {
            self.register(type_id, declaration)?;
        }
        Ok(count)
    }

    /// Layer every `*.json` file in `dir` on top, in file-name order
    pub fn load_dir(&mut self, dir: &Path) -> anyhow::Result<usize> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read declarations dir {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut total = 0;
        for path in paths {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let count = self
                .load_json(&content)
                .with_context(|| format!("Invalid declarations in {}", path.display()))?;
            tracing::info!("Loaded {} resource types from {}", count, path.display());
            total += count;
        }
        Ok(total)
    }

    /// Freeze into a read-only catalog
    pub fn build(self) -> Catalog {
        Catalog {
            adapters: self.adapters,
            graph: self.graph,
            terraform: self.terraform,
            duplicates: self.duplicates,
        }
    }
}

/// Frozen, read-only view of every registered resource type
#[derive(Debug, Clone)]
pub struct Catalog {
    adapters: AdapterRegistry,
    graph: BlastGraph,
    terraform: TerraformRegistry,
    duplicates: Vec<ResourceTypeId>,
}

impl Catalog {
    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    pub fn graph(&self) -> &BlastGraph {
        &self.graph
    }

    pub fn terraform(&self) -> &TerraformRegistry {
        &self.terraform
    }

    /// Types registered more than once, in registration order
    pub fn duplicates(&self) -> &[ResourceTypeId] {
        &self.duplicates
    }

    /// Types that may be offered for live discovery, sorted
    pub fn offerable_types(&self) -> Vec<&ResourceTypeId> {
        self.adapters
            .types()
            .into_iter()
            .filter(|t| self.adapters.is_offerable(t.as_str()))
            .collect()
    }

    pub fn lookup(&self, type_id: &str) -> Result<&AdapterMeta> {
        self.adapters.get(type_id)
    }

    /// Bind a type's endpoints to the caller's scope
    pub fn bind(&self, type_id: &str, params: &ScopeParams) -> Result<BoundAdapter> {
        Ok(self.lookup(type_id)?.bind_scope(params)?)
    }

    pub fn blast_radius(
        &self,
        type_id: &str,
        propagation: Propagation,
        max_depth: Option<usize>,
    ) -> Result<BlastRadius> {
        if !self.adapters.contains(type_id) && !self.graph.contains(type_id) {
            return Err(Error::not_found(type_id));
        }
        Ok(self.graph.blast_radius(type_id, propagation, max_depth))
    }

    pub fn linked_queries(&self, type_id: &str, body: &Value) -> Vec<LinkedQuery> {
        blast::linked_queries(&self.graph, &self.adapters, type_id, body)
    }

    pub fn traverse_instances<S: InstanceSource>(
        &self,
        type_id: &str,
        query: &str,
        source: &mut S,
        direction: Direction,
        max_depth: usize,
    ) -> Vec<InstanceHop> {
        blast::traverse_instances(
            &self.graph,
            &self.adapters,
            type_id,
            query,
            source,
            direction,
            max_depth,
        )
    }
}

/// Built-in catalog (loads from embedded JSON on first access)
static BUILTIN: OnceLock<Catalog> = OnceLock::new();

pub fn builtin() -> &'static Catalog {
    BUILTIN.get_or_init(|| {
        CatalogBuilder::builtin()
            .unwrap_or_else(|e| panic!("Failed to load embedded resource declarations: {}", e))
            .build()
    })
}
