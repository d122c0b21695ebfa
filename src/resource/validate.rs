//! Catalog consistency checks
//!
//! Declarations are authored by hand, so these checks catch the mistakes
//! that parse fine but break traversal or discovery later: edges into types
//! nobody registered, types with no way to be fetched, and field paths that
//! do not exist in real API responses.

use super::adapter::ResourceTypeId;
use super::links;
use super::registry::Catalog;
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// One problem found in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub type_id: ResourceTypeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_path: Option<String>,
    pub message: String,
}

impl Finding {
    fn error(type_id: &ResourceTypeId, field_path: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            type_id: type_id.clone(),
            field_path: field_path.map(str::to_string),
            message: message.into(),
        }
    }

    fn warning(type_id: &ResourceTypeId, field_path: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(type_id, field_path, message)
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field_path {
            Some(path) => write!(f, "{}: {} [{}]: {}", self.severity, self.type_id, path, self.message),
            None => write!(f, "{}: {}: {}", self.severity, self.type_id, self.message),
        }
    }
}

/// Field paths observed in sample API responses, per type
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    paths: HashMap<ResourceTypeId, BTreeSet<String>>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every path present in one sample body
    pub fn add_sample(&mut self, type_id: impl Into<ResourceTypeId>, body: &Value) {
        self.paths
            .entry(type_id.into())
            .or_default()
            .extend(links::collect_paths(body));
    }

    pub fn from_samples<'a, I>(samples: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut snapshot = Self::new();
        for (type_id, body) in samples {
            snapshot.add_sample(type_id, body);
        }
        snapshot
    }

    /// Load `<type-id>.json` sample bodies from `dir`
    ///
    /// A file may hold one body or an array of bodies.
    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let mut snapshot = Self::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read schema dir {}", dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let Some(type_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let body: Value = serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?;

            match &body {
                Value::Array(items) => items.iter().for_each(|item| snapshot.add_sample(type_id, item)),
                other => snapshot.add_sample(type_id, other),
            }
        }

        tracing::debug!("Loaded schema samples for {} types", snapshot.paths.len());
        Ok(snapshot)
    }

    /// Whether `field_path` was seen for `type_id`; `None` when the type has no samples
    pub fn contains(&self, type_id: &str, field_path: &str) -> Option<bool> {
        self.paths.get(type_id).map(|paths| paths.contains(field_path))
    }
}

/// Run every consistency check, errors first
pub fn validate(catalog: &Catalog, schema: Option<&SchemaSnapshot>) -> Vec<Finding> {
    let adapters = catalog.adapters();
    let mut findings = Vec::new();

    for edge in catalog.graph().all_edges() {
        let target = &edge.impact.target;
        let Some(target_meta) = adapters.lookup(target.as_str()) else {
            findings.push(Finding::error(
                edge.source,
                Some(edge.field_path),
                format!("edge targets unregistered type {}", target),
            ));
            continue;
        };

        let source_offerable = adapters.is_offerable(edge.source.as_str());
        if source_offerable && target_meta.in_development {
            findings.push(Finding::warning(
                edge.source,
                Some(edge.field_path),
                format!("edge targets {} which is still in development", target),
            ));
        }

        if let Some(schema) = schema {
            if schema.contains(edge.source.as_str(), edge.field_path) == Some(false) {
                findings.push(Finding::warning(
                    edge.source,
                    Some(edge.field_path),
                    "field path not present in any sample response",
                ));
            }
        }
    }

    for type_id in catalog.duplicates() {
        findings.push(Finding::warning(
            type_id,
            None,
            "registered more than once; the last declaration won",
        ));
    }

    for type_id in adapters.types() {
        let Some(meta) = adapters.lookup(type_id.as_str()) else {
            continue;
        };

        if meta.get.is_none() && !meta.can_enumerate() {
            findings.push(Finding::warning(type_id, None, "declares neither a get nor a list/search endpoint"));
        }

        match catalog.terraform().lookup(type_id.as_str()) {
            Some(mapping) if !mapping.is_empty() || !mapping.description.trim().is_empty() => {
                for lookup in &mapping.mappings {
                    if lookup.split().is_none() {
                        findings.push(Finding::warning(
                            type_id,
                            None,
                            format!("Terraform query `{}` is not <resource>.<attribute>", lookup.query),
                        ));
                    }
                }
            },
            _ => findings.push(Finding::warning(type_id, None, "no Terraform mapping and no note explaining why")),
        }
    }

    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.type_id.cmp(&b.type_id))
            .then_with(|| a.field_path.cmp(&b.field_path))
    });
    findings
}
