//! Terraform Mapping Registry
//!
//! Tells an external reconciler how to find the live resource behind a
//! Terraform resource. Nothing here is evaluated; the reconciler resolves the
//! query template against Terraform state and calls back into the resolver.

use super::adapter::ResourceTypeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lookup method used with a query template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TerraformMethod {
    Get,
    Search,
}

impl fmt::Display for TerraformMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Search => "SEARCH",
        })
    }
}

/// One (method, query template) pair, e.g. `GET google_compute_url_map.name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TerraformLookup {
    pub method: TerraformMethod,
    pub query: String,
}

impl TerraformLookup {
    pub fn get(query: impl Into<String>) -> Self {
        Self {
            method: TerraformMethod::Get,
            query: query.into(),
        }
    }

    pub fn search(query: impl Into<String>) -> Self {
        Self {
            method: TerraformMethod::Search,
            query: query.into(),
        }
    }

    /// Terraform resource type and attribute named by the template
    ///
    /// `google_compute_url_map.name` gives `("google_compute_url_map", "name")`.
    pub fn split(&self) -> Option<(&str, &str)> {
        let (resource, attribute) = self.query.split_once('.')?;
        if resource.is_empty() || attribute.is_empty() {
            return None;
        }
        Some((resource, attribute))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TerraformMapping {
    /// Reference documentation URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Usage note, or why no mapping exists
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub mappings: Vec<TerraformLookup>,
}

impl TerraformMapping {
    pub fn new(reference: impl Into<String>, mappings: Vec<TerraformLookup>) -> Self {
        Self {
            reference: Some(reference.into()),
            description: String::new(),
            mappings,
        }
    }

    /// A type with no Terraform equivalent
    pub fn unmapped(note: impl Into<String>) -> Self {
        Self {
            reference: None,
            description: note.into(),
            mappings: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TerraformRegistry {
    entries: HashMap<ResourceTypeId, TerraformMapping>,
}

impl TerraformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        type_id: impl Into<ResourceTypeId>,
        mapping: TerraformMapping,
    ) -> Option<TerraformMapping> {
        self.entries.insert(type_id.into(), mapping)
    }

    pub fn lookup(&self, type_id: &str) -> Option<&TerraformMapping> {
        self.entries.get(type_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceTypeId, &TerraformMapping)> {
        self.entries.iter()
    }

    /// Resource types whose mappings name `terraform_type` (e.g. `google_compute_url_map`)
    pub fn types_for(&self, terraform_type: &str) -> Vec<(&ResourceTypeId, &TerraformLookup)> {
        let mut found: Vec<_> = self
            .entries
            .iter()
            .flat_map(|(type_id, mapping)| mapping.mappings.iter().map(move |m| (type_id, m)))
            .filter(|(_, lookup)| lookup.split().is_some_and(|(resource, _)| resource == terraform_type))
            .collect();
        found.sort_by(|a, b| a.0.cmp(b.0));
        found
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_lookup() {
        let mut registry = TerraformRegistry::new();
        registry.register(
            "gcp-compute-url-map",
            TerraformMapping::new(
                "https://registry.terraform.io/providers/hashicorp/google/latest/docs/resources/compute_url_map",
                vec![TerraformLookup::get("google_compute_url_map.name")],
            ),
        );

        let mapping = registry.lookup("gcp-compute-url-map").unwrap();
        assert_eq!(mapping.mappings[0].method, TerraformMethod::Get);
        assert!(registry.lookup("gcp-compute-network").is_none());
    }

    #[test]
    fn test_types_for_terraform_resource() {
        let mut registry = TerraformRegistry::new();
        registry.register(
            "gcp-compute-forwarding-rule",
            TerraformMapping::new("ref", vec![TerraformLookup::get("google_compute_forwarding_rule.name")]),
        );
        registry.register("gcp-ai-platform-endpoint", TerraformMapping::unmapped("not yet"));

        let found = registry.types_for("google_compute_forwarding_rule");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.as_str(), "gcp-compute-forwarding-rule");
        assert!(registry.types_for("google_compute_url_map").is_empty());
    }

    #[test]
    fn test_split_query_template() {
        assert_eq!(
            TerraformLookup::search("google_kms_key_ring.id").split(),
            Some(("google_kms_key_ring", "id"))
        );
        assert_eq!(TerraformLookup::get("no_attribute").split(), None);
        assert_eq!(TerraformLookup::get(".name").split(), None);
    }

    #[test]
    fn test_method_serde() {
        let lookup: TerraformLookup =
            serde_json::from_str(r#"{"method": "SEARCH", "query": "google_kms_key_ring.id"}"#).unwrap();
        assert_eq!(lookup.method, TerraformMethod::Search);
    }
}
