//! Adapter Metadata Registry
//!
//! Per-type metadata: classification, scope, endpoint templates, identifying
//! keys and the IAM permissions needed to read the type.

use super::endpoint::{BoundAdapter, EndpointFunc, UrlTemplate};
use super::links;
use super::scope::{ScopeLevel, ScopeParams};
use crate::error::{ConfigurationError, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Globally unique identifier of a resource kind (e.g. `gcp-compute-url-map`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceTypeId(String);

impl ResourceTypeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ResourceTypeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceTypeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ResourceTypeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&ResourceTypeId> for ResourceTypeId {
    fn from(id: &ResourceTypeId) -> Self {
        id.clone()
    }
}

/// Classification of a resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Network,
    Security,
    Configuration,
    ComputeApplication,
    Storage,
    Observability,
    Ai,
    Other,
}

/// Metadata describing how to read one resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterMeta {
    #[serde(skip_deserializing)]
    pub type_id: ResourceTypeId,
    pub category: Category,
    pub scope: ScopeLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<UrlTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<UrlTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<UrlTemplate>,
    /// Ordered keys that together identify an instance
    pub unique_attribute_keys: Vec<String>,
    /// Key holding the array in List/Search responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_response_key: Option<String>,
    #[serde(default)]
    pub iam_permissions: BTreeSet<String>,
    /// Coarser role that grants every permission above
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predefined_role: Option<String>,
    /// Not yet safe to offer for live discovery
    #[serde(default)]
    pub in_development: bool,
}

impl AdapterMeta {
    pub fn new(type_id: impl Into<ResourceTypeId>, category: Category, scope: ScopeLevel) -> Self {
        Self {
            type_id: type_id.into(),
            category,
            scope,
            get: None,
            list: None,
            search: None,
            unique_attribute_keys: Vec::new(),
            list_response_key: None,
            iam_permissions: BTreeSet::new(),
            predefined_role: None,
            in_development: false,
        }
    }

    pub fn with_get(mut self, template: UrlTemplate) -> Self {
        self.get = Some(template);
        self
    }

    pub fn with_list(mut self, template: UrlTemplate) -> Self {
        self.list = Some(template);
        self
    }

    pub fn with_search(mut self, template: UrlTemplate) -> Self {
        self.search = Some(template);
        self
    }

    pub fn with_unique_keys(mut self, keys: &[&str]) -> Self {
        self.unique_attribute_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_permissions(mut self, permissions: &[&str]) -> Self {
        self.iam_permissions = permissions.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn in_development(mut self, flag: bool) -> Self {
        self.in_development = flag;
        self
    }

    /// Structural checks run before the metadata is registered
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        let id = self.type_id.as_str();
        let fail = |reason: String| -> std::result::Result<(), ConfigurationError> {
            Err(ConfigurationError::declaration(id, reason))
        };

        if self.unique_attribute_keys.is_empty() {
            return fail("unique_attribute_keys must not be empty".to_string());
        }

        let endpoints = [
            ("get", &self.get, 1..usize::MAX),
            ("list", &self.list, 0..1),
            ("search", &self.search, 1..usize::MAX),
        ];
        for (name, template, slots) in endpoints {
            let Some(template) = template else { continue };
            template.check_scope(self.scope)?;
            if !slots.contains(&template.query_slots()) {
                return fail(format!(
                    "{} template has {} query slot(s)",
                    name,
                    template.query_slots()
                ));
            }
        }

        Ok(())
    }

    /// Key holding the array in List/Search responses
    pub fn response_key(&self) -> &str {
        self.list_response_key
            .as_deref()
            .or_else(|| self.unique_attribute_keys.last().map(String::as_str))
            .unwrap_or("items")
    }

    /// Number of parts in a Get query (`location|name` is two)
    pub fn get_query_slots(&self) -> Option<usize> {
        self.get.as_ref().map(UrlTemplate::query_slots)
    }

    /// Whether the type has any way to be enumerated
    pub fn can_enumerate(&self) -> bool {
        self.list.is_some() || self.search.is_some()
    }

    /// Bind every declared endpoint to positional scope parameters
    pub fn bind(&self, params: &[&str]) -> std::result::Result<BoundAdapter, ConfigurationError> {
        let bind = |template: &Option<UrlTemplate>| -> std::result::Result<Option<EndpointFunc>, ConfigurationError> {
            template
                .as_ref()
                .map(|t| Arc::new(t.clone()).bind(self.scope, params))
                .transpose()
        };

        // Validate even when no endpoint is declared
        self.scope.validate_params(params)?;

        Ok(BoundAdapter {
            type_id: self.type_id.clone(),
            get: bind(&self.get)?,
            list: bind(&self.list)?,
            search: bind(&self.search)?,
            list_response_key: self.response_key().to_string(),
        })
    }

    pub fn bind_scope(&self, params: &ScopeParams) -> std::result::Result<BoundAdapter, ConfigurationError> {
        self.bind(&params.positional(self.scope))
    }

    /// Derive the instance's composite unique value from its body
    ///
    /// Looks for the segment following each unique attribute key in
    /// `selfLink` or `name`. Single-key types whose `name` is a bare name
    /// use it as is.
    pub fn unique_attribute_value(&self, body: &Value) -> Option<String> {
        let keys: Vec<&str> = self.unique_attribute_keys.iter().map(String::as_str).collect();

        for field in ["selfLink", "name"] {
            let Some(path) = body.get(field).and_then(Value::as_str) else {
                continue;
            };
            if let Some(parts) = links::segments_after_keys(path, &keys) {
                return Some(parts.join("|"));
            }
        }

        match (keys.len(), body.get("name").and_then(Value::as_str)) {
            (1, Some(name)) if !name.is_empty() && !name.contains('/') => Some(name.to_string()),
            _ => None,
        }
    }
}

/// Process-wide table of adapter metadata
///
/// Written during catalog construction only; reads go through `&self`.
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    entries: HashMap<ResourceTypeId, AdapterMeta>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `meta` under `type_id`, returning the entry it replaced
    pub fn register(
        &mut self,
        type_id: impl Into<ResourceTypeId>,
        mut meta: AdapterMeta,
    ) -> Option<AdapterMeta> {
        let type_id = type_id.into();
        meta.type_id = type_id.clone();
        self.entries.insert(type_id, meta)
    }

    pub fn lookup(&self, type_id: &str) -> Option<&AdapterMeta> {
        self.entries.get(type_id)
    }

    /// Lookup that reports unknown types as [`Error::NotFound`]
    pub fn get(&self, type_id: &str) -> Result<&AdapterMeta> {
        self.lookup(type_id).ok_or_else(|| Error::not_found(type_id))
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.entries.contains_key(type_id)
    }

    /// Registered and not in development
    pub fn is_offerable(&self, type_id: &str) -> bool {
        self.lookup(type_id).is_some_and(|meta| !meta.in_development)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceTypeId, &AdapterMeta)> {
        self.entries.iter()
    }

    /// All registered type ids, sorted
    pub fn types(&self) -> Vec<&ResourceTypeId> {
        let mut types: Vec<_> = self.entries.keys().collect();
        types.sort();
        types
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
    use serde_json::json;

    fn url_map() -> AdapterMeta {
        AdapterMeta::new("gcp-compute-url-map", Category::Network, ScopeLevel::Global)
            .with_get(
                UrlTemplate::parse(
                    "https://compute.googleapis.com/compute/v1/projects/{project}/global/urlMaps/{query}",
                )
                .unwrap(),
            )
            .with_list(
                UrlTemplate::parse("https://compute.googleapis.com/compute/v1/projects/{project}/global/urlMaps")
                    .unwrap(),
            )
            .with_unique_keys(&["urlMaps"])
            .with_permissions(&["compute.urlMaps.get", "compute.urlMaps.list"])
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = AdapterRegistry::new();
        assert!(registry.register("gcp-compute-url-map", url_map()).is_none());

        let meta = registry.lookup("gcp-compute-url-map").unwrap();
        assert_eq!(meta.category, Category::Network);
        assert!(registry.lookup("gcp-unknown").is_none());
        assert!(matches!(registry.get("gcp-unknown"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_last_write_wins() {
        let mut registry = AdapterRegistry::new();
        registry.register("gcp-compute-url-map", url_map());
        let previous = registry.register(
            "gcp-compute-url-map",
            url_map().in_development(true),
        );

        assert!(previous.is_some_and(|p| !p.in_development));
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("gcp-compute-url-map").unwrap().in_development);
    }

    #[test]
    fn test_in_development_is_kept_but_not_offerable() {
        let mut registry = AdapterRegistry::new();
        registry.register("gcp-compute-url-map", url_map().in_development(true));
        assert!(registry.contains("gcp-compute-url-map"));
        assert!(!registry.is_offerable("gcp-compute-url-map"));
    }

    #[test]
    fn test_validate_rejects_list_with_query_slot() {
        let meta = url_map().with_list(
            UrlTemplate::parse("https://compute.googleapis.com/compute/v1/projects/{project}/global/urlMaps/{query}")
                .unwrap(),
        );
        assert!(meta.validate().is_err());
        assert!(url_map().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_scope_mismatch() {
        let meta = AdapterMeta::new("gcp-compute-subnetwork", Category::Network, ScopeLevel::Project)
            .with_get(
                UrlTemplate::parse(
                    "https://compute.googleapis.com/compute/v1/projects/{project}/regions/{region}/subnetworks/{query}",
                )
                .unwrap(),
            )
            .with_unique_keys(&["subnetworks"]);
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_bind_missing_project() {
        let err = url_map().bind(&[""]).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingScopeParameter { position: 0, name: "project", .. }
        ));
    }

    #[test]
    fn test_response_key_defaults_to_last_unique_key() {
        assert_eq!(url_map().response_key(), "urlMaps");
    }

    #[test]
    fn test_unique_attribute_value() {
        let meta = url_map();
        let body = json!({
            "name": "lb-map",
            "selfLink": "https://compute.googleapis.com/compute/v1/projects/p/global/urlMaps/lb-map"
        });
        assert_eq!(meta.unique_attribute_value(&body).as_deref(), Some("lb-map"));
        assert_eq!(
            meta.unique_attribute_value(&json!({"name": "bare"})).as_deref(),
            Some("bare")
        );

        let key_ring = AdapterMeta::new("gcp-cloud-kms-key-ring", Category::Security, ScopeLevel::Project)
            .with_unique_keys(&["locations", "keyRings"]);
        let body = json!({"name": "projects/p/locations/us/keyRings/ring-a"});
        assert_eq!(
            key_ring.unique_attribute_value(&body).as_deref(),
            Some("us|ring-a")
        );
        assert_eq!(key_ring.unique_attribute_value(&json!({"name": "ring-a"})), None);
    }
}
