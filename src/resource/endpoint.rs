//! Endpoint Resolver
//!
//! Turns a declared URL template plus scope parameters into concrete Get,
//! List and Search URLs.
//!
//! Templates use named placeholders:
//!
//! - `{project}`, `{region}`, `{location}` - scope slots, filled at bind time
//! - `{query}` - query slots, filled per call from a `|`-joined composite query
//!
//! ```ignore
//! let template = Arc::new(UrlTemplate::parse(
//!     "https://compute.googleapis.com/compute/v1/projects/{project}/global/urlMaps/{query}",
//! )?);
//! let get = template.bind(ScopeLevel::Global, &["proj1"])?;
//! assert!(get.url("lb-map").ends_with("/projects/proj1/global/urlMaps/lb-map"));
//! assert_eq!(get.url(""), "");
//! ```

use super::adapter::ResourceTypeId;
use super::scope::ScopeLevel;
use crate::error::{ConfigurationError, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Separator between the parts of a composite query (`location|name`)
pub const QUERY_SEPARATOR: char = '|';

/// Operations a resource type may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Get,
    List,
    Search,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "get",
            Self::List => "list",
            Self::Search => "search",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Project,
    Region,
    Location,
    Query,
}

/// Parsed URL template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    raw: String,
    segments: Vec<Segment>,
    query_slots: usize,
}

impl UrlTemplate {
    /// Parse a template, rejecting unknown or unbalanced placeholders
    pub fn parse(raw: &str) -> std::result::Result<Self, ConfigurationError> {
        let mut segments = Vec::new();
        let mut query_slots = 0;
        let mut rest = raw;

        while let Some(open) = rest.find('{') {
            if rest[..open].contains('}') {
                return Err(ConfigurationError::template(raw, "unbalanced `}`"));
            }
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }

            let Some(close) = rest[open..].find('}') else {
                return Err(ConfigurationError::template(raw, "unterminated placeholder"));
            };
            let name = &rest[open + 1..open + close];
            let segment = match name {
                "project" => Segment::Project,
                "region" => Segment::Region,
                "location" => Segment::Location,
                "query" => {
                    query_slots += 1;
                    Segment::Query
                },
                other => {
                    return Err(ConfigurationError::template(
                        raw,
                        format!("unknown placeholder `{{{}}}`", other),
                    ))
                },
            };
            segments.push(segment);
            rest = &rest[open + close + 1..];
        }

        if rest.contains('}') {
            return Err(ConfigurationError::template(raw, "unbalanced `}`"));
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        // The literal prefix must be an absolute http(s) URL
        let prefix = match segments.first() {
            Some(Segment::Literal(prefix)) => prefix.as_str(),
            _ => "",
        };
        match url::Url::parse(prefix) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {},
            _ => return Err(ConfigurationError::template(raw, "not an absolute http(s) URL")),
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            query_slots,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of `{query}` slots
    pub fn query_slots(&self) -> usize {
        self.query_slots
    }

    fn has(&self, wanted: &Segment) -> bool {
        self.segments.iter().any(|s| s == wanted)
    }

    /// Check that the scope placeholders agree with `scope`
    pub fn check_scope(&self, scope: ScopeLevel) -> std::result::Result<(), ConfigurationError> {
        let has_region = self.has(&Segment::Region);
        let has_location = self.has(&Segment::Location);

        let ok = match scope.scope_placeholder() {
            None => !has_region && !has_location,
            Some("region") => has_region && !has_location,
            Some(_) => has_location && !has_region,
        };

        if ok {
            Ok(())
        } else {
            Err(ConfigurationError::template(
                &self.raw,
                format!("placeholders do not match {} scope", scope),
            ))
        }
    }

    /// Validate `params` for `scope` and bind them into an [`EndpointFunc`]
    pub fn bind(
        self: Arc<Self>,
        scope: ScopeLevel,
        params: &[&str],
    ) -> std::result::Result<EndpointFunc, ConfigurationError> {
        self.check_scope(scope)?;
        scope.validate_params(params)?;

        tracing::trace!("bind {} scope={} params={:?}", self.raw, scope, params);

        Ok(EndpointFunc {
            project: params[0].trim().to_string(),
            scoped: params.get(1).map(|s| s.trim().to_string()),
            template: self,
        })
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for UrlTemplate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for UrlTemplate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        UrlTemplate::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A template bound to concrete scope parameters
///
/// Maps a query to a URL. An empty or malformed query yields an empty string,
/// meaning "not constructible", never a half-filled URL.
#[derive(Debug, Clone)]
pub struct EndpointFunc {
    template: Arc<UrlTemplate>,
    project: String,
    scoped: Option<String>,
}

impl EndpointFunc {
    pub fn query_slots(&self) -> usize {
        self.template.query_slots
    }

    pub fn url(&self, query: &str) -> String {
        let slots = self.template.query_slots;
        let parts: Vec<&str> = if slots == 0 {
            Vec::new()
        } else {
            let parts: Vec<&str> = query.split(QUERY_SEPARATOR).map(str::trim).collect();
            if parts.len() != slots || parts.iter().any(|p| p.is_empty()) {
                return String::new();
            }
            parts
        };

        let scoped = self.scoped.as_deref().unwrap_or("");
        let mut parts = parts.into_iter();
        let mut url = String::with_capacity(self.template.raw.len() + query.len());

        for segment in &self.template.segments {
            match segment {
                Segment::Literal(s) => url.push_str(s),
                Segment::Project => url.push_str(&self.project),
                Segment::Region | Segment::Location => url.push_str(scoped),
                Segment::Query => {
                    if let Some(part) = parts.next() {
                        url.push_str(&urlencoding::encode(part));
                    }
                },
            }
        }

        url
    }
}

/// How to enumerate a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enumeration {
    List(String),
    /// No List endpoint; enumerate with a caller-supplied anchor instead
    Search(String),
}

impl Enumeration {
    pub fn url(&self) -> &str {
        match self {
            Self::List(url) | Self::Search(url) => url,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::List(_) => Operation::List,
            Self::Search(_) => Operation::Search,
        }
    }
}

/// Every declared endpoint of one type, bound to one set of scope parameters
#[derive(Debug, Clone)]
pub struct BoundAdapter {
    pub type_id: ResourceTypeId,
    pub get: Option<EndpointFunc>,
    pub list: Option<EndpointFunc>,
    pub search: Option<EndpointFunc>,
    pub list_response_key: String,
}

impl BoundAdapter {
    fn resolve(&self, endpoint: Option<&EndpointFunc>, operation: Operation, query: &str) -> Result<String> {
        let url = endpoint.map(|f| f.url(query)).unwrap_or_default();
        if url.is_empty() {
            return Err(Error::unsupported(self.type_id.clone(), operation));
        }
        tracing::debug!("{} {} -> {}", operation, self.type_id, url);
        Ok(url)
    }

    pub fn get_url(&self, query: &str) -> Result<String> {
        self.resolve(self.get.as_ref(), Operation::Get, query)
    }

    pub fn list_url(&self) -> Result<String> {
        self.resolve(self.list.as_ref(), Operation::List, "")
    }

    pub fn search_url(&self, query: &str) -> Result<String> {
        self.resolve(self.search.as_ref(), Operation::Search, query)
    }

    /// Pick List when available, otherwise fall back to Search with `anchor`
    pub fn enumeration(&self, anchor: Option<&str>) -> Result<Enumeration> {
        if self.list.is_some() {
            return self.list_url().map(Enumeration::List);
        }
        if self.search.is_some() {
            return self.search_url(anchor.unwrap_or("")).map(Enumeration::Search);
        }
        Err(Error::unsupported(self.type_id.clone(), Operation::List))
    }
}
