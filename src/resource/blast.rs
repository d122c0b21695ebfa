//! Blast Propagation Graph
//!
//! Each resource type maps field paths in its body to the resource type that
//! field references. An edge carries two independent direction flags:
//!
//! - `in`: changes to the target affect the declaring type
//! - `out`: changes to the declaring type affect the target
//!
//! plus an optional parent/child flag used for lifecycle display.
//!
//! The graph is directed and may contain cycles (a target pool's `backupPool`
//! points at another target pool), so every traversal here tracks what it has
//! already visited.

use super::adapter::{AdapterRegistry, ResourceTypeId};
use super::links;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

/// Direction flags of an edge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlastPropagation {
    #[serde(rename = "in", default)]
    pub inbound: bool,
    #[serde(rename = "out", default)]
    pub outbound: bool,
}

impl BlastPropagation {
    pub fn new(inbound: bool, outbound: bool) -> Self {
        Self { inbound, outbound }
    }

    pub fn includes(&self, direction: Direction) -> bool {
        match direction {
            Direction::In => self.inbound,
            Direction::Out => self.outbound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::In => "in",
            Self::Out => "out",
        })
    }
}

/// Edge from one field of the declaring type to another resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawImpact")]
pub struct Impact {
    #[serde(rename = "to")]
    pub target: ResourceTypeId,
    #[serde(flatten)]
    pub propagation: BlastPropagation,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub parent_child: bool,
    pub description: String,
}

impl Impact {
    pub fn new(target: impl Into<ResourceTypeId>, inbound: bool, outbound: bool) -> Self {
        Self {
            target: target.into(),
            propagation: BlastPropagation::new(inbound, outbound),
            parent_child: false,
            description: String::new(),
        }
    }

    pub fn parent_child(mut self) -> Self {
        self.parent_child = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Declared form of an [`Impact`]; unknown keys are rejected
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawImpact {
    to: ResourceTypeId,
    #[serde(rename = "in", default)]
    inbound: bool,
    #[serde(rename = "out", default)]
    outbound: bool,
    #[serde(default)]
    parent_child: bool,
    #[serde(default)]
    description: String,
}

impl From<RawImpact> for Impact {
    fn from(raw: RawImpact) -> Self {
        Self {
            target: raw.to,
            propagation: BlastPropagation::new(raw.inbound, raw.outbound),
            parent_child: raw.parent_child,
            description: raw.description,
        }
    }
}

/// Field path to edge, for one declaring type
pub type BlastMap = BTreeMap<String, Impact>;

/// Borrowed view of one edge together with where it was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeRef<'a> {
    pub source: &'a ResourceTypeId,
    pub field_path: &'a str,
    pub impact: &'a Impact,
}

/// Process-wide field-path graph between resource types
#[derive(Debug, Clone, Default)]
pub struct BlastGraph {
    edges: HashMap<ResourceTypeId, BlastMap>,
    /// target -> (source, field path)
    reverse: HashMap<ResourceTypeId, Vec<(ResourceTypeId, String)>>,
}

impl BlastGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the edges declared by `type_id`, replacing any earlier set
    pub fn register(&mut self, type_id: impl Into<ResourceTypeId>, edges: BlastMap) -> Option<BlastMap> {
        let type_id = type_id.into();

        let previous = self.edges.remove(&type_id);
        if let Some(old) = &previous {
            for impact in old.values() {
                if let Some(sources) = self.reverse.get_mut(&impact.target) {
                    sources.retain(|(source, _)| source != &type_id);
                }
            }
        }

        for (field, impact) in &edges {
            self.reverse
                .entry(impact.target.clone())
                .or_default()
                .push((type_id.clone(), field.clone()));
        }
        self.edges.insert(type_id, edges);

        previous
    }

    pub fn lookup(&self, type_id: &str) -> Option<&BlastMap> {
        self.edges.get(type_id)
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.edges.contains_key(type_id)
    }

    fn edge<'a>(&'a self, source: &str, field_path: &str) -> Option<EdgeRef<'a>> {
        let (source, map) = self.edges.get_key_value(source)?;
        let (field_path, impact) = map.get_key_value(field_path)?;
        Some(EdgeRef {
            source,
            field_path,
            impact,
        })
    }

    /// Edge at `field_path` of `type_id`, if its flags include `direction`
    pub fn expand(&self, type_id: &str, field_path: &str, direction: Direction) -> Vec<EdgeRef<'_>> {
        self.edge(type_id, field_path)
            .filter(|edge| edge.impact.propagation.includes(direction))
            .into_iter()
            .collect()
    }

    /// Edges declared by `type_id` whose flags include `direction`
    pub fn edges_from(&self, type_id: &str, direction: Direction) -> Vec<EdgeRef<'_>> {
        let Some((source, map)) = self.edges.get_key_value(type_id) else {
            return Vec::new();
        };
        map.iter()
            .filter(|(_, impact)| impact.propagation.includes(direction))
            .map(|(field_path, impact)| EdgeRef {
                source,
                field_path,
                impact,
            })
            .collect()
    }

    /// Edges declared by other types that point at `type_id`
    pub fn edges_into(&self, type_id: &str, direction: Direction) -> Vec<EdgeRef<'_>> {
        let mut edges: Vec<EdgeRef<'_>> = self
            .reverse
            .get(type_id)
            .into_iter()
            .flatten()
            .filter_map(|(source, field)| self.edge(source.as_str(), field))
            .filter(|edge| edge.impact.propagation.includes(direction))
            .collect();
        edges.sort_by(|a, b| (a.source, a.field_path).cmp(&(b.source, b.field_path)));
        edges
    }

    /// All edges, sorted by declaring type then field path
    pub fn all_edges(&self) -> Vec<EdgeRef<'_>> {
        let mut edges: Vec<EdgeRef<'_>> = self
            .edges
            .iter()
            .flat_map(|(source, map)| {
                map.iter().map(move |(field_path, impact)| EdgeRef {
                    source,
                    field_path,
                    impact,
                })
            })
            .collect();
        edges.sort_by(|a, b| (a.source, a.field_path).cmp(&(b.source, b.field_path)));
        edges
    }

    pub fn types(&self) -> impl Iterator<Item = &ResourceTypeId> {
        self.edges.keys()
    }

    /// Neighbours of `type_id` for one propagation step
    ///
    /// Returns `(edge, reached type, reversed)`.
    fn neighbours<'a>(
        &'a self,
        type_id: &str,
        propagation: Propagation,
    ) -> Vec<(EdgeRef<'a>, &'a ResourceTypeId, bool)> {
        let (forward, backward) = match propagation {
            Propagation::Downstream => (Direction::Out, Direction::In),
            Propagation::Upstream => (Direction::In, Direction::Out),
        };

        let mut out: Vec<_> = self
            .edges_from(type_id, forward)
            .into_iter()
            .map(|edge| {
                let impact: &'a Impact = edge.impact;
                (edge, &impact.target, false)
            })
            .collect();
        out.extend(
            self.edges_into(type_id, backward)
                .into_iter()
                .map(|edge| (edge, edge.source, true)),
        );
        out
    }

    /// Breadth-first type-level blast radius
    ///
    /// Each `(declaring type, field path)` edge is traversed at most once and
    /// each type is expanded at most once, so cycles terminate.
    pub fn blast_radius(
        &self,
        origin: &str,
        propagation: Propagation,
        max_depth: Option<usize>,
    ) -> BlastRadius {
        let origin_id = ResourceTypeId::from(origin);
        let mut radius = BlastRadius {
            origin: origin_id.clone(),
            propagation,
            hops: Vec::new(),
            types: BTreeSet::new(),
            truncated: false,
        };

        let mut expanded: HashSet<ResourceTypeId> = HashSet::new();
        let mut visited_edges: HashSet<(ResourceTypeId, String)> = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((origin_id, 0usize));

        while let Some((current, depth)) = queue.pop_front() {
            if !expanded.insert(current.clone()) {
                continue;
            }

            for (edge, reached, reversed) in self.neighbours(current.as_str(), propagation) {
                let key = (edge.source.clone(), edge.field_path.to_string());
                if visited_edges.contains(&key) {
                    continue;
                }
                if max_depth.is_some_and(|max| depth >= max) {
                    radius.truncated = true;
                    continue;
                }
                visited_edges.insert(key);

                radius.hops.push(Hop {
                    depth: depth + 1,
                    from: current.clone(),
                    to: reached.clone(),
                    declared_by: edge.source.clone(),
                    field_path: edge.field_path.to_string(),
                    reversed,
                    parent_child: edge.impact.parent_child,
                    description: edge.impact.description.clone(),
                });
                if reached != &radius.origin {
                    radius.types.insert(reached.clone());
                }
                if !expanded.contains(reached) {
                    queue.push_back((reached.clone(), depth + 1));
                }
            }
        }

        tracing::debug!(
            "blast radius {} ({:?}): {} hops, {} types",
            radius.origin,
            propagation,
            radius.hops.len(),
            radius.types.len()
        );

        radius
    }
}

/// Which way a blast-radius query walks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Propagation {
    /// What a change to the origin affects
    Downstream,
    /// What could affect the origin
    Upstream,
}

/// One traversed edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hop {
    pub depth: usize,
    pub from: ResourceTypeId,
    pub to: ResourceTypeId,
    pub declared_by: ResourceTypeId,
    pub field_path: String,
    /// Edge walked from its target back to the declaring type
    pub reversed: bool,
    pub parent_child: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlastRadius {
    pub origin: ResourceTypeId,
    pub propagation: Propagation,
    pub hops: Vec<Hop>,
    /// Reached types, excluding the origin
    pub types: BTreeSet<ResourceTypeId>,
    /// Depth limit cut off further hops
    pub truncated: bool,
}

/// A reference found in an instance body, ready to be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedQuery {
    pub field_path: String,
    pub target: ResourceTypeId,
    /// Raw field value
    pub value: String,
    /// Composite query for the target's Get endpoint, when derivable
    pub query: Option<String>,
    pub propagation: BlastPropagation,
    pub parent_child: bool,
}

/// Every declared reference present in `body` of a `type_id` instance
pub fn linked_queries(
    graph: &BlastGraph,
    adapters: &AdapterRegistry,
    type_id: &str,
    body: &Value,
) -> Vec<LinkedQuery> {
    let Some(map) = graph.lookup(type_id) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (field_path, impact) in map {
        let slots = adapters
            .lookup(impact.target.as_str())
            .and_then(|meta| meta.get_query_slots())
            .unwrap_or(1);

        for value in links::field_values(body, field_path) {
            out.push(LinkedQuery {
                field_path: field_path.clone(),
                target: impact.target.clone(),
                query: links::reference_query(&value, slots),
                value,
                propagation: impact.propagation,
                parent_child: impact.parent_child,
            });
        }
    }
    out
}

/// Supplies instance bodies during instance-level traversal
pub trait InstanceSource {
    fn fetch(&mut self, type_id: &ResourceTypeId, query: &str) -> Option<Value>;
}

impl<F> InstanceSource for F
where
    F: FnMut(&ResourceTypeId, &str) -> Option<Value>,
{
    fn fetch(&mut self, type_id: &ResourceTypeId, query: &str) -> Option<Value> {
        self(type_id, query)
    }
}

/// One step of an instance-level traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceHop {
    pub depth: usize,
    pub from_type: ResourceTypeId,
    pub from_query: String,
    pub field_path: String,
    pub to_type: ResourceTypeId,
    pub to_query: String,
    /// The source returned a body for the reached instance
    pub resolved: bool,
}

/// Follow references from one live instance
///
/// Walks the declaring type's own edges whose flags include `direction`
/// (`Out` answers "what does a change here affect", `In` answers "what could
/// affect this"). Visited `(type, instance)` pairs are never fetched twice.
pub fn traverse_instances<S: InstanceSource>(
    graph: &BlastGraph,
    adapters: &AdapterRegistry,
    origin_type: &str,
    origin_query: &str,
    source: &mut S,
    direction: Direction,
    max_depth: usize,
) -> Vec<InstanceHop> {
    let mut hops = Vec::new();
    let mut visited: HashSet<(ResourceTypeId, String)> = HashSet::new();
    let mut resolved: HashSet<(ResourceTypeId, String)> = HashSet::new();
    let mut queue = VecDeque::new();

    let origin = (ResourceTypeId::from(origin_type), origin_query.to_string());
    visited.insert(origin.clone());
    queue.push_back((origin, 0usize));

    while let Some(((type_id, query), depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let Some(body) = source.fetch(&type_id, &query) else {
            tracing::debug!("no body for {} {}", type_id, query);
            continue;
        };
        resolved.insert((type_id.clone(), query.clone()));

        for link in linked_queries(graph, adapters, type_id.as_str(), &body) {
            if !link.propagation.includes(direction) {
                continue;
            }
            let Some(to_query) = link.query else { continue };

            let key = (link.target.clone(), to_query.clone());
            let fresh = visited.insert(key.clone());
            hops.push(InstanceHop {
                depth: depth + 1,
                from_type: type_id.clone(),
                from_query: query.clone(),
                field_path: link.field_path,
                to_type: link.target,
                to_query,
                resolved: false,
            });
            if fresh {
                queue.push_back((key, depth + 1));
            }
        }
    }

    for hop in &mut hops {
        hop.resolved = resolved.contains(&(hop.to_type.clone(), hop.to_query.clone()));
    }

    hops
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(entries: Vec<(&str, Impact)>) -> BlastMap {
        entries
            .into_iter()
            .map(|(field, impact)| (field.to_string(), impact))
            .collect()
    }

    fn lb_graph() -> BlastGraph {
        let mut graph = BlastGraph::new();
        graph.register(
            "gcp-compute-forwarding-rule",
            map(vec![
                ("backendService", Impact::new("gcp-compute-backend-service", true, true)),
                ("IPAddress", Impact::new("gcp-compute-address", true, false)),
            ]),
        );
        graph.register(
            "gcp-compute-backend-service",
            map(vec![("healthChecks", Impact::new("gcp-compute-health-check", true, false))]),
        );
        graph.register("gcp-compute-health-check", BlastMap::new());
        graph
    }

    #[test]
    fn test_expand_respects_direction() {
        let graph = lb_graph();
        assert_eq!(graph.expand("gcp-compute-forwarding-rule", "IPAddress", Direction::In).len(), 1);
        assert!(graph.expand("gcp-compute-forwarding-rule", "IPAddress", Direction::Out).is_empty());
        assert_eq!(graph.expand("gcp-compute-forwarding-rule", "backendService", Direction::Out).len(), 1);
        assert_eq!(graph.expand("gcp-compute-forwarding-rule", "backendService", Direction::In).len(), 1);
        assert!(graph.expand("gcp-compute-forwarding-rule", "missing", Direction::In).is_empty());
        assert!(graph.expand("gcp-unknown", "backendService", Direction::In).is_empty());
    }

    #[test]
    fn test_edges_into() {
        let graph = lb_graph();
        let into = graph.edges_into("gcp-compute-backend-service", Direction::In);
        assert_eq!(into.len(), 1);
        assert_eq!(into[0].source.as_str(), "gcp-compute-forwarding-rule");
        assert_eq!(into[0].field_path, "backendService");
    }

    #[test]
    fn test_reregister_replaces_reverse_index() {
        let mut graph = lb_graph();
        graph.register("gcp-compute-forwarding-rule", BlastMap::new());
        assert!(graph.edges_into("gcp-compute-backend-service", Direction::In).is_empty());
        assert!(graph.edges_into("gcp-compute-address", Direction::In).is_empty());
    }

    #[test]
    fn test_several_edges_to_same_target() {
        let mut graph = BlastGraph::new();
        graph.register(
            "gcp-compute-url-map",
            map(vec![
                ("defaultService", Impact::new("gcp-compute-backend-service", true, true)),
                ("pathMatchers.defaultService", Impact::new("gcp-compute-backend-service", true, false)),
            ]),
        );
        assert_eq!(graph.edges_into("gcp-compute-backend-service", Direction::In).len(), 2);
        assert_eq!(graph.edges_into("gcp-compute-backend-service", Direction::Out).len(), 1);
    }

    #[test]
    fn test_downstream_radius() {
        let graph = lb_graph();
        // A health check change affects the backend service (In edge walked
        // backwards), which affects the forwarding rule (In edge walked backwards).
        let radius = graph.blast_radius("gcp-compute-health-check", Propagation::Downstream, None);
        let types: Vec<&str> = radius.types.iter().map(|t| t.as_str()).collect();
        assert_eq!(types, vec!["gcp-compute-backend-service", "gcp-compute-forwarding-rule"]);
        assert!(radius.hops.iter().all(|h| h.reversed));
        assert!(!radius.truncated);
    }

    #[test]
    fn test_upstream_radius() {
        let graph = lb_graph();
        let radius = graph.blast_radius("gcp-compute-forwarding-rule", Propagation::Upstream, None);
        assert!(radius.types.contains("gcp-compute-address"));
        assert!(radius.types.contains("gcp-compute-health-check"));
    }

    #[test]
    fn test_self_reference_terminates() {
        let mut graph = BlastGraph::new();
        graph.register(
            "gcp-compute-target-pool",
            map(vec![(
                "backupPool",
                Impact::new("gcp-compute-target-pool", true, true),
            )]),
        );

        let radius = graph.blast_radius("gcp-compute-target-pool", Propagation::Downstream, None);
        assert_eq!(radius.hops.len(), 1);
        assert!(radius.types.is_empty());
    }

    #[test]
    fn test_max_depth_truncates() {
        let graph = lb_graph();
        let radius = graph.blast_radius("gcp-compute-health-check", Propagation::Downstream, Some(1));
        assert_eq!(radius.types.len(), 1);
        assert!(radius.truncated);
    }

    #[test]
    fn test_traverse_instances_follows_references_once() {
        let mut graph = BlastGraph::new();
        graph.register(
            "gcp-compute-target-pool",
            map(vec![(
                "backupPool",
                Impact::new("gcp-compute-target-pool", true, true),
            )]),
        );
        let adapters = AdapterRegistry::new();

        let mut calls = 0;
        let mut source = |_: &ResourceTypeId, query: &str| {
            calls += 1;
            let backup = if query == "a" { "b" } else { "a" };
            Some(json!({
                "name": query,
                "backupPool": format!("projects/p/regions/r/targetPools/{}", backup)
            }))
        };

        let hops = traverse_instances(
            &graph,
            &adapters,
            "gcp-compute-target-pool",
            "a",
            &mut source,
            Direction::Out,
            10,
        );

        assert_eq!(calls, 2);
        assert_eq!(hops.len(), 2);
        assert_eq!(hops[0].to_query, "b");
        assert_eq!(hops[1].to_query, "a");
        assert!(hops.iter().all(|h| h.resolved));
    }
}
