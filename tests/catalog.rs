//! Tests over the built-in declarations and the registration contract

use gcp_blast::resource::{
    builtin, validate, AdapterMeta, BlastMap, CatalogBuilder, Category, Declaration, Direction, Impact,
    Propagation, ResourceTypeId, ScopeLevel, ScopeParams, TerraformLookup, TerraformMapping, UrlTemplate,
};
use gcp_blast::{ConfigurationError, Error};
use serde_json::json;

#[test]
fn test_builtin_has_no_dangling_edges() {
    let catalog = builtin();
    for edge in catalog.graph().all_edges() {
        assert!(
            catalog.adapters().contains(edge.impact.target.as_str()),
            "{}.{} points at unregistered {}",
            edge.source,
            edge.field_path,
            edge.impact.target
        );
    }
}

#[test]
fn test_builtin_types_register_all_three_parts() {
    let catalog = builtin();
    for type_id in catalog.adapters().types() {
        assert!(catalog.graph().contains(type_id.as_str()), "{} has no edge map", type_id);
        assert!(catalog.terraform().lookup(type_id.as_str()).is_some(), "{} has no mapping", type_id);
    }
}

#[test]
fn test_builtin_validates_clean() {
    let findings = validate(builtin(), None);
    assert!(findings.is_empty(), "unexpected findings: {:#?}", findings);
}

#[test]
fn test_builtin_bind_every_type() {
    let params = ScopeParams::new("proj1")
        .with_region("us-central1")
        .with_location("us-central1-a");
    for type_id in builtin().adapters().types() {
        let bound = builtin().bind(type_id.as_str(), &params).unwrap();
        assert!(bound.get.is_some() || bound.list.is_some() || bound.search.is_some());
    }
}

#[test]
fn test_secret_url_for_project() {
    let bound = builtin()
        .bind("gcp-secret-manager-secret", &ScopeParams::new("proj1"))
        .unwrap();
    assert_eq!(
        bound.get_url("abc").unwrap(),
        "https://secretmanager.googleapis.com/v1/projects/proj1/secrets/abc"
    );
    assert!(matches!(bound.get_url(""), Err(Error::Unsupported { .. })));
}

#[test]
fn test_regional_type_requires_region() {
    let err = builtin()
        .bind("gcp-compute-forwarding-rule", &ScopeParams::new("proj1"))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Configuration(ConfigurationError::MissingScopeParameter { position: 1, .. })
    ));

    let bound = builtin()
        .bind("gcp-compute-forwarding-rule", &ScopeParams::new("proj1").with_region("europe-west1"))
        .unwrap();
    assert_eq!(
        bound.get_url("fr-1").unwrap(),
        "https://compute.googleapis.com/compute/v1/projects/proj1/regions/europe-west1/forwardingRules/fr-1"
    );
}

#[test]
fn test_unknown_type_is_not_found() {
    let err = builtin().bind("gcp-unknown-thing", &ScopeParams::new("proj1")).unwrap_err();
    assert!(err.is_skippable());
    assert!(matches!(err, Error::NotFound { .. }));
}

#[test]
fn test_search_only_type_needs_anchor() {
    let bound = builtin()
        .bind("gcp-cloud-kms-crypto-key", &ScopeParams::new("proj1"))
        .unwrap();
    assert!(bound.enumeration(None).is_err());
    assert_eq!(
        bound.enumeration(Some("global|ring-a")).unwrap().url(),
        "https://cloudkms.googleapis.com/v1/projects/proj1/locations/global/keyRings/ring-a/cryptoKeys"
    );
    assert_eq!(
        bound.get_url("global|ring-a|key-1").unwrap(),
        "https://cloudkms.googleapis.com/v1/projects/proj1/locations/global/keyRings/ring-a/cryptoKeys/key-1"
    );
}

#[test]
fn test_forwarding_rule_backend_service_edge() {
    let forwarding_rule = AdapterMeta::new("gcp-compute-forwarding-rule", Category::Network, ScopeLevel::Regional)
        .with_get(
            UrlTemplate::parse(
                "https://compute.googleapis.com/compute/v1/projects/{project}/regions/{region}/forwardingRules/{query}",
            )
            .unwrap(),
        )
        .with_unique_keys(&["forwardingRules"]);
    let backend_service = AdapterMeta::new("gcp-compute-backend-service", Category::Network, ScopeLevel::Global)
        .with_get(
            UrlTemplate::parse("https://compute.googleapis.com/compute/v1/projects/{project}/global/backendServices/{query}")
                .unwrap(),
        )
        .with_unique_keys(&["backendServices"]);

    let mut edges = BlastMap::new();
    edges.insert(
        "backendService".to_string(),
        Impact::new("gcp-compute-backend-service", true, true),
    );

    let mut builder = CatalogBuilder::new();
    builder
        .register(
            "gcp-compute-forwarding-rule",
            Declaration::new(
                forwarding_rule,
                edges,
                TerraformMapping::new(
                    "https://registry.terraform.io/providers/hashicorp/google/latest/docs/resources/compute_forwarding_rule",
                    vec![TerraformLookup::get("google_compute_forwarding_rule.name")],
                ),
            ),
        )
        .unwrap();
    builder
        .register(
            "gcp-compute-backend-service",
            Declaration::new(backend_service, BlastMap::new(), TerraformMapping::unmapped("not needed here")),
        )
        .unwrap();
    let catalog = builder.build();
    let graph = catalog.graph();

    // From the backend service: who declared an In edge against me?
    let into = graph.edges_into("gcp-compute-backend-service", Direction::In);
    assert_eq!(into.len(), 1);
    assert_eq!(into[0].source.as_str(), "gcp-compute-forwarding-rule");
    assert_eq!(into[0].field_path, "backendService");

    // From the forwarding rule: which Out edges do I declare?
    let out = graph.expand("gcp-compute-forwarding-rule", "backendService", Direction::Out);
    assert_eq!(out, into);
    assert_eq!(graph.edges_from("gcp-compute-forwarding-rule", Direction::Out), into);

    // Live body: the reference turns into a Get query for the backend service
    let body = json!({
        "name": "fr-1",
        "backendService": "https://www.googleapis.com/compute/v1/projects/proj1/global/backendServices/bs-1"
    });
    let links = catalog.linked_queries("gcp-compute-forwarding-rule", &body);
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].query.as_deref(), Some("bs-1"));
    let bound = catalog
        .bind("gcp-compute-backend-service", &ScopeParams::new("proj1"))
        .unwrap();
    assert_eq!(
        bound.get_url(links[0].query.as_deref().unwrap()).unwrap(),
        "https://compute.googleapis.com/compute/v1/projects/proj1/global/backendServices/bs-1"
    );
}

#[test]
fn test_builtin_load_balancer_blast_radius() {
    let catalog = builtin();

    // Deleting a health check reaches the whole load balancer chain
    let radius = catalog
        .blast_radius("gcp-compute-health-check", Propagation::Downstream, None)
        .unwrap();
    for reached in [
        "gcp-compute-backend-service",
        "gcp-compute-url-map",
        "gcp-compute-target-http-proxy",
        "gcp-compute-global-forwarding-rule",
        "gcp-compute-forwarding-rule",
        "gcp-compute-target-pool",
    ] {
        assert!(radius.types.contains(reached), "{} not reached", reached);
    }
    // A health check change never reaches the network
    assert!(!radius.types.contains("gcp-compute-network"));

    let upstream = catalog
        .blast_radius("gcp-compute-forwarding-rule", Propagation::Upstream, None)
        .unwrap();
    assert!(upstream.types.contains("gcp-compute-health-check"));
    assert!(upstream.types.contains("gcp-compute-address"));
}

#[test]
fn test_builtin_self_reference_terminates() {
    let radius = builtin()
        .blast_radius("gcp-compute-target-pool", Propagation::Downstream, None)
        .unwrap();
    let self_hops = radius
        .hops
        .iter()
        .filter(|h| h.declared_by.as_str() == "gcp-compute-target-pool" && h.field_path == "backupPool")
        .count();
    assert_eq!(self_hops, 1);
}

#[test]
fn test_builtin_instance_traversal() {
    let catalog = builtin();
    let network = "https://www.googleapis.com/compute/v1/projects/proj1/global/networks/default";

    let mut source = |type_id: &ResourceTypeId, query: &str| match (type_id.as_str(), query) {
        ("gcp-compute-subnetwork", "subnet-a") => Some(json!({"name": "subnet-a", "network": network})),
        ("gcp-compute-network", "default") => Some(json!({"name": "default"})),
        _ => None,
    };

    let hops = catalog.traverse_instances("gcp-compute-subnetwork", "subnet-a", &mut source, Direction::In, 5);
    assert_eq!(hops.len(), 1);
    assert_eq!(hops[0].to_type.as_str(), "gcp-compute-network");
    assert_eq!(hops[0].to_query, "default");
    assert!(hops[0].resolved);
}

#[test]
fn test_duplicate_registration_is_reported() {
    let mut builder = CatalogBuilder::builtin().unwrap();
    builder
        .register(
            "gcp-storage-bucket",
            Declaration::new(
                AdapterMeta::new("gcp-storage-bucket", Category::Storage, ScopeLevel::Global)
                    .with_get(UrlTemplate::parse("https://storage.googleapis.com/storage/v1/b/{query}").unwrap())
                    .with_unique_keys(&["b"])
                    .in_development(true),
                BlastMap::new(),
                TerraformMapping::unmapped("overridden"),
            ),
        )
        .unwrap();
    let catalog = builder.build();

    assert_eq!(catalog.duplicates().len(), 1);
    assert!(catalog.lookup("gcp-storage-bucket").unwrap().in_development);
    assert!(catalog.graph().lookup("gcp-storage-bucket").unwrap().is_empty());
    assert!(!catalog.offerable_types().iter().any(|t| t.as_str() == "gcp-storage-bucket"));

    let findings = validate(&catalog, None);
    assert!(findings.iter().any(|f| f.message.contains("more than once")));
}

#[test]
fn test_load_json_overrides_builtin() {
    let mut builder = CatalogBuilder::builtin().unwrap();
    let count = builder
        .load_json(
            r#"{"adapters": {"gcp-compute-health-check": {
                "category": "NETWORK",
                "scope": "regional",
                "get": "https://compute.googleapis.com/compute/v1/projects/{project}/regions/{region}/healthChecks/{query}",
                "unique_attribute_keys": ["healthChecks"],
                "terraform": {"mappings": [{"method": "GET", "query": "google_compute_region_health_check.name"}]}
            }}}"#,
        )
        .unwrap();
    assert_eq!(count, 1);

    let catalog = builder.build();
    assert_eq!(catalog.lookup("gcp-compute-health-check").unwrap().scope, ScopeLevel::Regional);
    assert_eq!(
        catalog.terraform().types_for("google_compute_region_health_check")[0].0.as_str(),
        "gcp-compute-health-check"
    );
}
