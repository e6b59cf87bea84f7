//! End-to-end validation runs over YAML manifest streams

use meshcheck_common::{Error, Snapshot, ValidationConfig};
use meshcheck_validation::ValidationEngine;
use serde_json::Value;

// =============================================================================
// Test Fixtures
// =============================================================================

const WORKLOADS: &str = r#"
apiVersion: v1
kind: Namespace
metadata:
  name: bookinfo
---
apiVersion: v1
kind: Namespace
metadata:
  name: istio-system
---
apiVersion: v1
kind: Service
metadata:
  name: reviews
  namespace: bookinfo
spec:
  selector:
    app: reviews
  ports:
    - name: http
      port: 9080
---
apiVersion: v1
kind: Service
metadata:
  name: ratings
  namespace: bookinfo
spec:
  selector:
    app: ratings
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: reviews-v1
  namespace: bookinfo
spec:
  template:
    metadata:
      labels:
        app: reviews
        version: v1
    spec:
      serviceAccountName: bookinfo-reviews
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: reviews-v2
  namespace: bookinfo
spec:
  template:
    metadata:
      labels:
        app: reviews
        version: v2
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: istio-ingressgateway
  namespace: istio-system
spec:
  template:
    metadata:
      labels:
        istio: ingressgateway
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: ignored
  namespace: bookinfo
data:
  key: value
"#;

const MESH_CONFIG: &str = r#"
apiVersion: networking.istio.io/v1
kind: DestinationRule
metadata:
  name: reviews
  namespace: bookinfo
spec:
  host: reviews
  subsets:
    - name: v1
      labels:
        version: v1
    - name: v2
      labels:
        version: v2
---
apiVersion: networking.istio.io/v1
kind: DestinationRule
metadata:
  name: reviews-fqdn
  namespace: bookinfo
spec:
  host: reviews.bookinfo.svc.cluster.local
---
apiVersion: networking.istio.io/v1
kind: VirtualService
metadata:
  name: reviews
  namespace: bookinfo
spec:
  hosts:
    - reviews
  http:
    - route:
        - destination:
            host: reviews
            subset: v1
          weight: 70
        - destination:
            host: reviews
            subset: v2
          weight: 20
---
apiVersion: networking.istio.io/v1
kind: Gateway
metadata:
  name: public
  namespace: bookinfo
spec:
  selector:
    istio: ingressgateway
  servers:
    - port:
        number: 80
        name: http
        protocol: HTTP
      hosts:
        - "*.example.com"
---
apiVersion: networking.istio.io/v1
kind: Gateway
metadata:
  name: shop
  namespace: bookinfo
spec:
  selector:
    istio: ingressgateway
  servers:
    - port:
        number: 80
        name: http
        protocol: HTTP
      hosts:
        - bookinfo/shop.example.com
---
apiVersion: security.istio.io/v1
kind: AuthorizationPolicy
metadata:
  name: reviews-viewer
  namespace: bookinfo
spec:
  selector:
    matchLabels:
      app: reviews
  action: ALLOW
  rules:
    - from:
        - source:
            principals:
              - cluster.local/ns/bookinfo/sa/bookinfo-reviews
              - cluster.local/ns/bookinfo/sa/ghost
      to:
        - operation:
            methods: ["GET", "FETCH"]
"#;

fn snapshot() -> Snapshot {
    Snapshot::from_manifests("east", &format!("{WORKLOADS}---{MESH_CONFIG}"))
        .expect("fixture manifests should decode")
}

fn run(config: ValidationConfig) -> Value {
    let set = ValidationEngine::new(config).validate(&snapshot());
    serde_json::from_str(&set.to_json().expect("validation set should serialize"))
        .expect("output should be JSON")
}

fn codes(entry: &Value) -> Vec<&str> {
    entry["checks"]
        .as_array()
        .expect("checks array")
        .iter()
        .map(|c| c["code"].as_str().expect("code"))
        .collect()
}

// =============================================================================
// Snapshot loading
// =============================================================================

#[test]
fn manifests_decode_into_snapshot() {
    let snap = snapshot();
    assert_eq!(snap.services.len(), 2);
    assert_eq!(snap.workloads.len(), 3);
    assert_eq!(snap.destination_rules.len(), 2);
    assert!(snap.has_namespace("istio-system"));
    assert!(snap
        .destination_rules
        .iter()
        .all(|dr| dr.metadata.cluster == "east"));
}

#[test]
fn broken_manifest_reports_document_index() {
    let err = Snapshot::from_manifests(
        "east",
        "kind: Namespace\nmetadata:\n  name: ok\n---\nkind: DestinationRule\nmetadata: 7\n",
    )
    .expect_err("metadata must be a mapping");
    match err {
        Error::Manifest { document, kind, .. } => {
            assert_eq!(document, 1);
            assert_eq!(kind, "DestinationRule");
        }
        other => panic!("expected manifest error, got {other:?}"),
    }
}

// =============================================================================
// Validation output
// =============================================================================

#[test]
fn bookinfo_findings() {
    let out = run(ValidationConfig::default());
    let entries = out.as_object().expect("top-level object");

    let reviews_dr = &out["destinationrule/bookinfo/reviews"];
    assert_eq!(reviews_dr["valid"], Value::Bool(true));
    assert_eq!(codes(reviews_dr), vec!["KIA0201"]);
    assert_eq!(
        reviews_dr["references"][0],
        serde_json::json!({
            "objectKind": "destinationrule",
            "namespace": "bookinfo",
            "name": "reviews-fqdn",
            "cluster": "east"
        })
    );

    let vs = &out["virtualservice/bookinfo/reviews"];
    assert_eq!(vs["valid"], Value::Bool(false));
    assert_eq!(codes(vs), vec!["KIA1109"]);
    assert_eq!(vs["checks"][0]["path"], "spec/http[0]/route");
    assert_eq!(vs["checks"][0]["severity"], "error");

    for gateway in ["gateway/bookinfo/public", "gateway/bookinfo/shop"] {
        assert_eq!(codes(&out[gateway]), vec!["KIA0301"], "{gateway}");
    }

    let policy = &out["authorizationpolicy/bookinfo/reviews-viewer"];
    assert_eq!(codes(policy), vec!["KIA0106", "KIA0102"]);
    assert_eq!(
        policy["checks"][0]["path"],
        "spec/rules[0]/from[0]/source/principals[1]"
    );

    assert_eq!(entries.len(), 6, "unexpected entries: {:?}", entries.keys());
}

#[test]
fn skipping_wildcard_gateways_keeps_literal_overlaps() {
    let out = run(ValidationConfig {
        skip_wildcard_gateway_hosts: true,
        ..Default::default()
    });
    assert!(out.get("gateway/bookinfo/public").is_some());
}

#[test]
fn ignored_codes_disappear_from_output() {
    let out = run(ValidationConfig {
        ignored_checks: vec!["KIA1109".to_string(), "KIA0102".to_string()],
        ..Default::default()
    });
    assert!(out.get("virtualservice/bookinfo/reviews").is_none());
    let policy = &out["authorizationpolicy/bookinfo/reviews-viewer"];
    assert_eq!(codes(policy), vec!["KIA0106"]);
    assert_eq!(policy["valid"], Value::Bool(false));
}

#[test]
fn output_is_byte_identical_across_runs() {
    let engine = ValidationEngine::default();
    let first = engine.validate(&snapshot()).to_json().unwrap();
    let second = engine.validate(&snapshot()).to_json().unwrap();
    assert_eq!(first, second);
}
