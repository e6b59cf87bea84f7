//! VirtualService validations

use std::collections::{BTreeMap, BTreeSet};

use meshcheck_common::crd::{RouteDestination, VirtualService};
use meshcheck_common::{
    mesh, Check, Host, HostParser, Validation, ValidationKey, ValidationSet,
};

use crate::checker::{check_export_to, keep, CheckContext, ObjectChecker};

const HOSTS_PATH: &str = "spec/hosts";

/// Host, gateway, route and subset checks plus single-host conflicts
#[derive(Clone, Copy, Debug, Default)]
pub struct VirtualServiceChecker;

impl ObjectChecker for VirtualServiceChecker {
    fn name(&self) -> &'static str {
        "virtual-services"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> ValidationSet {
        let hosts = ctx.hosts();
        let mut validations = single_host_conflicts(ctx, &hosts);

        for vs in &ctx.snapshot.virtual_services {
            let mut validation = Validation::new(ValidationKey::of(vs));
            check_gateways(ctx, vs, &mut validation);
            check_destinations(ctx, &hosts, vs, &mut validation);
            for (prefix, route) in vs.route_groups() {
                check_weights(&prefix, route, &mut validation);
                check_repeated_subsets(&hosts, vs, &prefix, route, &mut validation);
            }
            check_export_to(ctx, &vs.spec.export_to, &mut validation);
            keep(&mut validations, validation);
        }

        validations
    }
}

// =============================================================================
// Gateways
// =============================================================================

/// `namespace/name` for a gateway reference; `mesh` stays as is
fn qualify_gateway(raw: &str, namespace: &str) -> String {
    if raw == mesh::MESH_GATEWAY {
        return raw.to_string();
    }
    match raw.split_once('/') {
        Some((".", name)) => format!("{namespace}/{name}"),
        Some(_) => raw.to_string(),
        None => format!("{namespace}/{raw}"),
    }
}

/// Gateways a VirtualService is bound to; sidecars (`mesh`) when none are listed
fn gateway_bindings(vs: &VirtualService) -> BTreeSet<String> {
    if vs.spec.gateways.is_empty() {
        return BTreeSet::from([mesh::MESH_GATEWAY.to_string()]);
    }
    vs.spec
        .gateways
        .iter()
        .map(|g| qualify_gateway(g, &vs.metadata.namespace))
        .collect()
}

fn check_gateways(ctx: &CheckContext<'_>, vs: &VirtualService, validation: &mut Validation) {
    for (i, raw) in vs.spec.gateways.iter().enumerate() {
        if raw == mesh::MESH_GATEWAY {
            continue;
        }
        let qualified = qualify_gateway(raw, &vs.metadata.namespace);
        let exists = ctx.snapshot.gateways.iter().any(|gw| {
            qualified
                .split_once('/')
                .is_some_and(|(ns, name)| gw.metadata.namespace == ns && gw.metadata.name == name)
        });
        if !exists {
            validation.add_check(Check::VirtualServiceGatewayNotFound, format!("spec/gateways[{i}]"));
        }
    }
}

/// Two VirtualServices bound to the same gateway must not claim
/// overlapping hosts.
fn single_host_conflicts(ctx: &CheckContext<'_>, hosts: &HostParser<'_>) -> ValidationSet {
    let mut validations = ValidationSet::new();
    let mut claimed: BTreeMap<String, Vec<(Host, ValidationKey)>> = BTreeMap::new();

    for vs in &ctx.snapshot.virtual_services {
        let key = ValidationKey::of(vs);
        let meta = &vs.metadata;
        let vs_hosts: Vec<Host> = vs
            .spec
            .hosts
            .iter()
            .map(|raw| hosts.parse(raw, &meta.namespace, &meta.cluster))
            .filter(Host::is_valid)
            .collect();

        for gateway in gateway_bindings(vs) {
            let seen = claimed.entry(gateway).or_default();
            for host in &vs_hosts {
                for (other, owner) in seen.iter() {
                    if *owner != key && host.overlaps(other) {
                        validations.report(&key, Check::VirtualServiceSingleHost, HOSTS_PATH);
                        validations.report(owner, Check::VirtualServiceSingleHost, HOSTS_PATH);
                        validations.link(&key, owner);
                    }
                }
            }
            seen.extend(vs_hosts.iter().map(|h| (h.clone(), key.clone())));
        }
    }

    validations
}

// =============================================================================
// Destinations
// =============================================================================

fn check_destinations(
    ctx: &CheckContext<'_>,
    hosts: &HostParser<'_>,
    vs: &VirtualService,
    validation: &mut Validation,
) {
    let meta = &vs.metadata;
    for (path, dest) in vs.destinations() {
        let raw = dest.destination.host.as_str();
        let host = hosts.parse(raw, &meta.namespace, &meta.cluster);
        if !host.is_valid() {
            validation.add_check(Check::VirtualServiceHostNotFound, format!("{path}/host"));
            continue;
        }
        if !host.is_external() && !hosts.is_known_namespace(&host.namespace) {
            validation.add_check(Check::UnableCrossNamespace, format!("{path}/host"));
            continue;
        }
        if !ctx.snapshot.host_in_registry(&host, raw) {
            validation.add_check(Check::VirtualServiceHostNotFound, format!("{path}/host"));
            continue;
        }
        if let Some(subset) = dest.destination.subset.as_deref() {
            if !subset_defined(ctx, hosts, &host, subset) {
                validation.add_check(Check::VirtualServiceSubsetNotFound, path);
            }
        }
    }
}

/// Whether some DestinationRule covering `host` declares `subset`
fn subset_defined(ctx: &CheckContext<'_>, hosts: &HostParser<'_>, host: &Host, subset: &str) -> bool {
    ctx.snapshot.destination_rules.iter().any(|dr| {
        let dr_host = hosts.parse(&dr.spec.host, &dr.metadata.namespace, &dr.metadata.cluster);
        dr_host.contains(host) && dr.spec.subsets.iter().any(|s| s.name == subset)
    })
}

// =============================================================================
// Routes
// =============================================================================

/// A lone weighted destination should carry all traffic; several weighted
/// destinations must add up to 100.
fn check_weights(prefix: &str, route: &[RouteDestination], validation: &mut Validation) {
    match route {
        [] => {}
        [single] => {
            if single.weight.is_some_and(|w| w != 100) {
                validation.add_check(Check::VirtualServiceSingleWeight, format!("{prefix}[0]/weight"));
            }
        }
        many => {
            if many.iter().all(|d| d.weight.is_none()) {
                return;
            }
            let sum = many
                .iter()
                .filter_map(|d| d.weight)
                .try_fold(0i64, |acc, w| acc.checked_add(w));
            if sum != Some(100) {
                validation.add_check(Check::VirtualServiceWeightSum, prefix);
            }
        }
    }
}

fn check_repeated_subsets(
    hosts: &HostParser<'_>,
    vs: &VirtualService,
    prefix: &str,
    route: &[RouteDestination],
    validation: &mut Validation,
) {
    let meta = &vs.metadata;
    let mut first_seen: BTreeMap<(Host, Option<&str>), usize> = BTreeMap::new();

    for (j, dest) in route.iter().enumerate() {
        let host = hosts.parse(&dest.destination.host, &meta.namespace, &meta.cluster);
        let slot = (host, dest.destination.subset.as_deref());
        match first_seen.get(&slot) {
            Some(&first) => {
                validation.add_check(
                    Check::VirtualServiceRepeatedSubset,
                    format!("{prefix}[{first}]/destination"),
                );
                validation.add_check(
                    Check::VirtualServiceRepeatedSubset,
                    format!("{prefix}[{j}]/destination"),
                );
            }
            None => {
                first_seen.insert(slot, j);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use meshcheck_common::crd::{
        Destination, DestinationRule, DestinationRuleSpec, Gateway, GatewaySpec, HttpRoute,
        ObjectKind, ObjectMeta, Service, Subset, TcpRoute, VirtualServiceSpec,
    };
    use meshcheck_common::{Severity, Snapshot, ValidationConfig};

    use super::*;

    fn dest(host: &str, subset: Option<&str>, weight: Option<i64>) -> RouteDestination {
        RouteDestination {
            destination: Destination {
                host: host.to_string(),
                subset: subset.map(str::to_string),
                port: None,
            },
            weight,
        }
    }

    fn virtual_service(name: &str, hosts: &[&str], route: Vec<RouteDestination>) -> VirtualService {
        VirtualService::new(
            ObjectMeta::new(name, "bookinfo"),
            VirtualServiceSpec {
                hosts: hosts.iter().map(|h| h.to_string()).collect(),
                http: vec![HttpRoute { name: None, route }],
                ..Default::default()
            },
        )
    }

    fn snapshot(virtual_services: Vec<VirtualService>) -> Snapshot {
        let mut snapshot = Snapshot::new("east");
        snapshot.virtual_services = virtual_services;
        snapshot.services = ["reviews", "ratings"]
            .into_iter()
            .map(|app| Service::new(app, "bookinfo", [("app".to_string(), app.to_string())].into()))
            .collect();
        snapshot.destination_rules = vec![DestinationRule::new(
            ObjectMeta::new("reviews", "bookinfo"),
            DestinationRuleSpec {
                host: "reviews".to_string(),
                subsets: ["v1", "v2"]
                    .into_iter()
                    .map(|v| Subset {
                        name: v.to_string(),
                        labels: [("version".to_string(), v.to_string())].into(),
                        traffic_policy: None,
                    })
                    .collect(),
                ..Default::default()
            },
        )];
        snapshot.gateways = vec![Gateway::new(
            ObjectMeta::new("bookinfo-gateway", "bookinfo"),
            GatewaySpec::default(),
        )];
        snapshot.finalize();
        snapshot
    }

    fn run(virtual_services: Vec<VirtualService>) -> ValidationSet {
        let snapshot = snapshot(virtual_services);
        let config = ValidationConfig::default();
        VirtualServiceChecker.check(&CheckContext::new(&snapshot, &config))
    }

    fn key(name: &str) -> ValidationKey {
        ValidationKey::new(ObjectKind::VirtualService, "bookinfo", name, "east")
    }

    fn findings(set: &ValidationSet, name: &str) -> Vec<(String, String)> {
        set.get(&key(name))
            .map(|v| {
                v.checks
                    .iter()
                    .map(|f| (f.code.clone(), f.path.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn pair(code: &str, path: &str) -> (String, String) {
        (code.to_string(), path.to_string())
    }

    #[test]
    fn well_formed_split_is_clean() {
        let set = run(vec![virtual_service(
            "reviews",
            &["reviews"],
            vec![
                dest("reviews", Some("v1"), Some(80)),
                dest("reviews", Some("v2"), Some(20)),
            ],
        )]);
        assert!(set.is_empty());
    }

    // =========================================================================
    // Weights and subsets
    // =========================================================================

    #[test]
    fn weights_must_sum_to_one_hundred() {
        let set = run(vec![virtual_service(
            "reviews",
            &["reviews"],
            vec![
                dest("reviews", Some("v1"), Some(50)),
                dest("reviews", Some("v2"), Some(20)),
            ],
        )]);
        assert_eq!(findings(&set, "reviews"), vec![pair("KIA1109", "spec/http[0]/route")]);
        assert!(!set.get(&key("reviews")).unwrap().valid);
    }

    #[test]
    fn out_of_range_weights_do_not_sum_to_one_hundred() {
        let set = run(vec![virtual_service(
            "reviews",
            &["reviews"],
            vec![
                dest("reviews", Some("v1"), Some(i64::MAX)),
                dest("reviews", Some("v2"), Some(1)),
            ],
        )]);
        assert_eq!(findings(&set, "reviews"), vec![pair("KIA1109", "spec/http[0]/route")]);
    }

    #[test]
    fn unweighted_split_is_not_summed() {
        let set = run(vec![virtual_service(
            "reviews",
            &["reviews"],
            vec![dest("reviews", Some("v1"), None), dest("reviews", Some("v2"), None)],
        )]);
        assert!(set.is_empty());
    }

    #[test]
    fn single_partial_weight_is_a_warning() {
        let set = run(vec![virtual_service(
            "reviews",
            &["reviews"],
            vec![dest("reviews", Some("v1"), Some(60))],
        )]);
        assert_eq!(
            findings(&set, "reviews"),
            vec![pair("KIA1104", "spec/http[0]/route[0]/weight")]
        );
        assert!(set.get(&key("reviews")).unwrap().valid);
    }

    #[test]
    fn repeated_host_and_subset() {
        let set = run(vec![virtual_service(
            "reviews",
            &["reviews"],
            vec![
                dest("reviews", Some("v1"), Some(50)),
                dest("reviews.bookinfo.svc.cluster.local", Some("v1"), Some(50)),
            ],
        )]);
        assert_eq!(
            findings(&set, "reviews"),
            vec![
                pair("KIA1105", "spec/http[0]/route[0]/destination"),
                pair("KIA1105", "spec/http[0]/route[1]/destination"),
            ]
        );
    }

    #[test]
    fn undefined_subset() {
        let set = run(vec![virtual_service(
            "reviews",
            &["reviews"],
            vec![dest("reviews", Some("v3"), None)],
        )]);
        assert_eq!(
            findings(&set, "reviews"),
            vec![pair("KIA1107", "spec/http[0]/route[0]/destination")]
        );
    }

    // =========================================================================
    // Hosts and gateways
    // =========================================================================

    #[test]
    fn unknown_destination_host() {
        let mut vs = virtual_service("reviews", &["reviews"], vec![dest("reviews", None, None)]);
        vs.spec.tcp = vec![TcpRoute {
            route: vec![dest("details", None, None)],
        }];
        let set = run(vec![vs]);
        assert_eq!(
            findings(&set, "reviews"),
            vec![pair("KIA1101", "spec/tcp[0]/route[0]/destination/host")]
        );
    }

    #[test]
    fn empty_destination_host_is_not_found() {
        let set = run(vec![virtual_service("reviews", &["reviews"], vec![dest("", None, None)])]);
        assert_eq!(
            findings(&set, "reviews"),
            vec![pair("KIA1101", "spec/http[0]/route[0]/destination/host")]
        );
    }

    #[test]
    fn destination_in_unknown_namespace_is_unknown() {
        let set = run(vec![virtual_service(
            "reviews",
            &["reviews"],
            vec![dest("reviews.faraway.svc.cluster.local", None, None)],
        )]);
        let v = set.get(&key("reviews")).unwrap();
        assert!(v.valid);
        assert_eq!(v.checks[0].severity, Severity::Unknown);
    }

    #[test]
    fn missing_gateway() {
        let mut vs = virtual_service("reviews", &["reviews"], vec![dest("reviews", None, None)]);
        vs.spec.gateways = vec![
            "mesh".to_string(),
            "bookinfo-gateway".to_string(),
            "bookinfo/bookinfo-gateway".to_string(),
            "istio-system/missing".to_string(),
        ];
        let set = run(vec![vs]);
        assert_eq!(findings(&set, "reviews"), vec![pair("KIA1102", "spec/gateways[3]")]);
    }

    #[test]
    fn same_host_on_same_gateway_conflicts() {
        let route = || vec![dest("reviews", None, None)];
        let set = run(vec![
            virtual_service("a", &["reviews"], route()),
            virtual_service("b", &["reviews.bookinfo.svc.cluster.local"], route()),
        ]);
        assert_eq!(findings(&set, "a"), vec![pair("KIA1106", "spec/hosts")]);
        assert_eq!(set.get(&key("a")).unwrap().references, vec![key("b")]);
        assert_eq!(set.get(&key("b")).unwrap().references, vec![key("a")]);
    }

    #[test]
    fn same_host_on_different_gateways_is_fine() {
        let route = || vec![dest("reviews", None, None)];
        let mut ingress = virtual_service("ingress", &["reviews"], route());
        ingress.spec.gateways = vec!["bookinfo-gateway".to_string()];
        let set = run(vec![virtual_service("mesh", &["reviews"], route()), ingress]);
        assert!(set.is_empty());
    }

    #[test]
    fn gateway_references_are_qualified() {
        assert_eq!(qualify_gateway("mesh", "bookinfo"), "mesh");
        assert_eq!(qualify_gateway("gw", "bookinfo"), "bookinfo/gw");
        assert_eq!(qualify_gateway("./gw", "bookinfo"), "bookinfo/gw");
        assert_eq!(qualify_gateway("istio-system/gw", "bookinfo"), "istio-system/gw");
    }
}
