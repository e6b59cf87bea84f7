//! DestinationRules competing for the same host and subset
//!
//! Rules are visited in declaration order. Each one claims `(host, subset)`
//! slots; a rule without subsets claims the `~` slot, which collides with
//! every subset of an overlapping host. Both sides of a collision get a
//! warning and a reference to each other.

use std::collections::BTreeMap;

use meshcheck_common::crd::DestinationRule;
use meshcheck_common::{mesh, Check, Host, ValidationKey, ValidationSet};
use meshcheck_mtls::MtlsContext;
use tracing::trace;

use crate::checker::{CheckContext, ObjectChecker};

const HOST_PATH: &str = "spec/host";

/// Host+subset conflict detector for DestinationRules
#[derive(Clone, Copy, Debug, Default)]
pub struct DestinationConflicts;

/// Subset slot -> rules that claimed it
type Slots = BTreeMap<String, Vec<ValidationKey>>;

impl ObjectChecker for DestinationConflicts {
    fn name(&self) -> &'static str {
        "destination-conflicts"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> ValidationSet {
        let hosts = ctx.hosts();
        let mtls = ctx.mtls();
        let mut validations = ValidationSet::new();
        let mut claimed: Vec<(Host, Slots)> = Vec::new();

        for dr in &ctx.snapshot.destination_rules {
            let key = ValidationKey::of(dr);
            let meta = &dr.metadata;
            let host = hosts.parse(&dr.spec.host, &meta.namespace, &meta.cluster);
            if !host.is_valid() {
                continue;
            }

            if !host.is_wildcard && !host.namespace.is_empty() && host.namespace != meta.namespace
            {
                validations.report(&key, Check::UnableCrossNamespace, HOST_PATH);
                continue;
            }

            if host.is_wildcard && enables_scope_mtls(&mtls, dr, &host) {
                continue;
            }

            let subsets: Vec<&str> = if dr.spec.subsets.is_empty() {
                vec![mesh::ANY_SUBSET]
            } else {
                dr.spec.subsets.iter().map(|s| s.name.as_str()).collect()
            };

            for (seen, slots) in &claimed {
                if !host.overlaps(seen) {
                    continue;
                }
                for owner in colliding_owners(slots, &subsets) {
                    if *owner == key {
                        continue;
                    }
                    trace!(rule = %key, other = %owner, host = %host, "subset collision");
                    validations.report(&key, Check::DestinationRuleMultiMatch, HOST_PATH);
                    validations.report(owner, Check::DestinationRuleMultiMatch, HOST_PATH);
                    validations.link(&key, owner);
                }
            }

            let index = match claimed.iter().position(|(h, _)| *h == host) {
                Some(index) => index,
                None => {
                    claimed.push((host, Slots::new()));
                    claimed.len() - 1
                }
            };
            let slots = &mut claimed[index].1;
            for subset in subsets {
                slots.entry(subset.to_string()).or_default().push(key.clone());
            }
        }

        validations
    }
}

/// Owners of every slot that collides with one of `subsets`
fn colliding_owners<'s>(
    slots: &'s Slots,
    subsets: &'s [&str],
) -> impl Iterator<Item = &'s ValidationKey> {
    slots
        .iter()
        .filter(move |(slot, _)| {
            slot.as_str() == mesh::ANY_SUBSET
                || subsets
                    .iter()
                    .any(|s| *s == mesh::ANY_SUBSET || *s == slot.as_str())
        })
        .flat_map(|(_, owners)| owners.iter())
}

/// Wildcard rules that switch on mutual TLS for a namespace or the mesh
/// configure transport, not routing, and are left out of the comparison.
fn enables_scope_mtls(mtls: &MtlsContext<'_>, dr: &DestinationRule, host: &Host) -> bool {
    dr.tls_mode().originates_mtls()
        && (mtls.is_mesh_wide(dr) || mtls.is_namespace_wide(dr, &host.namespace))
}

#[cfg(test)]
mod tests {
    use meshcheck_common::crd::{
        ClientTlsSettings, DestinationRuleSpec, ObjectKind, ObjectMeta, PolicyMode, Subset,
        TrafficPolicy,
    };
    use meshcheck_common::{Severity, Snapshot, ValidationConfig};

    use super::*;

    fn rule(name: &str, namespace: &str, host: &str, subsets: &[&str]) -> DestinationRule {
        DestinationRule::new(
            ObjectMeta::new(name, namespace),
            DestinationRuleSpec {
                host: host.to_string(),
                subsets: subsets
                    .iter()
                    .map(|s| Subset {
                        name: s.to_string(),
                        labels: [("version".to_string(), s.to_string())].into(),
                        traffic_policy: None,
                    })
                    .collect(),
                ..Default::default()
            },
        )
    }

    fn run(rules: Vec<DestinationRule>) -> ValidationSet {
        let mut snapshot = Snapshot::new("east");
        snapshot.namespaces.insert("test".to_string());
        snapshot.namespaces.insert("bookinfo".to_string());
        snapshot.destination_rules = rules;
        snapshot.finalize();
        let config = ValidationConfig::default();
        DestinationConflicts.check(&CheckContext::new(&snapshot, &config))
    }

    fn key(name: &str, namespace: &str) -> ValidationKey {
        ValidationKey::new(ObjectKind::DestinationRule, namespace, name, "east")
    }

    #[test]
    fn short_name_and_fqdn_collide() {
        let set = run(vec![
            rule("rule1", "test", "host1", &[]),
            rule("rule2", "test", "host1.test.svc.cluster.local", &[]),
        ]);
        assert_eq!(set.len(), 2);
        let one = set.get(&key("rule1", "test")).unwrap();
        let two = set.get(&key("rule2", "test")).unwrap();
        assert!(one.valid && two.valid, "multi-match is only a warning");
        assert_eq!(one.checks[0].code, "KIA0201");
        assert_eq!(one.checks[0].path, "spec/host");
        assert_eq!(one.references, vec![key("rule2", "test")]);
        assert_eq!(two.references, vec![key("rule1", "test")]);
    }

    #[test]
    fn three_rules_on_one_host_reference_each_other() {
        let set = run(vec![
            rule("a", "bookinfo", "reviews", &[]),
            rule("b", "bookinfo", "reviews", &[]),
            rule("c", "bookinfo", "reviews.bookinfo.svc.cluster.local", &[]),
        ]);
        assert_eq!(set.len(), 3);
        for name in ["a", "b", "c"] {
            let v = set.get(&key(name, "bookinfo")).unwrap();
            assert_eq!(v.references.len(), 2, "{name} references the other two");
            assert_eq!(v.checks.len(), 1, "findings on the same path collapse");
        }
    }

    #[test]
    fn disjoint_subsets_do_not_collide() {
        let set = run(vec![
            rule("v1", "bookinfo", "reviews", &["v1"]),
            rule("v2", "bookinfo", "reviews", &["v2"]),
        ]);
        assert!(set.is_empty());
    }

    #[test]
    fn shared_subset_collides() {
        let set = run(vec![
            rule("a", "bookinfo", "reviews", &["v1", "v2"]),
            rule("b", "bookinfo", "reviews", &["v2", "v3"]),
        ]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn subsetless_rule_collides_with_any_subset() {
        let set = run(vec![
            rule("subsets", "bookinfo", "reviews", &["v1"]),
            rule("plain", "bookinfo", "reviews", &[]),
        ]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn namespace_wildcard_collides_with_covered_hosts() {
        let set = run(vec![
            rule("reviews", "bookinfo", "reviews", &[]),
            rule("all", "bookinfo", "*.bookinfo.svc.cluster.local", &[]),
            rule("elsewhere", "test", "host1", &[]),
        ]);
        assert_eq!(set.len(), 2);
        assert!(set.get(&key("elsewhere", "test")).is_none());
    }

    #[test]
    fn plain_host_collides_with_earlier_wildcard() {
        let set = run(vec![
            rule("all", "bookinfo", "*.bookinfo", &[]),
            rule("reviews", "bookinfo", "reviews", &[]),
        ]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn mesh_wildcard_collides_in_either_order() {
        for rules in [
            vec![
                rule("all", "bookinfo", "*", &[]),
                rule("ns", "bookinfo", "*.bookinfo", &[]),
            ],
            vec![
                rule("ns", "bookinfo", "*.bookinfo", &[]),
                rule("all", "bookinfo", "*", &[]),
            ],
        ] {
            let set = run(rules);
            assert_eq!(set.len(), 2);
            assert_eq!(
                set.get(&key("all", "bookinfo")).unwrap().references,
                vec![key("ns", "bookinfo")]
            );
            assert_eq!(
                set.get(&key("ns", "bookinfo")).unwrap().references,
                vec![key("all", "bookinfo")]
            );
        }
    }

    #[test]
    fn cross_namespace_host_is_unknown_and_skipped() {
        let set = run(vec![
            rule("local", "bookinfo", "reviews", &[]),
            rule("remote", "test", "reviews.bookinfo.svc.cluster.local", &[]),
        ]);
        assert_eq!(set.len(), 1);
        let v = set.get(&key("remote", "test")).unwrap();
        assert!(v.valid);
        assert_eq!(v.checks[0].severity, Severity::Unknown);
        assert!(v.references.is_empty());
    }

    #[test]
    fn namespace_wide_mtls_rule_is_ignored() {
        let mut mtls = rule("mtls", "bookinfo", "*.bookinfo.svc.cluster.local", &[]);
        mtls.spec.traffic_policy = Some(TrafficPolicy {
            tls: Some(ClientTlsSettings {
                mode: PolicyMode::IstioMutual,
            }),
            ..Default::default()
        });
        let set = run(vec![mtls, rule("reviews", "bookinfo", "reviews", &[])]);
        assert!(set.is_empty());
    }

    #[test]
    fn rerun_is_identical() {
        let rules = || {
            vec![
                rule("a", "bookinfo", "reviews", &["v1"]),
                rule("b", "bookinfo", "*.bookinfo", &[]),
                rule("c", "bookinfo", "reviews", &["v1"]),
            ]
        };
        let first = serde_json::to_string(&run(rules())).unwrap();
        let second = serde_json::to_string(&run(rules())).unwrap();
        assert_eq!(first, second);
    }
}
