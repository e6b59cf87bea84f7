//! AuthorizationPolicy validations
//!
//! Rules are checked field by field; every finding points at the list entry
//! that caused it, e.g. `spec/rules[0]/from[1]/source/principals[2]`.

use std::collections::BTreeSet;

use meshcheck_common::crd::{effective_selector, AuthorizationPolicy, Rule};
use meshcheck_common::{mesh, Check, HostParser, Validation, ValidationKey, ValidationSet};
use meshcheck_mtls::MtlsContext;

use crate::checker::{check_workload_selector, keep, CheckContext, ObjectChecker};

const HTTP_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE", "PATCH",
];

/// `when` keys that can only be evaluated over mutual TLS
const IDENTITY_KEYS: &[&str] = &[
    "source.principal",
    "source.namespace",
    "connection.sni",
];

/// Selector, source, operation and mTLS checks
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthorizationPolicyChecker;

struct PolicyScope<'a> {
    ctx: &'a CheckContext<'a>,
    hosts: HostParser<'a>,
    mtls: MtlsContext<'a>,
    principals: BTreeSet<String>,
}

impl ObjectChecker for AuthorizationPolicyChecker {
    fn name(&self) -> &'static str {
        "authorization-policies"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> ValidationSet {
        let mut validations = ValidationSet::new();
        if ctx.snapshot.authorization_policies.is_empty() {
            return validations;
        }
        let scope = PolicyScope {
            ctx,
            hosts: ctx.hosts(),
            mtls: ctx.mtls(),
            principals: ctx.snapshot.principals(&ctx.config.trust_domain),
        };

        for policy in &ctx.snapshot.authorization_policies {
            let mut validation = Validation::new(ValidationKey::of(policy));
            check_workload_selector(
                ctx,
                &policy.metadata.namespace,
                policy.spec.selector.as_ref(),
                "spec/selector",
                &mut validation,
            );
            for (i, rule) in policy.spec.rules.iter().enumerate() {
                scope.check_sources(i, rule, &mut validation);
                scope.check_operations(policy, i, rule, &mut validation);
                scope.check_mtls(policy, i, rule, &mut validation);
            }
            keep(&mut validations, validation);
        }

        validations
    }
}

/// Whether a value uses Istio's prefix/suffix/presence matching
fn is_pattern(value: &str) -> bool {
    value.starts_with('*') || value.ends_with('*')
}

/// HTTP verb or fully-qualified gRPC method (`/package.Service/Method`)
fn is_valid_method(method: &str) -> bool {
    if HTTP_METHODS.contains(&method) || is_pattern(method) {
        return true;
    }
    let Some(rest) = method.strip_prefix('/') else {
        return false;
    };
    match rest.split_once('/') {
        Some((service, name)) => {
            service.contains('.')
                && !service.starts_with('.')
                && !service.ends_with('.')
                && !name.is_empty()
                && !name.contains('/')
        }
        None => false,
    }
}

impl PolicyScope<'_> {
    fn check_sources(&self, i: usize, rule: &Rule, validation: &mut Validation) {
        for (j, from) in rule.from.iter().enumerate() {
            let source = &from.source;
            let prefix = format!("spec/rules[{i}]/from[{j}]/source");

            for (k, namespace) in source.namespaces.iter().enumerate() {
                if !is_pattern(namespace) && !self.ctx.snapshot.has_namespace(namespace) {
                    validation.add_check(
                        Check::AuthorizationSourceNamespaceNotFound,
                        format!("{prefix}/namespaces[{k}]"),
                    );
                }
            }
            for (k, principal) in source.principals.iter().enumerate() {
                if !is_pattern(principal) && !self.principals.contains(principal) {
                    validation.add_check(
                        Check::AuthorizationPrincipalNotFound,
                        format!("{prefix}/principals[{k}]"),
                    );
                }
            }
        }
    }

    fn check_operations(
        &self,
        policy: &AuthorizationPolicy,
        i: usize,
        rule: &Rule,
        validation: &mut Validation,
    ) {
        let meta = &policy.metadata;
        for (j, to) in rule.to.iter().enumerate() {
            let operation = &to.operation;
            let prefix = format!("spec/rules[{i}]/to[{j}]/operation");

            for (k, raw) in operation.hosts.iter().enumerate() {
                if raw == mesh::WILDCARD_HOST {
                    continue;
                }
                let path = format!("{prefix}/hosts[{k}]");
                let host = self.hosts.parse(raw, &meta.namespace, &meta.cluster);
                let foreign = !host.namespace.is_empty() && host.namespace != meta.namespace;
                if host.is_wildcard && foreign {
                    validation.add_check(Check::UnableCrossNamespace, path);
                } else if !self.ctx.snapshot.host_in_registry(&host, raw) {
                    validation.add_check(Check::AuthorizationHostNotFound, path);
                }
            }

            for (k, method) in operation.methods.iter().enumerate() {
                if !is_valid_method(method) {
                    validation.add_check(
                        Check::AuthorizationWrongMethod,
                        format!("{prefix}/methods[{k}]"),
                    );
                }
            }
        }
    }

    /// Identity fields need mutual TLS to reach the selected workloads
    fn check_mtls(
        &self,
        policy: &AuthorizationPolicy,
        i: usize,
        rule: &Rule,
        validation: &mut Validation,
    ) {
        let mut identity_paths = Vec::new();
        for (j, from) in rule.from.iter().enumerate() {
            let source = &from.source;
            let fields = [
                ("principals", source.principals.is_empty()),
                ("notPrincipals", source.not_principals.is_empty()),
                ("namespaces", source.namespaces.is_empty()),
                ("notNamespaces", source.not_namespaces.is_empty()),
            ];
            for (field, empty) in fields {
                if !empty {
                    identity_paths.push(format!("spec/rules[{i}]/from[{j}]/source/{field}"));
                }
            }
        }
        for (k, condition) in rule.when.iter().enumerate() {
            if IDENTITY_KEYS.contains(&condition.key.as_str()) {
                identity_paths.push(format!("spec/rules[{i}]/when[{k}]"));
            }
        }
        if identity_paths.is_empty() {
            return;
        }

        let labels = effective_selector(policy.spec.selector.as_ref());
        if self.mtls.receives_mtls(&policy.metadata.namespace, labels) {
            return;
        }
        for path in identity_paths {
            validation.add_check(Check::AuthorizationMtlsRequired, path);
        }
    }
}

#[cfg(test)]
mod tests {
    use meshcheck_common::crd::{
        AuthorizationPolicySpec, ClientTlsSettings, Condition, DestinationRule,
        DestinationRuleSpec, ObjectKind, ObjectMeta, Operation, PeerAuthentication,
        PeerAuthenticationSpec, PeerMtls, PolicyMode, RuleFrom, RuleTo, Service, Source,
        TrafficPolicy, Workload,
    };
    use meshcheck_common::{Snapshot, ValidationConfig};

    use super::*;

    fn policy(rule: Rule) -> AuthorizationPolicy {
        AuthorizationPolicy::new(
            ObjectMeta::new("allow", "bookinfo"),
            AuthorizationPolicySpec {
                selector: None,
                action: "ALLOW".to_string(),
                rules: vec![rule],
            },
        )
    }

    fn from_source(source: Source) -> Rule {
        Rule {
            from: vec![RuleFrom { source }],
            ..Default::default()
        }
    }

    fn to_operation(operation: Operation) -> Rule {
        Rule {
            to: vec![RuleTo { operation }],
            ..Default::default()
        }
    }

    fn snapshot(policies: Vec<AuthorizationPolicy>) -> Snapshot {
        let mut snapshot = Snapshot::new("east");
        snapshot.authorization_policies = policies;
        snapshot.services = vec![Service::new(
            "reviews",
            "bookinfo",
            [("app".to_string(), "reviews".to_string())].into(),
        )];
        snapshot.workloads = vec![
            Workload::new("reviews-v1", "bookinfo", [("app", "reviews")])
                .with_service_account("bookinfo-reviews"),
            Workload::new("productpage-v1", "bookinfo", [("app", "productpage")]),
        ];
        snapshot.finalize();
        snapshot
    }

    fn run_with(snapshot: &Snapshot, config: &ValidationConfig) -> ValidationSet {
        AuthorizationPolicyChecker.check(&CheckContext::new(snapshot, config))
    }

    fn run(policies: Vec<AuthorizationPolicy>) -> ValidationSet {
        run_with(&snapshot(policies), &ValidationConfig::default())
    }

    fn findings(set: &ValidationSet) -> Vec<(String, String)> {
        set.get(&ValidationKey::new(
            ObjectKind::AuthorizationPolicy,
            "bookinfo",
            "allow",
            "east",
        ))
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

    // =========================================================================
    // Sources
    // =========================================================================

    #[test]
    fn known_principals_and_namespaces_are_clean() {
        let set = run(vec![policy(from_source(Source {
            principals: vec![
                "cluster.local/ns/bookinfo/sa/bookinfo-reviews".to_string(),
                "cluster.local/ns/bookinfo/sa/default".to_string(),
                "*".to_string(),
            ],
            namespaces: vec!["bookinfo".to_string(), "istio-*".to_string()],
            ..Default::default()
        }))]);
        assert!(set.is_empty());
    }

    #[test]
    fn unknown_principal_and_namespace() {
        let set = run(vec![policy(from_source(Source {
            principals: vec!["cluster.local/ns/bookinfo/sa/ghost".to_string()],
            namespaces: vec!["nowhere".to_string()],
            ..Default::default()
        }))]);
        assert_eq!(
            findings(&set),
            vec![
                pair("KIA0101", "spec/rules[0]/from[0]/source/namespaces[0]"),
                pair("KIA0106", "spec/rules[0]/from[0]/source/principals[0]"),
            ]
        );
    }

    // =========================================================================
    // Operations
    // =========================================================================

    #[test]
    fn operation_hosts() {
        let set = run(vec![policy(to_operation(Operation {
            hosts: vec![
                "*".to_string(),
                "reviews".to_string(),
                "reviews.bookinfo.svc.cluster.local".to_string(),
                "details".to_string(),
                "*.faraway.svc.cluster.local".to_string(),
            ],
            ..Default::default()
        }))]);
        let out = findings(&set);
        assert_eq!(
            out,
            vec![
                pair("KIA0104", "spec/rules[0]/to[0]/operation/hosts[3]"),
                pair("KIA0001", "spec/rules[0]/to[0]/operation/hosts[4]"),
            ]
        );
    }

    #[test]
    fn methods_must_be_http_or_grpc() {
        assert!(is_valid_method("GET"));
        assert!(is_valid_method("/helloworld.Greeter/SayHello"));
        assert!(is_valid_method("/pkg.v1.Service/*"));
        assert!(!is_valid_method("get"));
        assert!(!is_valid_method("/Greeter/SayHello"));
        assert!(!is_valid_method("/helloworld.Greeter/"));

        let set = run(vec![policy(to_operation(Operation {
            methods: vec!["GET".to_string(), "FETCH".to_string()],
            ..Default::default()
        }))]);
        assert_eq!(
            findings(&set),
            vec![pair("KIA0102", "spec/rules[0]/to[0]/operation/methods[1]")]
        );
    }

    // =========================================================================
    // mTLS
    // =========================================================================

    fn identity_rule() -> Rule {
        Rule {
            from: vec![RuleFrom {
                source: Source {
                    namespaces: vec!["bookinfo".to_string()],
                    ..Default::default()
                },
            }],
            when: vec![Condition {
                key: "source.principal".to_string(),
                values: vec!["*".to_string()],
                not_values: Vec::new(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn auto_mtls_satisfies_identity_rules() {
        assert!(run(vec![policy(identity_rule())]).is_empty());
    }

    #[test]
    fn identity_rules_without_mtls() {
        let config = ValidationConfig {
            auto_mtls_enabled: false,
            ..Default::default()
        };
        let set = run_with(&snapshot(vec![policy(identity_rule())]), &config);
        assert_eq!(
            findings(&set),
            vec![
                pair("KIA0105", "spec/rules[0]/from[0]/source/namespaces"),
                pair("KIA0105", "spec/rules[0]/when[0]"),
            ]
        );
    }

    #[test]
    fn identity_rules_with_namespace_mtls() {
        let mut snap = snapshot(vec![policy(identity_rule())]);
        snap.peer_authentications = vec![PeerAuthentication::new(
            ObjectMeta::new("default", "bookinfo").with_cluster("east"),
            PeerAuthenticationSpec {
                mtls: Some(PeerMtls {
                    mode: PolicyMode::Strict,
                }),
                ..Default::default()
            },
        )];
        snap.destination_rules = vec![DestinationRule::new(
            ObjectMeta::new("default", "bookinfo").with_cluster("east"),
            DestinationRuleSpec {
                host: "*.bookinfo.svc.cluster.local".to_string(),
                traffic_policy: Some(TrafficPolicy {
                    tls: Some(ClientTlsSettings {
                        mode: PolicyMode::IstioMutual,
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )];
        let config = ValidationConfig {
            auto_mtls_enabled: false,
            ..Default::default()
        };
        assert!(run_with(&snap, &config).is_empty());
    }
}
