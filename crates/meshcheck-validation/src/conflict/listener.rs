//! Gateways competing for the same hostname on the same port
//!
//! Gateways only compete when they configure the same proxies, i.e. when
//! their selectors are identical. Within such a scope every listener host is
//! compared against every listener host already seen on the same port.

use std::collections::BTreeMap;

use meshcheck_common::crd::Gateway;
use meshcheck_common::{Check, ValidationKey, ValidationSet};

use crate::checker::{CheckContext, ObjectChecker};

/// Host+port conflict detector for Gateways
#[derive(Clone, Copy, Debug, Default)]
pub struct ListenerConflicts;

struct Listener<'a> {
    key: ValidationKey,
    path: String,
    port: u32,
    hostname: &'a str,
}

impl ObjectChecker for ListenerConflicts {
    fn name(&self) -> &'static str {
        "listener-conflicts"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> ValidationSet {
        let skip_wildcards = ctx.config.skip_wildcard_gateway_hosts;
        let mut validations = ValidationSet::new();
        let mut scopes: BTreeMap<String, Vec<Listener<'_>>> = BTreeMap::new();

        for gateway in &ctx.snapshot.gateways {
            let key = ValidationKey::of(gateway);
            let listeners = scopes
                .entry(selector_scope(gateway, ctx.config.gateway_to_namespace))
                .or_default();
            let mut own = Vec::new();

            for (i, server) in gateway.spec.servers.iter().enumerate() {
                let Some(port) = &server.port else {
                    continue;
                };
                for (k, raw) in server.hosts.iter().enumerate() {
                    let hostname = strip_namespace(raw);
                    let path = format!("spec/servers[{i}]/hosts[{k}]");

                    for prior in listeners.iter() {
                        if prior.key == key || prior.port != port.number {
                            continue;
                        }
                        if hosts_overlap(prior.hostname, hostname, skip_wildcards) {
                            validations.report(&key, Check::GatewayMultiMatch, path.as_str());
                            validations.report(&prior.key, Check::GatewayMultiMatch, prior.path.as_str());
                            validations.link(&key, &prior.key);
                        }
                    }

                    own.push(Listener {
                        key: key.clone(),
                        path,
                        port: port.number,
                        hostname,
                    });
                }
            }
            listeners.extend(own);
        }

        validations
    }
}

/// Scope key: sorted selector labels, prefixed by namespace when gateways
/// only bind their own namespace's workloads
fn selector_scope(gateway: &Gateway, per_namespace: bool) -> String {
    let labels = gateway
        .spec
        .selector
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    if per_namespace {
        format!("{}/{}", gateway.metadata.namespace, labels)
    } else {
        labels
    }
}

/// Drop a `namespace/` or `./` prefix
fn strip_namespace(host: &str) -> &str {
    host.split_once('/').map_or(host, |(_, h)| h)
}

/// Whether two listener hostnames can match the same request
pub fn hosts_overlap(a: &str, b: &str, skip_wildcards: bool) -> bool {
    if skip_wildcards && a.starts_with('*') && b.starts_with('*') {
        return false;
    }
    hostname_matches(a, b) || hostname_matches(b, a)
}

/// Whether `pattern` matches `hostname`.
///
/// `*` matches everything, `*.suffix` matches exactly one extra leading
/// label, anything else matches itself. When `hostname` is itself a wildcard
/// nested under `pattern` the match is reported, erring towards a conflict.
pub fn hostname_matches(pattern: &str, hostname: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let Some(suffix) = pattern.strip_prefix('*') else {
        return pattern == hostname;
    };
    match hostname.strip_suffix(suffix) {
        Some(label) if !label.is_empty() && !label.contains('.') => true,
        _ => hostname
            .strip_prefix('*')
            .is_some_and(|rest| rest.ends_with(suffix)),
    }
}
