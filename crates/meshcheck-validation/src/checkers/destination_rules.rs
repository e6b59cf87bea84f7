//! DestinationRule validations

use meshcheck_common::crd::{labels_match, DestinationRule, PolicyMode};
use meshcheck_common::{mesh, Check, HostParser, Validation, ValidationKey, ValidationSet};
use meshcheck_mtls::MtlsContext;

use crate::checker::{check_export_to, keep, CheckContext, ObjectChecker};
use crate::conflict::DestinationConflicts;

const HOST_PATH: &str = "spec/host";
const TLS_MODE_PATH: &str = "spec/trafficPolicy/tls/mode";

/// Host, subset, exportTo and mTLS checks plus host+subset conflicts
#[derive(Clone, Copy, Debug, Default)]
pub struct DestinationRuleChecker;

impl ObjectChecker for DestinationRuleChecker {
    fn name(&self) -> &'static str {
        "destination-rules"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> ValidationSet {
        let mut validations = DestinationConflicts.check(ctx);
        let hosts = ctx.hosts();
        let mtls = ctx.mtls();

        for dr in &ctx.snapshot.destination_rules {
            let mut validation = Validation::new(ValidationKey::of(dr));
            check_host(ctx, &hosts, dr, &mut validation);
            check_subsets(ctx, &hosts, dr, &mut validation);
            check_export_to(ctx, &dr.spec.export_to, &mut validation);
            check_mtls(&mtls, dr, &mut validation);
            keep(&mut validations, validation);
        }

        validations
    }
}

fn check_host(
    ctx: &CheckContext<'_>,
    hosts: &HostParser<'_>,
    dr: &DestinationRule,
    validation: &mut Validation,
) {
    let raw = dr.spec.host.as_str();
    if mesh::is_mesh_wide_host(raw, &ctx.config.cluster_domain) {
        return;
    }
    let host = hosts.parse(raw, &dr.metadata.namespace, &dr.metadata.cluster);
    if !host.is_valid() {
        validation.add_check(Check::DestinationRuleHostNotFound, HOST_PATH);
        return;
    }
    if host.is_mesh_wildcard() {
        return;
    }
    if !host.is_external() && !hosts.is_known_namespace(&host.namespace) {
        validation.add_check(Check::UnableCrossNamespace, HOST_PATH);
        return;
    }
    if !ctx.snapshot.host_in_registry(&host, raw) {
        validation.add_check(Check::DestinationRuleHostNotFound, HOST_PATH);
    }
}

/// Each subset needs labels, and those labels need a workload behind the
/// host's service. Hosts that are not plain services are not checked.
fn check_subsets(
    ctx: &CheckContext<'_>,
    hosts: &HostParser<'_>,
    dr: &DestinationRule,
    validation: &mut Validation,
) {
    let host = hosts.parse(&dr.spec.host, &dr.metadata.namespace, &dr.metadata.cluster);
    let service = if host.is_wildcard {
        None
    } else {
        ctx.snapshot.service_for_host(&host)
    };

    for (i, subset) in dr.spec.subsets.iter().enumerate() {
        let path = format!("spec/subsets[{i}]");
        if subset.labels.is_empty() {
            validation.add_check(Check::DestinationRuleSubsetNoLabels, path);
            continue;
        }
        let Some(service) = service else {
            continue;
        };
        let backed = ctx
            .snapshot
            .workloads_in(&host.namespace)
            .any(|w| service.selects(w) && labels_match(&subset.labels, &w.labels));
        if !backed {
            validation.add_check(Check::DestinationRuleSubsetLabels, path);
        }
    }
}

fn accepts_mtls(mode: PolicyMode) -> bool {
    matches!(mode, PolicyMode::Strict | PolicyMode::Permissive)
}

/// Namespace- and mesh-wide rules must agree with the PeerAuthentications
/// at the same scope.
fn check_mtls(mtls: &MtlsContext<'_>, dr: &DestinationRule, validation: &mut Validation) {
    let mode = dr.tls_mode();
    if !mode.is_set() {
        return;
    }
    let namespace = dr.metadata.namespace.as_str();
    let mesh_pa = mtls.mesh_pa_mode();

    if mtls.is_mesh_wide(dr) {
        if mode == PolicyMode::Disable && mesh_pa == PolicyMode::Strict {
            validation.add_check(Check::DestinationRuleMeshPolicyMtlsEnabled, TLS_MODE_PATH);
        } else if mode.originates_mtls() && !accepts_mtls(mesh_pa) {
            validation.add_check(Check::DestinationRuleMeshPolicyMissing, TLS_MODE_PATH);
        }
        return;
    }

    if !mtls.is_namespace_wide(dr, namespace) {
        return;
    }
    let namespace_pa = mtls.namespace_pa_mode(namespace);
    if mode == PolicyMode::Disable {
        if namespace_pa == PolicyMode::Strict {
            validation.add_check(Check::DestinationRulePolicyMtlsEnabled, TLS_MODE_PATH);
        } else if !namespace_pa.is_set() && mesh_pa == PolicyMode::Strict {
            validation.add_check(Check::DestinationRuleMeshPolicyMtlsEnabled, TLS_MODE_PATH);
        }
    } else if mode.originates_mtls() && !accepts_mtls(namespace_pa) && !accepts_mtls(mesh_pa) {
        validation.add_check(Check::DestinationRuleNamespacePolicyMissing, TLS_MODE_PATH);
    }
}
