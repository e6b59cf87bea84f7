//! Sidecar validations

use meshcheck_common::crd::{effective_selector, Sidecar};
use meshcheck_common::{mesh, Check, Validation, ValidationKey, ValidationSet};

use crate::checker::{check_workload_selector, keep, CheckContext, ObjectChecker};
use crate::conflict::ScopeConflicts;

const SELECTOR_PATH: &str = "spec/workloadSelector";

/// Selector and egress checks plus selector overlap
#[derive(Clone, Copy, Debug, Default)]
pub struct SidecarChecker;

impl ObjectChecker for SidecarChecker {
    fn name(&self) -> &'static str {
        "sidecars"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> ValidationSet {
        let mut validations = ScopeConflicts::<Sidecar>::new().check(ctx);

        for sidecar in &ctx.snapshot.sidecars {
            let mut validation = Validation::new(ValidationKey::of(sidecar));
            let selector = sidecar.spec.workload_selector.as_ref();
            let namespace = sidecar.metadata.namespace.as_str();

            check_workload_selector(ctx, namespace, selector, SELECTOR_PATH, &mut validation);
            if namespace == ctx.config.root_namespace && effective_selector(selector).is_some() {
                validation.add_check(Check::SidecarGlobalSelector, SELECTOR_PATH);
            }
            check_egress(ctx, sidecar, &mut validation);
            keep(&mut validations, validation);
        }

        validations
    }
}

/// Egress hosts are `namespace/dnsName`; only concrete names in concrete
/// namespaces can be looked up.
fn check_egress(ctx: &CheckContext<'_>, sidecar: &Sidecar, validation: &mut Validation) {
    let hosts = ctx.hosts();
    let meta = &sidecar.metadata;

    for (i, listener) in sidecar.spec.egress.iter().enumerate() {
        for (j, raw) in listener.hosts.iter().enumerate() {
            let Some((namespace, dns)) = raw.split_once('/') else {
                continue;
            };
            let namespace = match namespace {
                mesh::EGRESS_ANY_NAMESPACE | mesh::EGRESS_NO_NAMESPACE => continue,
                mesh::EGRESS_OWN_NAMESPACE => meta.namespace.as_str(),
                ns => ns,
            };
            if dns.starts_with('*') {
                continue;
            }
            let host = hosts.parse(dns, namespace, &meta.cluster);
            if !ctx.snapshot.host_in_registry(&host, dns) {
                validation.add_check(
                    Check::SidecarEgressServiceNotFound,
                    format!("spec/egress[{i}]/hosts[{j}]"),
                );
            }
        }
    }
}
