//! PeerAuthentication validations

use meshcheck_common::crd::{PeerAuthentication, PolicyMode};
use meshcheck_common::{Check, Validation, ValidationKey, ValidationSet};
use meshcheck_mtls::MtlsContext;

use crate::checker::{check_workload_selector, keep, CheckContext, ObjectChecker};
use crate::conflict::ScopeConflicts;

const MTLS_PATH: &str = "spec/mtls";

/// Selector and mTLS pairing checks plus selector overlap
#[derive(Clone, Copy, Debug, Default)]
pub struct PeerAuthenticationChecker;

impl ObjectChecker for PeerAuthenticationChecker {
    fn name(&self) -> &'static str {
        "peer-authentications"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> ValidationSet {
        let mut validations = ScopeConflicts::<PeerAuthentication>::new().check(ctx);
        let mtls = ctx.mtls();

        for pa in &ctx.snapshot.peer_authentications {
            let mut validation = Validation::new(ValidationKey::of(pa));
            check_workload_selector(
                ctx,
                &pa.metadata.namespace,
                pa.spec.selector.as_ref(),
                "spec/selector",
                &mut validation,
            );
            if !ctx.config.auto_mtls_enabled && pa.is_namespace_wide() {
                check_destination_rule_pairing(&mtls, pa, &mut validation);
            }
            keep(&mut validations, validation);
        }

        validations
    }
}

/// Without auto-mTLS, callers only follow a policy when a DestinationRule at
/// the same (or mesh) scope tells them to.
fn check_destination_rule_pairing(
    mtls: &MtlsContext<'_>,
    pa: &PeerAuthentication,
    validation: &mut Validation,
) {
    let namespace = pa.metadata.namespace.as_str();
    let mesh_dr = mtls.mesh_dr_mode();

    if namespace == mtls.root_namespace() {
        match pa.mode() {
            PolicyMode::Strict if !mesh_dr.originates_mtls() => validation.add_check(
                Check::MeshPeerAuthenticationDestinationRuleMissing,
                MTLS_PATH,
            ),
            PolicyMode::Disable if mesh_dr != PolicyMode::Disable => validation.add_check(
                Check::PeerAuthenticationDisableMeshDestinationRuleMissing,
                MTLS_PATH,
            ),
            _ => {}
        }
        return;
    }

    let namespace_dr = mtls.namespace_dr_mode(namespace);
    match pa.mode() {
        PolicyMode::Strict if !namespace_dr.originates_mtls() && !mesh_dr.originates_mtls() => {
            validation.add_check(Check::PeerAuthenticationDestinationRuleMissing, MTLS_PATH)
        }
        PolicyMode::Disable
            if namespace_dr != PolicyMode::Disable && mesh_dr != PolicyMode::Disable =>
        {
            validation.add_check(Check::PeerAuthenticationDisableDestinationRuleMissing, MTLS_PATH)
        }
        _ => {}
    }
}
