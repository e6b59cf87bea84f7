//! Gateway validations

use meshcheck_common::{Check, Validation, ValidationKey, ValidationSet};

use crate::checker::{keep, CheckContext, ObjectChecker};
use crate::conflict::ListenerConflicts;

/// Selector check plus listener conflicts
#[derive(Clone, Copy, Debug, Default)]
pub struct GatewayChecker;

impl ObjectChecker for GatewayChecker {
    fn name(&self) -> &'static str {
        "gateways"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> ValidationSet {
        let mut validations = ListenerConflicts.check(ctx);

        for gateway in &ctx.snapshot.gateways {
            let mut validation = Validation::new(ValidationKey::of(gateway));
            let selector = &gateway.spec.selector;
            let scope = ctx
                .config
                .gateway_to_namespace
                .then_some(gateway.metadata.namespace.as_str());
            if !selector.is_empty() && !ctx.selector_has_workload(scope, selector) {
                validation.add_check(Check::GatewaySelectorNotFound, "spec/selector");
            }
            keep(&mut validations, validation);
        }

        validations
    }
}
