//! The checker seam: every rule family implements [`ObjectChecker`]

use std::collections::BTreeMap;

use meshcheck_common::crd::{effective_selector, labels_match, WorkloadSelector};
use meshcheck_common::{
    Check, HostParser, Snapshot, Validation, ValidationConfig, ValidationKey, ValidationSet,
};
use meshcheck_mtls::MtlsContext;

/// Read-only inputs shared by every checker in a run
#[derive(Clone, Copy, Debug)]
pub struct CheckContext<'a> {
    /// Objects under validation
    pub snapshot: &'a Snapshot,
    /// Run configuration
    pub config: &'a ValidationConfig,
}

impl<'a> CheckContext<'a> {
    /// Create a context
    pub fn new(snapshot: &'a Snapshot, config: &'a ValidationConfig) -> Self {
        Self { snapshot, config }
    }

    /// Host parser for this snapshot's namespaces and cluster domain
    pub fn hosts(&self) -> HostParser<'a> {
        self.snapshot.host_parser(&self.config.cluster_domain)
    }

    /// mTLS view of this snapshot
    pub fn mtls(&self) -> MtlsContext<'a> {
        MtlsContext::new(self.snapshot, self.config)
    }

    /// Whether some workload carries every label of `selector`.
    ///
    /// `namespace` narrows the search; `None` searches the whole snapshot.
    pub fn selector_has_workload(
        &self,
        namespace: Option<&str>,
        selector: &BTreeMap<String, String>,
    ) -> bool {
        self.snapshot
            .workloads
            .iter()
            .filter(|w| namespace.map_or(true, |ns| w.namespace == ns))
            .any(|w| labels_match(selector, &w.labels))
    }
}

/// A family of rules producing validations for a snapshot.
///
/// Implementations are pure: they read the context and return a fresh set,
/// which the engine merges with every other checker's output.
pub trait ObjectChecker: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Run the rules
    fn check(&self, ctx: &CheckContext<'_>) -> ValidationSet;
}

// =============================================================================
// Shared leaf checks
// =============================================================================

/// Warn when a workload selector matches nothing in the object's namespace.
///
/// Missing or empty selectors are namespace-wide and never reported.
pub fn check_workload_selector(
    ctx: &CheckContext<'_>,
    namespace: &str,
    selector: Option<&WorkloadSelector>,
    path: &str,
    validation: &mut Validation,
) {
    if let Some(labels) = effective_selector(selector) {
        if !ctx.selector_has_workload(Some(namespace), labels) {
            validation.add_check(Check::SelectorWorkloadNotFound, path);
        }
    }
}

/// Report `exportTo` entries naming unknown namespaces.
///
/// `.`, `*` and `~` are always valid.
pub fn check_export_to(ctx: &CheckContext<'_>, export_to: &[String], validation: &mut Validation) {
    for (i, ns) in export_to.iter().enumerate() {
        if matches!(ns.as_str(), "." | "*" | "~") {
            continue;
        }
        if !ctx.snapshot.has_namespace(ns) {
            validation.add_check(Check::ExportToNamespaceNotFound, format!("spec/exportTo[{i}]"));
        }
    }
}

/// Insert a per-object validation only if it has something to say
pub(crate) fn keep(set: &mut ValidationSet, validation: Validation) {
    if !validation.is_empty() {
        set.insert(validation);
    }
}

/// Report `check` on every key and reference each key from all the others
pub(crate) fn report_group(
    set: &mut ValidationSet,
    keys: &[ValidationKey],
    check: Check,
    path: &str,
) {
    for (i, key) in keys.iter().enumerate() {
        set.report(key, check, path);
        for other in &keys[i + 1..] {
            set.link(key, other);
        }
    }
}

#[cfg(test)]
mod tests {
    use meshcheck_common::crd::{ObjectKind, Workload};

    use super::*;

    fn key(name: &str) -> ValidationKey {
        ValidationKey::new(ObjectKind::Sidecar, "bookinfo", name, "east")
    }

    #[test]
    fn group_report_links_everyone() {
        let mut set = ValidationSet::new();
        let keys = vec![key("a"), key("b"), key("c")];
        report_group(&mut set, &keys, Check::MultiMatchSelectorless, "spec/workloadSelector");

        for k in &keys {
            let v = set.get(k).unwrap();
            assert!(!v.valid);
            assert_eq!(v.references.len(), 2, "{k} should reference the other two");
        }
    }

    #[test]
    fn selector_lookup_respects_namespace() {
        let mut snapshot = Snapshot::new("east");
        snapshot
            .workloads
            .push(Workload::new("reviews-v1", "bookinfo", [("app", "reviews")]));
        let config = ValidationConfig::default();
        let ctx = CheckContext::new(&snapshot, &config);
        let selector: BTreeMap<String, String> =
            [("app".to_string(), "reviews".to_string())].into();

        assert!(ctx.selector_has_workload(Some("bookinfo"), &selector));
        assert!(!ctx.selector_has_workload(Some("other"), &selector));
        assert!(ctx.selector_has_workload(None, &selector));
    }

    #[test]
    fn export_to_accepts_sentinels() {
        let mut snapshot = Snapshot::new("east");
        snapshot.namespaces.insert("bookinfo".to_string());
        let config = ValidationConfig::default();
        let ctx = CheckContext::new(&snapshot, &config);
        let mut v = Validation::new(key("a"));
        check_export_to(
            &ctx,
            &[".".into(), "*".into(), "bookinfo".into(), "missing".into()],
            &mut v,
        );
        assert_eq!(v.checks.len(), 1);
        assert_eq!(v.checks[0].path, "spec/exportTo[3]");
    }
}
