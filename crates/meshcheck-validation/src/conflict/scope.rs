//! Workload-scoped objects that overlap inside a namespace
//!
//! A namespace may hold one selector-less object of a kind, and each workload
//! may be selected by at most one object of that kind. Sidecars and
//! PeerAuthentications share these rules.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use meshcheck_common::crd::{
    effective_selector, labels_match, MeshObject, PeerAuthentication, Sidecar, WorkloadSelector,
};
use meshcheck_common::{Check, Snapshot, ValidationKey, ValidationSet};

use crate::checker::{report_group, CheckContext, ObjectChecker};

/// An object kind that applies to workloads through an optional selector
pub trait Scoped: MeshObject + Sized + 'static {
    /// Path findings are reported at
    const SELECTOR_PATH: &'static str;

    /// The selector, if any
    fn selector(&self) -> Option<&WorkloadSelector>;

    /// Every object of this kind in a snapshot
    fn collection(snapshot: &Snapshot) -> &[Self];
}

impl Scoped for Sidecar {
    const SELECTOR_PATH: &'static str = "spec/workloadSelector";

    fn selector(&self) -> Option<&WorkloadSelector> {
        self.spec.workload_selector.as_ref()
    }

    fn collection(snapshot: &Snapshot) -> &[Self] {
        &snapshot.sidecars
    }
}

impl Scoped for PeerAuthentication {
    const SELECTOR_PATH: &'static str = "spec/selector";

    fn selector(&self) -> Option<&WorkloadSelector> {
        self.spec.selector.as_ref()
    }

    fn collection(snapshot: &Snapshot) -> &[Self] {
        &snapshot.peer_authentications
    }
}

/// Selector overlap detector for one [`Scoped`] kind
pub struct ScopeConflicts<T>(PhantomData<fn() -> T>);

impl<T> ScopeConflicts<T> {
    /// Create a detector
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for ScopeConflicts<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct NamespaceScope<'a, T> {
    selectorless: Vec<ValidationKey>,
    selected: Vec<(&'a BTreeMap<String, String>, ValidationKey)>,
    _kind: PhantomData<fn() -> T>,
}

impl<T: Scoped> ObjectChecker for ScopeConflicts<T> {
    fn name(&self) -> &'static str {
        "scope-conflicts"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> ValidationSet {
        let mut validations = ValidationSet::new();
        let mut namespaces: BTreeMap<&str, NamespaceScope<'_, T>> = BTreeMap::new();

        for object in T::collection(ctx.snapshot) {
            let scope = namespaces
                .entry(object.metadata().namespace.as_str())
                .or_insert_with(|| NamespaceScope {
                    selectorless: Vec::new(),
                    selected: Vec::new(),
                    _kind: PhantomData,
                });
            let key = ValidationKey::of(object);
            match effective_selector(object.selector()) {
                Some(labels) => scope.selected.push((labels, key)),
                None => scope.selectorless.push(key),
            }
        }

        for (namespace, scope) in &namespaces {
            if scope.selectorless.len() > 1 {
                report_group(
                    &mut validations,
                    &scope.selectorless,
                    Check::MultiMatchSelectorless,
                    T::SELECTOR_PATH,
                );
            }

            for workload in ctx.snapshot.workloads_in(namespace) {
                let matching: Vec<ValidationKey> = scope
                    .selected
                    .iter()
                    .filter(|(labels, _)| labels_match(labels, &workload.labels))
                    .map(|(_, key)| key.clone())
                    .collect();
                if matching.len() > 1 {
                    report_group(
                        &mut validations,
                        &matching,
                        Check::MultiMatchSelector,
                        T::SELECTOR_PATH,
                    );
                }
            }
        }

        validations
    }
}
