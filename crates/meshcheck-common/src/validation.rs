//! Validation results and their merge semantics
//!
//! A run produces one [`ValidationSet`]: a map from [`ValidationKey`] to the
//! [`Validation`] collected for that object. Every checker builds its own set
//! and the engine merges them, so merging is the only way results combine:
//! findings and references are unioned, validity is AND-ed.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use serde::ser::{Error as _, SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::check::{Check, Severity};
use crate::crd::{MeshObject, ObjectKind};
use crate::Result;

// =============================================================================
// Keys
// =============================================================================

/// Identity of a validated object
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationKey {
    /// Object kind
    pub object_kind: ObjectKind,
    /// Namespace
    pub namespace: String,
    /// Name
    pub name: String,
    /// Cluster
    pub cluster: String,
}

impl ValidationKey {
    /// Create a key
    pub fn new(
        object_kind: ObjectKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
        cluster: impl Into<String>,
    ) -> Self {
        Self {
            object_kind,
            namespace: namespace.into(),
            name: name.into(),
            cluster: cluster.into(),
        }
    }

    /// Key of a typed mesh object
    pub fn of<T: MeshObject>(object: &T) -> Self {
        let meta = object.metadata();
        Self::new(
            T::OBJECT_KIND,
            meta.namespace.as_str(),
            meta.name.as_str(),
            meta.cluster.as_str(),
        )
    }
}

/// Renders `kind/namespace/name`; the cluster is not part of the output key.
impl fmt::Display for ValidationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.object_kind, self.namespace, self.name)
    }
}

// =============================================================================
// Findings
// =============================================================================

/// One reported problem, anchored at a path inside the object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Check code, e.g. `KIA0201`
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Severity
    pub severity: Severity,
    /// Path inside the object, e.g. `spec/host`
    pub path: String,
}

impl Finding {
    /// Finding for a catalog check at `path`
    pub fn new(check: Check, path: impl Into<String>) -> Self {
        Self {
            code: check.code().to_string(),
            message: check.message().to_string(),
            severity: check.severity(),
            path: path.into(),
        }
    }

    fn same_as(&self, other: &Finding) -> bool {
        self.path == other.path && self.severity == other.severity && self.message == other.message
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Everything reported about one object
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Validation {
    /// Object identity
    #[serde(skip)]
    pub key: ValidationKey,
    /// False once any error-severity finding is attached
    pub valid: bool,
    /// Findings
    pub checks: Vec<Finding>,
    /// Objects involved in the same problem
    pub references: Vec<ValidationKey>,
}

impl Validation {
    /// An empty, valid validation
    pub fn new(key: ValidationKey) -> Self {
        Self {
            key,
            valid: true,
            checks: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Attach a finding unless an identical one is already present
    pub fn add_finding(&mut self, finding: Finding) {
        if finding.severity == Severity::Error {
            self.valid = false;
        }
        if !self.checks.iter().any(|f| f.same_as(&finding)) {
            self.checks.push(finding);
        }
    }

    /// Attach a catalog check at `path`
    pub fn add_check(&mut self, check: Check, path: impl Into<String>) {
        self.add_finding(Finding::new(check, path));
    }

    /// Link another object; self-references and duplicates are ignored
    pub fn add_reference(&mut self, key: &ValidationKey) {
        if *key != self.key && !self.references.contains(key) {
            self.references.push(key.clone());
        }
    }

    /// Union another validation of the same object into this one
    pub fn merge(&mut self, other: Validation) {
        self.valid &= other.valid;
        for finding in other.checks {
            self.add_finding(finding);
        }
        for reference in &other.references {
            self.add_reference(reference);
        }
    }

    /// Whether any finding has the given severity
    pub fn has_severity(&self, severity: Severity) -> bool {
        self.checks.iter().any(|f| f.severity == severity)
    }

    /// Whether there is nothing to report
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty() && self.references.is_empty()
    }
}

// =============================================================================
// ValidationSet
// =============================================================================

/// Totals for a set of validations
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    /// Error findings
    pub errors: usize,
    /// Warning findings
    pub warnings: usize,
    /// Objects with at least one finding or reference
    pub object_count: usize,
}

/// Results of a validation run keyed by object
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationSet {
    entries: BTreeMap<ValidationKey, Validation>,
}

impl ValidationSet {
    /// An empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Validation for `key`, created valid and empty if absent
    pub fn entry(&mut self, key: &ValidationKey) -> &mut Validation {
        self.entries
            .entry(key.clone())
            .or_insert_with(|| Validation::new(key.clone()))
    }

    /// Record a catalog check against `key`
    pub fn report(&mut self, key: &ValidationKey, check: Check, path: impl Into<String>) {
        self.entry(key).add_check(check, path);
    }

    /// Reference `a` and `b` from each other
    pub fn link(&mut self, a: &ValidationKey, b: &ValidationKey) {
        if a == b {
            return;
        }
        self.entry(a).add_reference(b);
        self.entry(b).add_reference(a);
    }

    /// Merge a single validation in
    pub fn insert(&mut self, validation: Validation) {
        match self.entries.entry(validation.key.clone()) {
            btree_map::Entry::Occupied(mut e) => e.get_mut().merge(validation),
            btree_map::Entry::Vacant(e) => {
                e.insert(validation);
            }
        }
    }

    /// Merge another set in
    pub fn merge(&mut self, other: ValidationSet) {
        for validation in other.entries.into_values() {
            self.insert(validation);
        }
    }

    /// Validation for `key`
    pub fn get(&self, key: &ValidationKey) -> Option<&Validation> {
        self.entries.get(key)
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no object has anything reported
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in key order
    pub fn iter(&self) -> impl Iterator<Item = (&ValidationKey, &Validation)> {
        self.entries.iter()
    }

    /// Drop entries that carry neither findings nor references
    pub fn prune_empty(&mut self) {
        self.entries.retain(|_, v| !v.is_empty());
    }

    /// Only the objects declared in `namespace`
    pub fn for_namespace(&self, namespace: &str) -> ValidationSet {
        ValidationSet {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| k.namespace == namespace)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Remove findings whose code is listed, then re-derive validity.
    ///
    /// Objects left with nothing to report are dropped.
    pub fn strip_checks(&mut self, codes: &[String]) {
        if codes.is_empty() {
            return;
        }
        for validation in self.entries.values_mut() {
            validation.checks.retain(|f| !codes.contains(&f.code));
            validation.valid = !validation.has_severity(Severity::Error);
        }
        self.entries
            .retain(|_, v| !v.checks.is_empty() || !v.references.is_empty());
    }

    /// Count errors and warnings, optionally within one namespace and/or cluster
    pub fn summarize(&self, namespace: Option<&str>, cluster: Option<&str>) -> ValidationSummary {
        let mut summary = ValidationSummary::default();
        for (key, validation) in &self.entries {
            if namespace.is_some_and(|ns| ns != key.namespace)
                || cluster.is_some_and(|c| c != key.cluster)
            {
                continue;
            }
            summary.object_count += 1;
            for finding in &validation.checks {
                match finding.severity {
                    Severity::Error => summary.errors += 1,
                    Severity::Warning => summary.warnings += 1,
                    Severity::Unknown => {}
                }
            }
        }
        summary
    }

    /// Render as pretty JSON keyed by `kind/namespace/name`
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Output keys omit the cluster, so a set holding the same object from two
/// clusters fails to serialize instead of emitting duplicate keys.
impl Serialize for ValidationSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        // keys order by cluster last, so colliding entries are adjacent
        let mut previous: Option<String> = None;
        for (key, validation) in &self.entries {
            let rendered = key.to_string();
            if previous.as_deref() == Some(rendered.as_str()) {
                return Err(S::Error::custom(format!(
                    "output key {rendered} is shared by objects in more than one cluster"
                )));
            }
            map.serialize_entry(&rendered, validation)?;
            previous = Some(rendered);
        }
        map.end()
    }
}

impl FromIterator<Validation> for ValidationSet {
    fn from_iter<I: IntoIterator<Item = Validation>>(iter: I) -> Self {
        let mut set = ValidationSet::new();
        for validation in iter {
            set.insert(validation);
        }
        set
    }
}

impl IntoIterator for ValidationSet {
    type Item = (ValidationKey, Validation);
    type IntoIter = btree_map::IntoIter<ValidationKey, Validation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
