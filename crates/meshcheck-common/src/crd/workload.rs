//! Core Kubernetes objects the checks consult: namespaces, services, workloads

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{labels_match, HasApiResource, ObjectMeta};

/// Kubernetes Namespace (metadata only)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Namespace {
    /// Metadata
    pub metadata: ObjectMeta,
}

impl HasApiResource for Namespace {
    const API_VERSION: &'static str = "v1";
    const KIND: &'static str = "Namespace";
}

/// Kubernetes Service
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Service {
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    #[serde(default)]
    pub spec: ServiceSpec,
}

impl HasApiResource for Service {
    const API_VERSION: &'static str = "v1";
    const KIND: &'static str = "Service";
}

impl Service {
    /// Create a service selecting pods by `selector`
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        selector: BTreeMap<String, String>,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(name, namespace),
            spec: ServiceSpec {
                selector,
                ports: Vec::new(),
            },
        }
    }

    /// Whether this service fronts the given workload
    pub fn selects(&self, workload: &Workload) -> bool {
        workload.namespace == self.metadata.namespace
            && labels_match(&self.spec.selector, &workload.labels)
    }
}

/// Service spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceSpec {
    /// Pod selector
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    /// Exposed ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ServicePort>,
}

/// Service port
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ServicePort {
    /// Port name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Port number
    #[serde(default)]
    pub port: u32,
}

/// apps/v1 Deployment, decoded only as far as its pod template
#[derive(Clone, Debug, Deserialize)]
pub struct Deployment {
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    #[serde(default)]
    pub spec: DeploymentSpec,
}

/// Deployment spec
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DeploymentSpec {
    /// Pod template
    #[serde(default)]
    pub template: PodTemplate,
}

/// Pod template
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PodTemplate {
    /// Template metadata (only labels are used)
    #[serde(default)]
    pub metadata: PodTemplateMeta,
    /// Template spec
    #[serde(default)]
    pub spec: PodSpec,
}

/// Pod template metadata
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PodTemplateMeta {
    /// Pod labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Pod spec
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Service account the pods run as
    #[serde(default)]
    pub service_account_name: Option<String>,
}

/// A labelled group of pods, the unit selectors are matched against
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    /// Workload name
    pub name: String,
    /// Namespace
    pub namespace: String,
    /// Pod labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Service account; `default` when unspecified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
}

impl Workload {
    /// Create a workload with the given pod labels
    pub fn new<K, V>(
        name: impl Into<String>,
        namespace: impl Into<String>,
        labels: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            service_account: None,
        }
    }

    /// Set the service account
    pub fn with_service_account(mut self, sa: impl Into<String>) -> Self {
        self.service_account = Some(sa.into());
        self
    }

    /// Service account name, falling back to `default`
    pub fn service_account_name(&self) -> &str {
        self.service_account.as_deref().unwrap_or("default")
    }
}

impl From<Deployment> for Workload {
    fn from(d: Deployment) -> Self {
        Self {
            name: d.metadata.name,
            namespace: d.metadata.namespace,
            labels: d.spec.template.metadata.labels,
            service_account: d.spec.template.spec.service_account_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_becomes_workload() {
        let d: Deployment = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "reviews-v1", "namespace": "bookinfo"},
            "spec": {"template": {
                "metadata": {"labels": {"app": "reviews", "version": "v1"}},
                "spec": {"serviceAccountName": "bookinfo-reviews"}
            }}
        }))
        .unwrap();
        let w = Workload::from(d);
        assert_eq!(w.name, "reviews-v1");
        assert_eq!(w.labels["version"], "v1");
        assert_eq!(w.service_account_name(), "bookinfo-reviews");
    }

    #[test]
    fn service_selects_workloads_in_its_namespace() {
        let svc = Service::new(
            "reviews",
            "bookinfo",
            [("app".to_string(), "reviews".to_string())].into(),
        );
        let local = Workload::new("reviews-v1", "bookinfo", [("app", "reviews")]);
        let remote = Workload::new("reviews-v1", "other", [("app", "reviews")]);
        assert!(svc.selects(&local));
        assert!(!svc.selects(&remote));
        assert_eq!(local.service_account_name(), "default");
    }
}
