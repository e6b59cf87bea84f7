//! Validation run configuration
//!
//! Everything that used to be ambient mesh knowledge (root namespace, cluster
//! domain, auto-mTLS) is carried explicitly in [`ValidationConfig`] and handed
//! to every checker.

use serde::{Deserialize, Serialize};

use crate::mesh;
use crate::{Error, Result};

/// Settings for one validation run
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationConfig {
    /// Cluster identity stamped on objects that do not carry one
    pub cluster: String,
    /// Namespace whose policies apply mesh-wide
    pub root_namespace: String,
    /// DNS suffix that follows `svc` in fully-qualified service names
    pub cluster_domain: String,
    /// SPIFFE trust domain used to build service-account principals
    pub trust_domain: String,
    /// Whether sidecars pick mTLS automatically when no DestinationRule says otherwise
    pub auto_mtls_enabled: bool,
    /// Whether PERMISSIVE peer authentication counts as mTLS enabled
    pub allow_permissive: bool,
    /// Skip wildcard-vs-wildcard hostname comparisons between gateways
    pub skip_wildcard_gateway_hosts: bool,
    /// Gateways only select workloads in their own namespace
    pub gateway_to_namespace: bool,
    /// Check codes (e.g. "KIA1104") removed from the output
    pub ignored_checks: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            cluster: mesh::DEFAULT_CLUSTER.to_string(),
            root_namespace: mesh::DEFAULT_ROOT_NAMESPACE.to_string(),
            cluster_domain: mesh::DEFAULT_CLUSTER_DOMAIN.to_string(),
            trust_domain: mesh::trust_domain::DEFAULT.to_string(),
            auto_mtls_enabled: true,
            allow_permissive: false,
            skip_wildcard_gateway_hosts: false,
            gateway_to_namespace: false,
            ignored_checks: Vec::new(),
        }
    }
}

impl ValidationConfig {
    /// Load a config from YAML, filling unspecified fields with defaults.
    pub fn from_yaml(input: &str) -> Result<Self> {
        let config: Self = crate::yaml::from_yaml_str(input).map_err(|e| match e {
            Error::Serialization { message, .. } => Error::config(message),
            other => other,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs that would make host resolution meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.root_namespace.trim().is_empty() {
            return Err(Error::config_for_field("rootNamespace", "must not be empty"));
        }
        if self.cluster_domain.trim().is_empty() {
            return Err(Error::config_for_field("clusterDomain", "must not be empty"));
        }
        if self.cluster_domain.starts_with('.') || self.cluster_domain.ends_with('.') {
            return Err(Error::config_for_field(
                "clusterDomain",
                format!("'{}' must not start or end with '.'", self.cluster_domain),
            ));
        }
        if self.trust_domain.trim().is_empty() {
            return Err(Error::config_for_field("trustDomain", "must not be empty"));
        }
        if let Some(code) = self.ignored_checks.iter().find(|c| c.trim().is_empty()) {
            return Err(Error::config_for_field(
                "ignoredChecks",
                format!("invalid check code '{code}'"),
            ));
        }
        Ok(())
    }

    /// Whether findings with this code are stripped from the output
    pub fn is_ignored(&self, code: &str) -> bool {
        self.ignored_checks.iter().any(|c| c == code)
    }

    /// Principal for a service account under this config's trust domain
    pub fn principal(&self, namespace: &str, service_account: &str) -> String {
        mesh::trust_domain::principal(&self.trust_domain, namespace, service_account)
    }
}
