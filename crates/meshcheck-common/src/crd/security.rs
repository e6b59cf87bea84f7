//! security.istio.io types
//!
//! - PeerAuthentication: inbound mTLS mode at workload, namespace or mesh scope
//! - AuthorizationPolicy: identity and operation based access control

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{effective_selector, mesh_resource, ObjectMeta, PolicyMode, WorkloadSelector};

// =============================================================================
// PeerAuthentication
// =============================================================================

/// Istio PeerAuthentication for mTLS configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerAuthentication {
    /// API version
    #[serde(default = "PeerAuthentication::api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "PeerAuthentication::kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    #[serde(default)]
    pub spec: PeerAuthenticationSpec,
}

mesh_resource!(
    PeerAuthentication,
    PeerAuthenticationSpec,
    "security.istio.io/v1",
    PeerAuthentication
);

impl PeerAuthentication {
    /// Declared mTLS mode, `Unset` when the spec has no `mtls` block
    pub fn mode(&self) -> PolicyMode {
        self.spec.mtls.as_ref().map(|m| m.mode).unwrap_or_default()
    }

    /// Whether this policy applies to every workload in its namespace
    pub fn is_namespace_wide(&self) -> bool {
        effective_selector(self.spec.selector.as_ref()).is_none()
    }
}

/// PeerAuthentication spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerAuthenticationSpec {
    /// Workloads this policy applies to; namespace-wide when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<WorkloadSelector>,
    /// mTLS configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtls: Option<PeerMtls>,
    /// Per-port overrides keyed by port number
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub port_level_mtls: BTreeMap<String, PeerMtls>,
}

/// mTLS configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PeerMtls {
    /// mTLS mode: STRICT, PERMISSIVE, DISABLE, UNSET
    #[serde(default)]
    pub mode: PolicyMode,
}

// =============================================================================
// AuthorizationPolicy
// =============================================================================

/// Istio AuthorizationPolicy
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationPolicy {
    /// API version
    #[serde(default = "AuthorizationPolicy::api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "AuthorizationPolicy::kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    #[serde(default)]
    pub spec: AuthorizationPolicySpec,
}

mesh_resource!(
    AuthorizationPolicy,
    AuthorizationPolicySpec,
    "security.istio.io/v1",
    AuthorizationPolicy
);

/// AuthorizationPolicy spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationPolicySpec {
    /// Selector for workloads; namespace-wide when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<WorkloadSelector>,

    /// Action: ALLOW, DENY, AUDIT, CUSTOM
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,

    /// Rules defining who can access what
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
}

/// Authorization rule
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    /// Source conditions (who is calling)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from: Vec<RuleFrom>,
    /// Destination conditions (what operation)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<RuleTo>,
    /// Extra request conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when: Vec<Condition>,
}

/// Rule source wrapper
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleFrom {
    /// Source specification
    #[serde(default)]
    pub source: Source,
}

/// Caller identity
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// SPIFFE principals
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub principals: Vec<String>,
    /// Negated principals
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_principals: Vec<String>,
    /// Caller namespaces
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
    /// Negated caller namespaces
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_namespaces: Vec<String>,
    /// Caller IP blocks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_blocks: Vec<String>,
}

/// Rule operation wrapper
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleTo {
    /// Operation specification
    #[serde(default)]
    pub operation: Operation,
}

/// Operation (what's being accessed)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Request hosts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    /// Negated request hosts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_hosts: Vec<String>,
    /// Ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    /// HTTP methods or gRPC method names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    /// Request paths
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

/// `when` condition
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Attribute name (e.g. `source.principal`)
    pub key: String,
    /// Accepted values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    /// Rejected values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_values: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_authentication_mode_defaults_to_unset() {
        let pa = PeerAuthentication::new(
            ObjectMeta::new("default", "bookinfo"),
            PeerAuthenticationSpec::default(),
        );
        assert_eq!(pa.mode(), PolicyMode::Unset);
        assert!(pa.is_namespace_wide());
    }

    #[test]
    fn peer_authentication_with_empty_match_labels_is_namespace_wide() {
        let pa: PeerAuthentication = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "default", "namespace": "bookinfo"},
            "spec": {"selector": {"matchLabels": {}}, "mtls": {"mode": "STRICT"}}
        }))
        .unwrap();
        assert_eq!(pa.mode(), PolicyMode::Strict);
        assert!(pa.is_namespace_wide());
    }

    #[test]
    fn authorization_policy_decodes_rules() {
        let ap: AuthorizationPolicy = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "allow-reviews", "namespace": "bookinfo"},
            "spec": {
                "selector": {"matchLabels": {"app": "reviews"}},
                "action": "ALLOW",
                "rules": [{
                    "from": [{"source": {"principals": ["cluster.local/ns/bookinfo/sa/productpage"]}}],
                    "to": [{"operation": {"methods": ["GET"], "hosts": ["reviews"]}}],
                    "when": [{"key": "source.namespace", "values": ["bookinfo"]}]
                }]
            }
        }))
        .unwrap();
        let rule = &ap.spec.rules[0];
        assert_eq!(rule.from[0].source.principals.len(), 1);
        assert_eq!(rule.to[0].operation.methods, vec!["GET"]);
        assert_eq!(rule.when[0].key, "source.namespace");
    }
}
