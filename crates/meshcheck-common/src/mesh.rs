//! Service mesh constants
//!
//! Single source of truth for the Istio conventions the checkers rely on:
//! default namespaces and domains, sentinel host forms, and principal layout.

// =============================================================================
// Defaults
// =============================================================================

/// Namespace whose policies apply to the whole mesh.
pub const DEFAULT_ROOT_NAMESPACE: &str = "istio-system";

/// DNS suffix following `svc` in a fully-qualified service name.
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";

/// Cluster identity used when none is configured.
pub const DEFAULT_CLUSTER: &str = "Kubernetes";

// =============================================================================
// Host Forms
// =============================================================================

/// Host that matches every service in the mesh.
pub const WILDCARD_HOST: &str = "*";

/// DestinationRule host conventionally used for mesh-wide traffic policy.
pub const MESH_WIDE_HOST: &str = "*.local";

/// Segment separating namespace from cluster domain in a service FQDN.
pub const SVC_SEGMENT: &str = "svc";

/// Subset key for a DestinationRule without subsets; collides with any subset.
pub const ANY_SUBSET: &str = "~";

/// Sidecar egress namespace matching every namespace.
pub const EGRESS_ANY_NAMESPACE: &str = "*";

/// Sidecar egress namespace matching no namespace.
pub const EGRESS_NO_NAMESPACE: &str = "~";

/// Sidecar egress namespace meaning the sidecar's own namespace.
pub const EGRESS_OWN_NAMESPACE: &str = ".";

/// Gateway name that binds a VirtualService to sidecars instead of a gateway.
pub const MESH_GATEWAY: &str = "mesh";

// =============================================================================
// Naming Helpers
// =============================================================================

/// Namespace-wide wildcard host in fully-qualified form.
///
/// Format: `*.{namespace}.svc.{cluster_domain}`
pub fn namespace_wildcard_host(namespace: &str, cluster_domain: &str) -> String {
    format!("*.{}.{}.{}", namespace, SVC_SEGMENT, cluster_domain)
}

/// Whether a raw host string declares mesh-wide scope.
///
/// Both the `*.local` convention and `*.{cluster_domain}` are accepted.
pub fn is_mesh_wide_host(raw: &str, cluster_domain: &str) -> bool {
    raw == MESH_WIDE_HOST
        || raw
            .strip_prefix("*.")
            .is_some_and(|rest| rest == cluster_domain)
}

// =============================================================================
// Trust Domain
// =============================================================================

/// SPIFFE principal helpers
pub mod trust_domain {
    /// Default SPIFFE trust domain for a stock installation.
    pub const DEFAULT: &str = "cluster.local";

    /// Build a SPIFFE principal for a service account.
    ///
    /// Format: `{trust_domain}/ns/{namespace}/sa/{service_account}`
    ///
    /// Note: The principal does NOT include the `spiffe://` prefix.
    pub fn principal(trust_domain: &str, namespace: &str, service_account: &str) -> String {
        format!("{}/ns/{}/sa/{}", trust_domain, namespace, service_account)
    }
}
