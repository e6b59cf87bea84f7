//! Finding the mTLS policies in scope within a snapshot

use std::collections::BTreeMap;

use meshcheck_common::crd::{
    effective_selector, labels_match, DestinationRule, PeerAuthentication, PolicyMode,
};
use meshcheck_common::{mesh, HostParser, Snapshot, ValidationConfig};
use tracing::trace;

use crate::resolver::MtlsResolver;
use crate::status::{MtlsStatus, ScopeStatus};

/// mTLS view of one snapshot under one configuration
#[derive(Clone, Copy, Debug)]
pub struct MtlsContext<'a> {
    snapshot: &'a Snapshot,
    root_namespace: &'a str,
    cluster_domain: &'a str,
    resolver: MtlsResolver,
}

impl<'a> MtlsContext<'a> {
    /// Create a context
    pub fn new(snapshot: &'a Snapshot, config: &'a ValidationConfig) -> Self {
        Self {
            snapshot,
            root_namespace: &config.root_namespace,
            cluster_domain: &config.cluster_domain,
            resolver: MtlsResolver::new(config.auto_mtls_enabled, config.allow_permissive),
        }
    }

    /// The underlying resolver
    pub fn resolver(&self) -> MtlsResolver {
        self.resolver
    }

    /// Mesh root namespace
    pub fn root_namespace(&self) -> &'a str {
        self.root_namespace
    }

    fn parser(&self) -> HostParser<'a> {
        self.snapshot.host_parser(self.cluster_domain)
    }

    // =========================================================================
    // PeerAuthentication scopes
    // =========================================================================

    /// First namespace-wide PeerAuthentication in `namespace` that sets a mode
    pub fn namespace_peer_authentication(&self, namespace: &str) -> Option<&'a PeerAuthentication> {
        self.snapshot
            .peer_authentications
            .iter()
            .find(|pa| {
                pa.metadata.namespace == namespace && pa.is_namespace_wide() && pa.mode().is_set()
            })
    }

    /// Namespace-scope PeerAuthentication mode; the root namespace has none
    pub fn namespace_pa_mode(&self, namespace: &str) -> PolicyMode {
        if namespace == self.root_namespace {
            return PolicyMode::Unset;
        }
        self.namespace_peer_authentication(namespace)
            .map(PeerAuthentication::mode)
            .unwrap_or_default()
    }

    /// Mesh-scope PeerAuthentication mode
    pub fn mesh_pa_mode(&self) -> PolicyMode {
        self.namespace_peer_authentication(self.root_namespace)
            .map(PeerAuthentication::mode)
            .unwrap_or_default()
    }

    // =========================================================================
    // DestinationRule scopes
    // =========================================================================

    /// Whether `dr` targets every service of `namespace` (`*.ns.svc.<domain>`)
    pub fn is_namespace_wide(&self, dr: &DestinationRule, namespace: &str) -> bool {
        let host = self.parser().parse(
            &dr.spec.host,
            &dr.metadata.namespace,
            &dr.metadata.cluster,
        );
        host.is_wildcard && host.service == mesh::WILDCARD_HOST && host.namespace == namespace
    }

    /// Whether `dr` targets the whole mesh (`*.local`)
    pub fn is_mesh_wide(&self, dr: &DestinationRule) -> bool {
        mesh::is_mesh_wide_host(&dr.spec.host, self.cluster_domain)
    }

    /// First namespace-wide DestinationRule for `namespace` that sets a TLS mode.
    ///
    /// The rule may be declared in any namespace.
    pub fn namespace_destination_rule(&self, namespace: &str) -> Option<&'a DestinationRule> {
        self.snapshot
            .destination_rules
            .iter()
            .find(|dr| dr.tls_mode().is_set() && self.is_namespace_wide(dr, namespace))
    }

    /// Namespace-scope DestinationRule mode
    pub fn namespace_dr_mode(&self, namespace: &str) -> PolicyMode {
        self.namespace_destination_rule(namespace)
            .map(DestinationRule::tls_mode)
            .unwrap_or_default()
    }

    /// First mesh-wide DestinationRule that sets a TLS mode
    pub fn mesh_destination_rule(&self) -> Option<&'a DestinationRule> {
        self.snapshot
            .destination_rules
            .iter()
            .find(|dr| dr.tls_mode().is_set() && self.is_mesh_wide(dr))
    }

    /// Mesh-scope DestinationRule mode
    pub fn mesh_dr_mode(&self) -> PolicyMode {
        self.mesh_destination_rule()
            .map(DestinationRule::tls_mode)
            .unwrap_or_default()
    }

    // =========================================================================
    // Statuses
    // =========================================================================

    /// Status declared at namespace scope
    pub fn namespace_status(&self, namespace: &str) -> ScopeStatus {
        self.resolver
            .final_status(self.namespace_dr_mode(namespace), self.namespace_pa_mode(namespace))
    }

    /// Status declared at mesh scope
    pub fn mesh_status(&self) -> ScopeStatus {
        self.resolver
            .final_status(self.mesh_dr_mode(), self.mesh_pa_mode())
    }

    /// Effective status for `namespace`, inheriting from the mesh
    pub fn overall_status(&self, namespace: &str) -> MtlsStatus {
        let ns = self.namespace_status(namespace);
        let mesh = self.mesh_status();
        let status = self.resolver.overall_status(&ns, &mesh);
        trace!(
            namespace,
            ns_dr = %ns.dr_mode,
            ns_pa = %ns.pa_mode,
            mesh_dr = %mesh.dr_mode,
            mesh_pa = %mesh.pa_mode,
            %status,
            "resolved namespace mTLS status"
        );
        status
    }

    /// Effective status for workloads in `namespace` carrying `labels`
    pub fn workload_status(&self, namespace: &str, labels: &BTreeMap<String, String>) -> MtlsStatus {
        let pa_mode = self
            .snapshot
            .peer_authentications
            .iter()
            .find(|pa| {
                pa.metadata.namespace == namespace
                    && effective_selector(pa.spec.selector.as_ref())
                        .is_some_and(|selector| labels_match(selector, labels))
            })
            .map(PeerAuthentication::mode)
            .unwrap_or_default();

        let dr_modes = self.workload_dr_modes(namespace, labels);
        self.resolver
            .workload_status(pa_mode, &dr_modes)
            .unwrap_or_else(|| self.overall_status(namespace))
    }

    fn workload_dr_modes(&self, namespace: &str, labels: &BTreeMap<String, String>) -> Vec<PolicyMode> {
        let parser = self.parser();
        let services: Vec<&str> = self
            .snapshot
            .services
            .iter()
            .filter(|s| s.metadata.namespace == namespace && labels_match(&s.spec.selector, labels))
            .map(|s| s.metadata.name.as_str())
            .collect();

        self.snapshot
            .destination_rules
            .iter()
            .filter(|dr| {
                let host = parser.parse(&dr.spec.host, &dr.metadata.namespace, &dr.metadata.cluster);
                !host.is_wildcard
                    && host.namespace == namespace
                    && services.contains(&host.service.as_str())
            })
            .map(DestinationRule::tls_mode)
            .collect()
    }

    /// Whether mTLS traffic reaches the selected workloads (or the whole
    /// namespace when `labels` is `None`).
    ///
    /// With auto-mTLS, a scope with no declared policy still counts.
    pub fn receives_mtls(&self, namespace: &str, labels: Option<&BTreeMap<String, String>>) -> bool {
        let status = match labels {
            Some(labels) => self.workload_status(namespace, labels),
            None => self.overall_status(namespace),
        };
        match status {
            MtlsStatus::Enabled => true,
            MtlsStatus::NotEnabled => self.resolver.auto_mtls_enabled(),
            MtlsStatus::Disabled | MtlsStatus::PartiallyEnabled => false,
        }
    }
}
