//! networking.istio.io types
//!
//! DestinationRule, VirtualService, Gateway, Sidecar and ServiceEntry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{mesh_resource, ObjectMeta, PolicyMode, WorkloadSelector};

// =============================================================================
// DestinationRule
// =============================================================================

/// Istio DestinationRule: traffic policy and subsets for one host
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DestinationRule {
    /// API version
    #[serde(default = "DestinationRule::api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "DestinationRule::kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    #[serde(default)]
    pub spec: DestinationRuleSpec,
}

mesh_resource!(
    DestinationRule,
    DestinationRuleSpec,
    "networking.istio.io/v1",
    DestinationRule
);

impl DestinationRule {
    /// TLS mode of the top-level traffic policy, `Unset` when absent
    pub fn tls_mode(&self) -> PolicyMode {
        self.spec
            .traffic_policy
            .as_ref()
            .and_then(|tp| tp.tls.as_ref())
            .map(|tls| tls.mode)
            .unwrap_or_default()
    }

    /// Whether any port-level or top-level policy originates mutual TLS
    pub fn originates_mtls_anywhere(&self) -> bool {
        let Some(tp) = &self.spec.traffic_policy else {
            return false;
        };
        tp.tls.as_ref().is_some_and(|t| t.mode.originates_mtls())
            || tp
                .port_level_settings
                .iter()
                .filter_map(|p| p.tls.as_ref())
                .any(|t| t.mode.originates_mtls())
    }
}

/// DestinationRule spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DestinationRuleSpec {
    /// Target host (short name, FQDN or wildcard)
    #[serde(default)]
    pub host: String,
    /// Traffic policy applied to every subset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_policy: Option<TrafficPolicy>,
    /// Named subsets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsets: Vec<Subset>,
    /// Namespaces this rule is visible to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub export_to: Vec<String>,
}

/// Traffic policy (only TLS is modelled)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrafficPolicy {
    /// Client TLS settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<ClientTlsSettings>,
    /// Per-port overrides
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_level_settings: Vec<PortTrafficPolicy>,
}

/// Client-side TLS settings
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientTlsSettings {
    /// TLS mode
    #[serde(default)]
    pub mode: PolicyMode,
}

/// Port-scoped traffic policy
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PortTrafficPolicy {
    /// Port this policy applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<PortSelector>,
    /// Client TLS settings for the port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<ClientTlsSettings>,
}

/// Port selector
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PortSelector {
    /// Port number
    #[serde(default)]
    pub number: u32,
}

/// Named subset of a host's endpoints
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subset {
    /// Subset name
    pub name: String,
    /// Endpoint labels selecting the subset
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Subset-specific traffic policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_policy: Option<TrafficPolicy>,
}

// =============================================================================
// VirtualService
// =============================================================================

/// Istio VirtualService: routing rules for a set of hosts
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualService {
    /// API version
    #[serde(default = "VirtualService::api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "VirtualService::kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    #[serde(default)]
    pub spec: VirtualServiceSpec,
}

mesh_resource!(
    VirtualService,
    VirtualServiceSpec,
    "networking.istio.io/v1",
    VirtualService
);

impl VirtualService {
    /// Every route list with its path, e.g. `spec/http[0]/route`
    pub fn route_groups(&self) -> Vec<(String, &[RouteDestination])> {
        let http = self.spec.http.iter().map(|r| r.route.as_slice());
        let tcp = self.spec.tcp.iter().map(|r| r.route.as_slice());
        let tls = self.spec.tls.iter().map(|r| r.route.as_slice());

        let mut out = Vec::new();
        for (i, route) in http.enumerate() {
            out.push((format!("spec/http[{i}]/route"), route));
        }
        for (i, route) in tcp.enumerate() {
            out.push((format!("spec/tcp[{i}]/route"), route));
        }
        for (i, route) in tls.enumerate() {
            out.push((format!("spec/tls[{i}]/route"), route));
        }
        out
    }

    /// Every route destination with its path inside the spec.
    ///
    /// Paths look like `spec/http[0]/route[1]/destination`.
    pub fn destinations(&self) -> Vec<(String, &RouteDestination)> {
        self.route_groups()
            .into_iter()
            .flat_map(|(prefix, route)| {
                route
                    .iter()
                    .enumerate()
                    .map(move |(j, dest)| (format!("{prefix}[{j}]/destination"), dest))
            })
            .collect()
    }
}

/// VirtualService spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceSpec {
    /// Hosts this service routes for
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    /// Gateways the routes are bound to (`mesh` for sidecars)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateways: Vec<String>,
    /// HTTP routes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http: Vec<HttpRoute>,
    /// TCP routes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tcp: Vec<TcpRoute>,
    /// TLS passthrough routes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tls: Vec<TlsRoute>,
    /// Namespaces this service is visible to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub export_to: Vec<String>,
}

/// HTTP route
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct HttpRoute {
    /// Route name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Weighted destinations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route: Vec<RouteDestination>,
}

/// TCP route
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TcpRoute {
    /// Weighted destinations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route: Vec<RouteDestination>,
}

/// TLS route
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TlsRoute {
    /// Weighted destinations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route: Vec<RouteDestination>,
}

/// A destination with an optional weight
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RouteDestination {
    /// Destination
    #[serde(default)]
    pub destination: Destination,
    /// Share of traffic in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
}

/// Routing destination
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Destination {
    /// Destination host
    #[serde(default)]
    pub host: String,
    /// Subset defined by a DestinationRule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subset: Option<String>,
    /// Destination port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<PortSelector>,
}

// =============================================================================
// Gateway
// =============================================================================

/// Istio Gateway: listeners exposed by a set of proxy workloads
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    /// API version
    #[serde(default = "Gateway::api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "Gateway::kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    #[serde(default)]
    pub spec: GatewaySpec,
}

mesh_resource!(Gateway, GatewaySpec, "networking.istio.io/v1", Gateway);

/// Gateway spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GatewaySpec {
    /// Labels of the proxy workloads this gateway configures
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    /// Listeners
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<GatewayServer>,
}

/// Gateway listener
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GatewayServer {
    /// Listening port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<GatewayPort>,
    /// Hostnames served, optionally prefixed with `namespace/`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
}

/// Gateway port
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GatewayPort {
    /// Port number
    #[serde(default)]
    pub number: u32,
    /// Port name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Protocol (HTTP, HTTPS, TCP, ...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
}

// =============================================================================
// Sidecar
// =============================================================================

/// Istio Sidecar: narrows what a proxy sees
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sidecar {
    /// API version
    #[serde(default = "Sidecar::api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "Sidecar::kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    #[serde(default)]
    pub spec: SidecarSpec,
}

mesh_resource!(Sidecar, SidecarSpec, "networking.istio.io/v1", Sidecar);

/// Sidecar spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SidecarSpec {
    /// Workloads this sidecar applies to; namespace-wide when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_selector: Option<WorkloadSelector>,
    /// Outbound listeners
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub egress: Vec<EgressListener>,
}

/// Sidecar egress listener
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct EgressListener {
    /// Hosts in `namespace/dnsName` form
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
}

// =============================================================================
// ServiceEntry
// =============================================================================

/// Istio ServiceEntry: adds hosts to the service registry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntry {
    /// API version
    #[serde(default = "ServiceEntry::api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "ServiceEntry::kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    #[serde(default)]
    pub spec: ServiceEntrySpec,
}

mesh_resource!(
    ServiceEntry,
    ServiceEntrySpec,
    "networking.istio.io/v1",
    ServiceEntry
);

/// ServiceEntry spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntrySpec {
    /// Hosts added to the registry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    /// MESH_EXTERNAL or MESH_INTERNAL
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    /// Endpoint labels selecting mesh workloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_selector: Option<WorkloadSelector>,
    /// Namespaces this entry is visible to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub export_to: Vec<String>,
}
