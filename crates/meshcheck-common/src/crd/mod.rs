//! Typed mesh configuration objects
//!
//! Every object the checkers look at is decoded once into one of these types
//! at the snapshot boundary. Only the fields the checks need are modelled;
//! anything else in a manifest is ignored by serde.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Metadata
// =============================================================================

/// Kubernetes metadata plus the cluster the object was read from.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object name
    pub name: String,
    /// Object namespace
    #[serde(default)]
    pub namespace: String,
    /// Cluster identity; stamped by the snapshot when absent
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster: String,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Create metadata for a namespaced object
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Set the cluster identity
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Resource Traits
// =============================================================================

/// Trait for types that have a known API version and kind.
pub trait HasApiResource {
    /// Full API version (e.g., "networking.istio.io/v1")
    const API_VERSION: &'static str;
    /// Resource kind (e.g., "DestinationRule")
    const KIND: &'static str;
}

/// A validated mesh object: it has metadata and a stable [`ObjectKind`].
pub trait MeshObject: HasApiResource {
    /// Kind used in validation keys
    const OBJECT_KIND: ObjectKind;

    /// Object metadata
    fn metadata(&self) -> &ObjectMeta;

    /// Mutable object metadata
    fn metadata_mut(&mut self) -> &mut ObjectMeta;
}

/// Implements the resource traits plus the serde default helpers for a CRD type.
macro_rules! mesh_resource {
    ($ty:ident, $spec:ident, $api_version:literal, $kind:ident) => {
        impl $crate::crd::HasApiResource for $ty {
            const API_VERSION: &'static str = $api_version;
            const KIND: &'static str = stringify!($kind);
        }

        impl $crate::crd::MeshObject for $ty {
            const OBJECT_KIND: $crate::crd::ObjectKind = $crate::crd::ObjectKind::$kind;

            fn metadata(&self) -> &$crate::crd::ObjectMeta {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut $crate::crd::ObjectMeta {
                &mut self.metadata
            }
        }

        impl $ty {
            fn api_version() -> String {
                <Self as $crate::crd::HasApiResource>::API_VERSION.to_string()
            }

            fn kind() -> String {
                <Self as $crate::crd::HasApiResource>::KIND.to_string()
            }

            #[doc = concat!("Create a new ", stringify!($kind))]
            pub fn new(metadata: $crate::crd::ObjectMeta, spec: $spec) -> Self {
                Self {
                    api_version: Self::api_version(),
                    kind: Self::kind(),
                    metadata,
                    spec,
                }
            }
        }
    };
}

pub(crate) use mesh_resource;

mod networking;
mod security;
mod workload;

pub use networking::{
    ClientTlsSettings, Destination, DestinationRule, DestinationRuleSpec, EgressListener,
    Gateway, GatewayPort, GatewayServer, GatewaySpec, HttpRoute, PortSelector,
    PortTrafficPolicy, RouteDestination, ServiceEntry, ServiceEntrySpec, Sidecar, SidecarSpec,
    Subset, TcpRoute, TlsRoute, TrafficPolicy, VirtualService, VirtualServiceSpec,
};
pub use security::{
    AuthorizationPolicy, AuthorizationPolicySpec, Condition, Operation, PeerAuthentication,
    PeerAuthenticationSpec, PeerMtls, Rule, RuleFrom, RuleTo, Source,
};
pub use workload::{
    Deployment, DeploymentSpec, Namespace, PodSpec, PodTemplate, PodTemplateMeta, Service,
    ServicePort, ServiceSpec, Workload,
};

// =============================================================================
// Object Kind
// =============================================================================

/// Kinds of objects that receive validations
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// security.istio.io AuthorizationPolicy
    AuthorizationPolicy,
    /// networking.istio.io DestinationRule
    DestinationRule,
    /// networking.istio.io Gateway
    Gateway,
    /// security.istio.io PeerAuthentication
    PeerAuthentication,
    /// networking.istio.io ServiceEntry
    ServiceEntry,
    /// networking.istio.io Sidecar
    Sidecar,
    /// networking.istio.io VirtualService
    VirtualService,
}

impl ObjectKind {
    /// Lowercase name used in validation keys
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::AuthorizationPolicy => "authorizationpolicy",
            ObjectKind::DestinationRule => "destinationrule",
            ObjectKind::Gateway => "gateway",
            ObjectKind::PeerAuthentication => "peerauthentication",
            ObjectKind::ServiceEntry => "serviceentry",
            ObjectKind::Sidecar => "sidecar",
            ObjectKind::VirtualService => "virtualservice",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Shared Spec Types
// =============================================================================

/// TLS / mTLS mode, shared by PeerAuthentication and DestinationRule TLS settings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyMode {
    /// Only mTLS traffic accepted
    Strict,
    /// Plaintext and mTLS accepted
    Permissive,
    /// TLS disabled
    Disable,
    /// Istio-issued certificates for mTLS
    IstioMutual,
    /// User-provided certificates for mTLS
    Mutual,
    /// Originate plain TLS
    Simple,
    /// Inherit from parent scope
    #[default]
    Unset,
}

impl PolicyMode {
    /// Whether this mode was explicitly declared
    pub fn is_set(self) -> bool {
        self != PolicyMode::Unset
    }

    /// Whether a DestinationRule in this mode originates mutual TLS
    pub fn originates_mtls(self) -> bool {
        matches!(self, PolicyMode::IstioMutual | PolicyMode::Mutual)
    }

    /// Wire spelling
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyMode::Strict => "STRICT",
            PolicyMode::Permissive => "PERMISSIVE",
            PolicyMode::Disable => "DISABLE",
            PolicyMode::IstioMutual => "ISTIO_MUTUAL",
            PolicyMode::Mutual => "MUTUAL",
            PolicyMode::Simple => "SIMPLE",
            PolicyMode::Unset => "UNSET",
        }
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label selector used by Sidecar, PeerAuthentication and AuthorizationPolicy
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSelector {
    /// Match labels
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl WorkloadSelector {
    /// Create a selector from label pairs
    pub fn from_labels<K, V>(labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            match_labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Whether this selector matches the given workload labels
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        labels_match(&self.match_labels, labels)
    }
}

/// Returns the labels of a selector that actually constrains something.
///
/// A missing selector and a selector with empty `matchLabels` both mean
/// "every workload in scope", so both yield `None`.
pub fn effective_selector(
    selector: Option<&WorkloadSelector>,
) -> Option<&BTreeMap<String, String>> {
    selector
        .map(|s| &s.match_labels)
        .filter(|labels| !labels.is_empty())
}

/// Whether every selector pair is present on `labels`.
///
/// An empty selector matches nothing.
pub fn labels_match(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    !selector.is_empty() && selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}
