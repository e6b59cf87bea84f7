//! Catalog of every check a validation run can report
//!
//! Each [`Check`] has a stable identifier, a public code (`KIAxxxx`), a
//! human-readable message and a severity. Checkers never build findings from
//! free text; they pick a catalog entry and attach a path.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a finding
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The object is broken; marks the validation invalid
    Error,
    /// Suspicious but functional
    Warning,
    /// Could not be verified
    Unknown,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Unknown => "unknown",
        })
    }
}

macro_rules! checks {
    ($( $(#[$doc:meta])* $variant:ident => ($id:literal, $code:literal, $severity:ident, $message:literal), )*) => {
        /// Every check the engine knows about
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Check {
            $( $(#[$doc])* $variant, )*
        }

        impl Check {
            /// All checks, in catalog order
            pub const ALL: &'static [Check] = &[$(Check::$variant),*];

            /// Dotted identifier, e.g. `destinationrules.multimatch`
            pub fn id(self) -> &'static str {
                match self { $(Check::$variant => $id,)* }
            }

            /// Public code, e.g. `KIA0201`
            pub fn code(self) -> &'static str {
                match self { $(Check::$variant => $code,)* }
            }

            /// Severity of findings produced by this check
            pub fn severity(self) -> Severity {
                match self { $(Check::$variant => Severity::$severity,)* }
            }

            /// Human-readable message
            pub fn message(self) -> &'static str {
                match self { $(Check::$variant => $message,)* }
            }
        }
    };
}

checks! {
    // Generic
    /// Cross-namespace references cannot be verified
    UnableCrossNamespace => ("validation.unable.cross-namespace", "KIA0001", Unknown,
        "Unable to verify the validity, cross-namespace validation is not supported for this field"),
    /// Several selector-less objects in one namespace
    MultiMatchSelectorless => ("generic.multimatch.selectorless", "KIA0002", Error,
        "More than one selector-less object in the same namespace"),
    /// Several objects select the same workload
    MultiMatchSelector => ("generic.multimatch.selector", "KIA0003", Error,
        "More than one object applied to the same workload"),
    /// Selector matches no workload
    SelectorWorkloadNotFound => ("generic.selector.workloadnotfound", "KIA0004", Warning,
        "No matching workload found for the selector in this namespace"),
    /// exportTo names an unknown namespace
    ExportToNamespaceNotFound => ("generic.exportto.namespacenotfound", "KIA0005", Error,
        "Namespace not found for this exportTo entry"),

    // AuthorizationPolicy
    /// Source namespace does not exist
    AuthorizationSourceNamespaceNotFound => ("authorizationpolicy.source.namespacenotfound", "KIA0101", Warning,
        "Namespace not found for this rule"),
    /// Method is neither an HTTP verb nor a gRPC method
    AuthorizationWrongMethod => ("authorizationpolicy.to.wrongmethod", "KIA0102", Warning,
        "Method must be one of GET, HEAD, POST, PUT, DELETE, CONNECT, OPTIONS, TRACE, PATCH or a gRPC method"),
    /// Operation host not in the registry
    AuthorizationHostNotFound => ("authorizationpolicy.nodest.matchingregistry", "KIA0104", Error,
        "This host has no matching entry in the service registry"),
    /// Identity fields used without mTLS
    AuthorizationMtlsRequired => ("authorizationpolicy.mtls.needstobeenabled", "KIA0105", Error,
        "Mesh-wide mTLS must be enabled for this field to be honored"),
    /// Principal matches no service account
    AuthorizationPrincipalNotFound => ("authorizationpolicy.source.principalnotfound", "KIA0106", Error,
        "Service Account not found for this principal"),

    // DestinationRule
    /// Two DestinationRules claim the same host and subset
    DestinationRuleMultiMatch => ("destinationrules.multimatch", "KIA0201", Warning,
        "More than one DestinationRule for the same host subset combination"),
    /// Host not in the registry
    DestinationRuleHostNotFound => ("destinationrules.nodest.matchingregistry", "KIA0202", Error,
        "This host has no matching entry in the service registry"),
    /// Subset labels match no workload
    DestinationRuleSubsetLabels => ("destinationrules.nodest.subsetlabels", "KIA0203", Error,
        "This subset's labels are not found in any matching host"),
    /// Mesh-wide mTLS without a mesh PeerAuthentication
    DestinationRuleMeshPolicyMissing => ("destinationrules.mtls.meshpolicymissing", "KIA0205", Error,
        "PeerAuthentication enabling mTLS at mesh level is missing"),
    /// Namespace-wide mTLS without any PeerAuthentication
    DestinationRuleNamespacePolicyMissing => ("destinationrules.mtls.nspolicymissing", "KIA0206", Error,
        "PeerAuthentication enabling namespace-wide mTLS is missing"),
    /// mTLS disabled while the namespace PeerAuthentication is STRICT
    DestinationRulePolicyMtlsEnabled => ("destinationrules.mtls.policymtlsenabled", "KIA0207", Error,
        "PeerAuthentication with TLS strict mode found, it should be permissive"),
    /// mTLS disabled while the mesh PeerAuthentication is STRICT
    DestinationRuleMeshPolicyMtlsEnabled => ("destinationrules.mtls.meshpolicymtlsenabled", "KIA0208", Error,
        "PeerAuthentication enabling mTLS found, permissive policy is needed"),
    /// Subset without labels
    DestinationRuleSubsetNoLabels => ("destinationrules.nodest.subsetnolabels", "KIA0209", Warning,
        "This subset has no labels"),

    // Gateway
    /// Two gateways claim the same host and port
    GatewayMultiMatch => ("gateways.multimatch", "KIA0301", Warning,
        "More than one Gateway for the same host port combination"),
    /// Gateway selector matches no workload
    GatewaySelectorNotFound => ("gateways.selector", "KIA0302", Warning,
        "No matching workload found for gateway selector in this namespace"),

    // PeerAuthentication
    /// Mesh-wide STRICT without a DestinationRule enabling mTLS
    MeshPeerAuthenticationDestinationRuleMissing => ("peerauthentication.mtls.destinationrulemissing", "KIA0401", Error,
        "Mesh-wide Destination Rule enabling mTLS is missing"),
    /// Namespace STRICT without a DestinationRule enabling mTLS
    PeerAuthenticationDestinationRuleMissing => ("peerauthentications.mtls.destinationrulemissing", "KIA0501", Error,
        "Destination Rule enabling namespace-wide mTLS is missing"),
    /// Namespace DISABLE without a DestinationRule disabling mTLS
    PeerAuthenticationDisableDestinationRuleMissing => ("peerauthentications.mtls.disabledestinationrulemissing", "KIA0505", Error,
        "Destination Rule disabling namespace-wide mTLS is missing"),
    /// Mesh DISABLE without a DestinationRule disabling mTLS
    PeerAuthenticationDisableMeshDestinationRuleMissing => ("peerauthentications.mtls.disablemeshdestinationrulemissing", "KIA0506", Error,
        "Destination Rule disabling mesh-wide mTLS is missing"),

    // Sidecar
    /// Egress host not in the registry
    SidecarEgressServiceNotFound => ("sidecar.egress.servicenotfound", "KIA1004", Warning,
        "This host has no matching entry in the service registry"),
    /// Root-namespace sidecar with a selector
    SidecarGlobalSelector => ("sidecar.global.selector", "KIA1006", Warning,
        "Global default sidecar should not have workloadSelector"),

    // VirtualService
    /// Destination host not in the registry
    VirtualServiceHostNotFound => ("virtualservices.nohost.hostnotfound", "KIA1101", Error,
        "DestinationWeight on route doesn't have a valid service (host not found)"),
    /// Referenced gateway does not exist
    VirtualServiceGatewayNotFound => ("virtualservices.nogateway", "KIA1102", Error,
        "VirtualService is pointing to a non-existent gateway"),
    /// Only one weighted destination
    VirtualServiceSingleWeight => ("virtualservices.route.singleweight", "KIA1104", Warning,
        "The weight is assumed to be 100 because there is only one route destination"),
    /// Same host and subset routed twice
    VirtualServiceRepeatedSubset => ("virtualservices.route.repeatedsubset", "KIA1105", Warning,
        "This host subset combination is already referenced in another route destination"),
    /// Two VirtualServices claim the same host
    VirtualServiceSingleHost => ("virtualservices.singlehost", "KIA1106", Warning,
        "More than one Virtual Service for same host"),
    /// Subset not defined by any DestinationRule
    VirtualServiceSubsetNotFound => ("virtualservices.subsetpresent.subsetnotfound", "KIA1107", Warning,
        "Subset not found"),
    /// Weights do not add up
    VirtualServiceWeightSum => ("virtualservices.route.weightsum", "KIA1109", Error,
        "Weight sum should be 100"),
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id(), self.code())
    }
}
