//! Host references and wildcard matching
//!
//! Mesh objects name their destinations in several spellings: a short name
//! resolved against the declaring namespace, `name.namespace`, the full
//! `name.namespace.svc.<cluster domain>`, or a wildcard. [`HostParser`]
//! normalizes all of them into a [`Host`] so two references to the same
//! service compare equal no matter how they were written.

use std::collections::BTreeSet;
use std::fmt;

use crate::mesh;

/// A normalized host reference
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Host {
    /// Service name, `*`-prefixed for wildcards, or the full literal for external hosts
    pub service: String,
    /// Namespace; empty for external hosts and the mesh-wide `*`
    pub namespace: String,
    /// Cluster the reference was declared in; empty for external hosts
    pub cluster: String,
    /// Whether the service segment starts with `*`
    pub is_wildcard: bool,
}

impl Host {
    /// A host inside the mesh
    pub fn new(
        service: impl Into<String>,
        namespace: impl Into<String>,
        cluster: impl Into<String>,
    ) -> Self {
        let service = service.into();
        Self {
            is_wildcard: service.starts_with('*'),
            service,
            namespace: namespace.into(),
            cluster: cluster.into(),
        }
    }

    /// A host outside the mesh, kept as a literal name
    pub fn external(name: impl Into<String>) -> Self {
        Self::new(name, "", "")
    }

    /// Whether parsing produced anything to match against
    pub fn is_valid(&self) -> bool {
        !self.service.is_empty()
    }

    /// Whether this host lives outside any namespace
    pub fn is_external(&self) -> bool {
        self.namespace.is_empty() && self.service != mesh::WILDCARD_HOST
    }

    /// Whether this is the bare `*` that matches everything
    pub fn is_mesh_wildcard(&self) -> bool {
        self.service == mesh::WILDCARD_HOST && self.namespace.is_empty()
    }

    /// Whether this wildcard covers `candidate`.
    ///
    /// Namespaces must agree unless the wildcard has none, and the candidate's
    /// service must end with the wildcard's suffix (bare `*` accepts any).
    /// A non-wildcard host contains only itself.
    pub fn contains(&self, candidate: &Host) -> bool {
        if !self.is_wildcard {
            return self == candidate;
        }
        if !self.namespace.is_empty() && self.namespace != candidate.namespace {
            return false;
        }
        let suffix = &self.service[1..];
        suffix.is_empty() || candidate.service.ends_with(suffix)
    }

    /// Whether either host covers the other
    pub fn overlaps(&self, other: &Host) -> bool {
        self == other || self.contains(other) || other.contains(self)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.service)
        } else {
            write!(f, "{}.{}", self.service, self.namespace)
        }
    }
}

/// Resolves raw host strings against a cluster domain and known namespaces
#[derive(Clone, Copy, Debug)]
pub struct HostParser<'a> {
    cluster_domain: &'a str,
    namespaces: &'a BTreeSet<String>,
}

impl<'a> HostParser<'a> {
    /// Create a parser for one snapshot
    pub fn new(cluster_domain: &'a str, namespaces: &'a BTreeSet<String>) -> Self {
        Self {
            cluster_domain,
            namespaces,
        }
    }

    /// Whether `namespace` is known to this parser
    pub fn is_known_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains(namespace)
    }

    /// Parse a host declared in `namespace` on `cluster`.
    ///
    /// An empty string yields an invalid [`Host`]; callers report it.
    pub fn parse(&self, raw: &str, namespace: &str, cluster: &str) -> Host {
        if raw.is_empty() {
            return Host::default();
        }
        if raw == mesh::WILDCARD_HOST {
            return Host::new(mesh::WILDCARD_HOST, "", cluster);
        }

        let segments: Vec<&str> = raw.split('.').collect();
        match segments.as_slice() {
            [service] => Host::new(*service, namespace, cluster),
            [service, ns] if self.is_known_namespace(ns) => Host::new(*service, *ns, cluster),
            [service, ns, svc, domain @ ..]
                if *svc == mesh::SVC_SEGMENT
                    && (domain.is_empty() || domain.join(".") == self.cluster_domain) =>
            {
                Host::new(*service, *ns, cluster)
            }
            _ => Host::external(raw),
        }
    }
}

/// Parse with the default cluster domain.
pub fn parse_host(
    raw: &str,
    namespace: &str,
    cluster: &str,
    namespaces: &BTreeSet<String>,
) -> Host {
    HostParser::new(mesh::DEFAULT_CLUSTER_DOMAIN, namespaces).parse(raw, namespace, cluster)
}
