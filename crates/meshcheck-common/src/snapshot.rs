//! Immutable input to a validation run
//!
//! A [`Snapshot`] holds every typed object the checkers may consult. It is
//! built once (programmatically or from a YAML manifest stream) and then only
//! read, so checkers can share it freely.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::crd::{
    AuthorizationPolicy, Deployment, DestinationRule, Gateway, MeshObject, Namespace,
    PeerAuthentication, Service, ServiceEntry, Sidecar, VirtualService, Workload,
};
use crate::host::{Host, HostParser};
use crate::{Error, Result};

/// Everything one validation run looks at
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    /// Cluster identity of the snapshot
    pub cluster: String,
    /// Known namespaces
    pub namespaces: BTreeSet<String>,
    /// DestinationRules
    pub destination_rules: Vec<DestinationRule>,
    /// VirtualServices
    pub virtual_services: Vec<VirtualService>,
    /// Gateways
    pub gateways: Vec<Gateway>,
    /// Sidecars
    pub sidecars: Vec<Sidecar>,
    /// ServiceEntries
    pub service_entries: Vec<ServiceEntry>,
    /// PeerAuthentications
    pub peer_authentications: Vec<PeerAuthentication>,
    /// AuthorizationPolicies
    pub authorization_policies: Vec<AuthorizationPolicy>,
    /// Kubernetes services (the service registry)
    pub services: Vec<Service>,
    /// Workloads with their pod labels
    pub workloads: Vec<Workload>,
}

impl Snapshot {
    /// An empty snapshot for `cluster`
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            ..Default::default()
        }
    }

    /// Decode a `---` separated manifest stream.
    ///
    /// Kinds outside the modelled set are skipped. Any modelled document that
    /// fails to decode aborts the whole load.
    pub fn from_manifests(cluster: impl Into<String>, manifests: &str) -> Result<Self> {
        let mut snapshot = Self::new(cluster);
        for (index, doc) in crate::yaml::parse_documents(manifests)?.into_iter().enumerate() {
            snapshot.add_document(index, doc)?;
        }
        snapshot.finalize();
        Ok(snapshot)
    }

    fn add_document(&mut self, index: usize, doc: Value) -> Result<()> {
        let Some(kind) = doc.get("kind").and_then(Value::as_str).map(str::to_string) else {
            return Err(Error::manifest(index, "document has no kind"));
        };
        match kind.as_str() {
            "Namespace" => {
                let ns: Namespace = decode(index, &kind, doc)?;
                self.namespaces.insert(ns.metadata.name);
            }
            "Service" => self.services.push(decode(index, &kind, doc)?),
            "Deployment" => {
                let deployment: Deployment = decode(index, &kind, doc)?;
                self.workloads.push(deployment.into());
            }
            "DestinationRule" => self.destination_rules.push(decode(index, &kind, doc)?),
            "VirtualService" => self.virtual_services.push(decode(index, &kind, doc)?),
            "Gateway" => self.gateways.push(decode(index, &kind, doc)?),
            "Sidecar" => self.sidecars.push(decode(index, &kind, doc)?),
            "ServiceEntry" => self.service_entries.push(decode(index, &kind, doc)?),
            "PeerAuthentication" => self.peer_authentications.push(decode(index, &kind, doc)?),
            "AuthorizationPolicy" => self.authorization_policies.push(decode(index, &kind, doc)?),
            other => debug!(document = index, kind = other, "skipping unmodelled manifest kind"),
        }
        Ok(())
    }

    /// Stamp missing clusters and register every namespace an object lives in.
    ///
    /// Call after adding objects by hand; [`Snapshot::from_manifests`] does it.
    pub fn finalize(&mut self) {
        let cluster = self.cluster.clone();
        let mut seen = BTreeSet::new();

        fn stamp<T: MeshObject>(objects: &mut [T], cluster: &str, seen: &mut BTreeSet<String>) {
            for object in objects {
                let meta = object.metadata_mut();
                if meta.cluster.is_empty() {
                    meta.cluster = cluster.to_string();
                }
                seen.insert(meta.namespace.clone());
            }
        }

        stamp(&mut self.destination_rules, &cluster, &mut seen);
        stamp(&mut self.virtual_services, &cluster, &mut seen);
        stamp(&mut self.gateways, &cluster, &mut seen);
        stamp(&mut self.sidecars, &cluster, &mut seen);
        stamp(&mut self.service_entries, &cluster, &mut seen);
        stamp(&mut self.peer_authentications, &cluster, &mut seen);
        stamp(&mut self.authorization_policies, &cluster, &mut seen);
        seen.extend(self.services.iter().map(|s| s.metadata.namespace.clone()));
        seen.extend(self.workloads.iter().map(|w| w.namespace.clone()));

        seen.retain(|ns| !ns.is_empty());
        self.namespaces.extend(seen);
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Host parser bound to this snapshot's namespaces
    pub fn host_parser<'a>(&'a self, cluster_domain: &'a str) -> HostParser<'a> {
        HostParser::new(cluster_domain, &self.namespaces)
    }

    /// Whether `namespace` is known
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains(namespace)
    }

    /// Workloads in `namespace`
    pub fn workloads_in<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = &'a Workload> {
        self.workloads.iter().filter(move |w| w.namespace == namespace)
    }

    /// Services fronting `workload`
    pub fn services_for<'a>(&'a self, workload: &'a Workload) -> impl Iterator<Item = &'a Service> {
        self.services.iter().filter(move |s| s.selects(workload))
    }

    /// Service named by a parsed in-mesh host
    pub fn service_for_host(&self, host: &Host) -> Option<&Service> {
        self.services
            .iter()
            .find(|s| s.metadata.name == host.service && s.metadata.namespace == host.namespace)
    }

    /// Whether a host is backed by a service, a ServiceEntry or a wildcard over services.
    ///
    /// `raw` is the host as written, used to match ServiceEntry hosts literally.
    pub fn host_in_registry(&self, host: &Host, raw: &str) -> bool {
        if host.is_wildcard {
            return self.services.iter().any(|s| {
                host.contains(&Host::new(
                    s.metadata.name.as_str(),
                    s.metadata.namespace.as_str(),
                    host.cluster.as_str(),
                ))
            }) || self.service_entry_covers(host, raw);
        }
        self.service_for_host(host).is_some() || self.service_entry_covers(host, raw)
    }

    fn service_entry_covers(&self, host: &Host, raw: &str) -> bool {
        self.service_entries.iter().flat_map(|se| &se.spec.hosts).any(|se_host| {
            if se_host == raw || *se_host == host.to_string() {
                return true;
            }
            let entry = Host::external(se_host.as_str());
            entry.is_wildcard && !host.is_wildcard && entry.contains(&Host::external(raw))
        })
    }

    /// Service-account principals of every workload, under `trust_domain`
    pub fn principals(&self, trust_domain: &str) -> BTreeSet<String> {
        self.workloads
            .iter()
            .map(|w| {
                crate::mesh::trust_domain::principal(
                    trust_domain,
                    &w.namespace,
                    w.service_account_name(),
                )
            })
            .collect()
    }

    /// Number of mesh objects that receive validations
    pub fn object_count(&self) -> usize {
        self.destination_rules.len()
            + self.virtual_services.len()
            + self.gateways.len()
            + self.sidecars.len()
            + self.service_entries.len()
            + self.peer_authentications.len()
            + self.authorization_policies.len()
    }
}

fn decode<T: DeserializeOwned>(index: usize, kind: &str, doc: Value) -> Result<T> {
    serde_json::from_value(doc).map_err(|e| Error::manifest_for_kind(index, kind, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{DestinationRuleSpec, ObjectMeta, ServiceEntrySpec};

    const MANIFESTS: &str = r#"
apiVersion: v1
kind: Namespace
metadata:
  name: bookinfo
---
apiVersion: v1
kind: Service
metadata:
  name: reviews
  namespace: bookinfo
spec:
  selector:
    app: reviews
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: reviews-v1
  namespace: bookinfo
spec:
  template:
    metadata:
      labels:
        app: reviews
        version: v1
    spec:
      serviceAccountName: bookinfo-reviews
---
apiVersion: networking.istio.io/v1
kind: DestinationRule
metadata:
  name: reviews
  namespace: bookinfo
spec:
  host: reviews
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: ignored
  namespace: bookinfo
"#;

    #[test]
    fn manifests_decode_by_kind() {
        let snapshot = Snapshot::from_manifests("east", MANIFESTS).unwrap();
        assert!(snapshot.has_namespace("bookinfo"));
        assert_eq!(snapshot.services.len(), 1);
        assert_eq!(snapshot.workloads.len(), 1);
        assert_eq!(snapshot.destination_rules.len(), 1);
        assert_eq!(snapshot.destination_rules[0].metadata.cluster, "east");
        assert_eq!(snapshot.object_count(), 1);
    }

    #[test]
    fn broken_document_reports_position() {
        let err = Snapshot::from_manifests(
            "east",
            "kind: Gateway\nmetadata:\n  name: gw\nspec:\n  servers: 12\n",
        )
        .unwrap_err();
        match err {
            Error::Manifest { document, kind, .. } => {
                assert_eq!(document, 0);
                assert_eq!(kind, "Gateway");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn document_without_kind_is_rejected() {
        assert!(Snapshot::from_manifests("east", "metadata:\n  name: x\n").is_err());
    }

    #[test]
    fn finalize_registers_object_namespaces() {
        let mut snapshot = Snapshot::new("east");
        snapshot.destination_rules.push(DestinationRule::new(
            ObjectMeta::new("reviews", "travel"),
            DestinationRuleSpec::default(),
        ));
        snapshot.finalize();
        assert!(snapshot.has_namespace("travel"));
        assert_eq!(snapshot.destination_rules[0].metadata.cluster, "east");
    }

    #[test]
    fn registry_lookup_covers_services_and_entries() {
        let mut snapshot = Snapshot::from_manifests("east", MANIFESTS).unwrap();
        snapshot.service_entries.push(ServiceEntry::new(
            ObjectMeta::new("external", "bookinfo"),
            ServiceEntrySpec {
                hosts: vec!["*.googleapis.com".to_string()],
                ..Default::default()
            },
        ));
        let parser = snapshot.host_parser("cluster.local");

        let reviews = parser.parse("reviews", "bookinfo", "east");
        assert!(snapshot.host_in_registry(&reviews, "reviews"));

        let missing = parser.parse("ratings", "bookinfo", "east");
        assert!(!snapshot.host_in_registry(&missing, "ratings"));

        let wildcard = parser.parse("*.bookinfo", "bookinfo", "east");
        assert!(snapshot.host_in_registry(&wildcard, "*.bookinfo"));

        let api = parser.parse("storage.googleapis.com", "bookinfo", "east");
        assert!(snapshot.host_in_registry(&api, "storage.googleapis.com"));
    }

    #[test]
    fn principals_follow_service_accounts() {
        let snapshot = Snapshot::from_manifests("east", MANIFESTS).unwrap();
        let principals = snapshot.principals("cluster.local");
        assert!(principals.contains("cluster.local/ns/bookinfo/sa/bookinfo-reviews"));
    }
}
