//! Combining declared modes into an effective mTLS status
//!
//! The resolver is pure: it only sees the modes already extracted for a
//! scope. [`crate::MtlsContext`] is what finds those modes in a snapshot.

use meshcheck_common::crd::PolicyMode;

use crate::status::{MtlsStatus, ScopeStatus};

/// Resolves DestinationRule/PeerAuthentication mode pairs into statuses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MtlsResolver {
    auto_mtls_enabled: bool,
    allow_permissive: bool,
}

impl MtlsResolver {
    /// Create a resolver
    pub fn new(auto_mtls_enabled: bool, allow_permissive: bool) -> Self {
        Self {
            auto_mtls_enabled,
            allow_permissive,
        }
    }

    /// Whether sidecars choose mTLS on their own
    pub fn auto_mtls_enabled(&self) -> bool {
        self.auto_mtls_enabled
    }

    fn accepts_mtls(&self, pa: PolicyMode) -> bool {
        pa == PolicyMode::Strict || (self.allow_permissive && pa == PolicyMode::Permissive)
    }

    /// Combine the modes declared at a single scope.
    pub fn final_status(&self, dr: PolicyMode, pa: PolicyMode) -> ScopeStatus {
        let auto_fills_dr = dr == PolicyMode::Unset && self.auto_mtls_enabled;
        let mtls_enabled = dr.originates_mtls() || auto_fills_dr;
        let mtls_disabled = dr == PolicyMode::Disable || auto_fills_dr;

        let status = if self.accepts_mtls(pa) && mtls_enabled {
            MtlsStatus::Enabled
        } else if pa == PolicyMode::Disable && mtls_disabled {
            MtlsStatus::Disabled
        } else if pa == PolicyMode::Unset && dr == PolicyMode::Unset {
            MtlsStatus::NotEnabled
        } else {
            MtlsStatus::PartiallyEnabled
        };

        ScopeStatus {
            dr_mode: dr,
            pa_mode: pa,
            status,
        }
    }

    /// Overall status of a namespace given its own and the mesh's scope status.
    ///
    /// A fully defined namespace wins. A partial namespace borrows whichever
    /// side it leaves unset from the mesh and is evaluated once more; the
    /// mesh is consulted at most once, so this never recurses.
    pub fn overall_status(&self, namespace: &ScopeStatus, mesh: &ScopeStatus) -> MtlsStatus {
        if namespace.status.is_fully_defined() {
            return namespace.status;
        }

        if namespace.status == MtlsStatus::PartiallyEnabled {
            let dr = if namespace.dr_mode.is_set() {
                namespace.dr_mode
            } else {
                mesh.dr_mode
            };
            let pa = if namespace.pa_mode.is_set() {
                namespace.pa_mode
            } else {
                mesh.pa_mode
            };
            return self.final_status(dr, pa).status;
        }

        self.mesh_fallback(mesh)
    }

    fn mesh_fallback(&self, mesh: &ScopeStatus) -> MtlsStatus {
        if mesh.status.is_fully_defined() {
            return mesh.status;
        }
        if mesh.is_undeclared() {
            return MtlsStatus::NotEnabled;
        }

        let (dr, pa) = (mesh.dr_mode, mesh.pa_mode);
        let half_disabled = (dr == PolicyMode::Disable && !pa.is_set())
            || (pa == PolicyMode::Disable && !dr.is_set());
        if half_disabled {
            return MtlsStatus::Disabled;
        }

        if self.auto_mtls_enabled {
            let pa_only = !dr.is_set() && self.accepts_mtls(pa);
            let dr_only = dr == PolicyMode::IstioMutual && !pa.is_set();
            if pa_only || dr_only {
                return MtlsStatus::Enabled;
            }
        }

        MtlsStatus::PartiallyEnabled
    }

    /// Status of a workload from its own PeerAuthentication mode.
    ///
    /// `dr_modes` are the TLS modes of DestinationRules targeting the
    /// workload's services; they only matter when the workload is PERMISSIVE.
    /// `None` means the workload has no policy of its own and inherits.
    pub fn workload_status(&self, pa: PolicyMode, dr_modes: &[PolicyMode]) -> Option<MtlsStatus> {
        match pa {
            PolicyMode::Strict => Some(MtlsStatus::Enabled),
            PolicyMode::Disable => Some(MtlsStatus::Disabled),
            PolicyMode::Permissive => Some(if dr_modes.is_empty() {
                MtlsStatus::NotEnabled
            } else if dr_modes.iter().any(|m| m.originates_mtls()) {
                MtlsStatus::Enabled
            } else if dr_modes.contains(&PolicyMode::Disable) {
                MtlsStatus::Disabled
            } else {
                MtlsStatus::NotEnabled
            }),
            _ => None,
        }
    }
}
