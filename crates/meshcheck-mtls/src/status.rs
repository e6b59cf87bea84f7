//! Derived mTLS status values

use std::fmt;

use meshcheck_common::crd::PolicyMode;
use serde::Serialize;

/// Effective transport security at some scope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum MtlsStatus {
    /// Both sides agree on mutual TLS
    #[serde(rename = "MTLS_ENABLED")]
    Enabled,
    /// Both sides agree on plaintext
    #[serde(rename = "MTLS_DISABLED")]
    Disabled,
    /// The sides disagree or only one is declared
    #[serde(rename = "MTLS_PARTIALLY_ENABLED")]
    PartiallyEnabled,
    /// Nothing is declared
    #[serde(rename = "MTLS_NOT_ENABLED")]
    NotEnabled,
}

impl MtlsStatus {
    /// Enabled or Disabled: nothing left to inherit
    pub fn is_fully_defined(self) -> bool {
        matches!(self, MtlsStatus::Enabled | MtlsStatus::Disabled)
    }
}

impl fmt::Display for MtlsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MtlsStatus::Enabled => "MTLS_ENABLED",
            MtlsStatus::Disabled => "MTLS_DISABLED",
            MtlsStatus::PartiallyEnabled => "MTLS_PARTIALLY_ENABLED",
            MtlsStatus::NotEnabled => "MTLS_NOT_ENABLED",
        })
    }
}

/// The two declared modes at one scope and the status they combine to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeStatus {
    /// Mode of the DestinationRule in scope
    pub dr_mode: PolicyMode,
    /// Mode of the PeerAuthentication in scope
    pub pa_mode: PolicyMode,
    /// Combined status
    pub status: MtlsStatus,
}

impl ScopeStatus {
    /// Whether neither side declares anything
    pub fn is_undeclared(&self) -> bool {
        !self.dr_mode.is_set() && !self.pa_mode.is_set()
    }
}
