//! Effective mTLS status for a mesh
//!
//! PeerAuthentications say what a workload accepts; DestinationRules say what
//! callers originate. Both can be declared per workload, per namespace and for
//! the whole mesh (the root namespace). This crate extracts the mode declared
//! at each scope ([`MtlsContext`]) and combines them by precedence
//! ([`MtlsResolver`]).

pub mod context;
pub mod resolver;
pub mod status;

pub use context::MtlsContext;
pub use resolver::MtlsResolver;
pub use status::{MtlsStatus, ScopeStatus};
