//! Validation engine for service-mesh configuration
//!
//! Given a [`Snapshot`](meshcheck_common::Snapshot) of mesh objects, the
//! [`ValidationEngine`] reports per-object findings (missing hosts, bad
//! weights, mTLS mismatches) and cross-object conflicts (rules competing for
//! the same host, listener or workload) as one
//! [`ValidationSet`](meshcheck_common::ValidationSet).

pub mod checker;
pub mod checkers;
pub mod conflict;
pub mod engine;

pub use checker::{CheckContext, ObjectChecker};
pub use engine::ValidationEngine;
