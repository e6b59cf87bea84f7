//! Cross-object conflict detection
//!
//! Each detector looks at every object of a kind at once and reports the
//! ones that compete for the same host, listener or workload, linking the
//! competitors to each other.

pub mod destination;
pub mod listener;
pub mod scope;

pub use destination::DestinationConflicts;
pub use listener::{hostname_matches, hosts_overlap, ListenerConflicts};
pub use scope::{ScopeConflicts, Scoped};
