//! Common types for meshcheck: typed mesh objects, hosts, validation results

#![deny(missing_docs)]

pub mod check;
pub mod config;
pub mod crd;
pub mod error;
pub mod host;
pub mod mesh;
pub mod snapshot;
pub mod telemetry;
pub mod validation;
pub mod yaml;

pub use check::{Check, Severity};
pub use config::ValidationConfig;
pub use error::Error;
pub use host::{Host, HostParser};
pub use snapshot::Snapshot;
pub use validation::{Finding, Validation, ValidationKey, ValidationSet, ValidationSummary};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
