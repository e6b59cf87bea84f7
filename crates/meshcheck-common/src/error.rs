//! Error types for meshcheck
//!
//! Validation findings are data and never surface here. These errors cover
//! the boundary only: configuration that cannot be loaded, manifests that
//! cannot be decoded into typed objects, and output that cannot be rendered.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for meshcheck operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unreadable validation configuration
    #[error("config error: {message}")]
    Config {
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "rootNamespace")
        field: Option<String>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The object kind being serialized (if known)
        kind: Option<String>,
    },

    /// A manifest document that could not be decoded
    #[error("manifest error in document {document} [{kind}]: {message}")]
    Manifest {
        /// Description of what failed
        message: String,
        /// Zero-based index of the document in the manifest stream
        document: usize,
        /// Declared kind of the document
        kind: String,
    },
}

impl Error {
    /// Create a config error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a config error pointing at a specific field
    pub fn config_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with object kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a manifest error for a document whose kind is not known
    pub fn manifest(document: usize, msg: impl Into<String>) -> Self {
        Self::Manifest {
            message: msg.into(),
            document,
            kind: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create a manifest error for a document of a known kind
    pub fn manifest_for_kind(
        document: usize,
        kind: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Manifest {
            message: msg.into(),
            document,
            kind: kind.into(),
        }
    }

    /// Get the offending field or kind, if this error carries one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Config { field, .. } => field.as_deref(),
            Error::Serialization { kind, .. } => kind.as_deref(),
            Error::Manifest { kind, .. } => Some(kind),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::serialization(e.to_string())
    }
}

impl From<crate::yaml::YamlError> for Error {
    fn from(e: crate::yaml::YamlError) -> Self {
        Error::serialization_for_kind("yaml", e.to_string())
    }
}
