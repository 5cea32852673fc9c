//! Error types for the dnsync system
//!
//! The variants mirror the units of work that can fail: building the
//! desired state (fatal to the run) and reconciling a single target
//! (fatal to that target only).

use thiserror::Error;

/// Result type alias for dnsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dnsync system
#[derive(Error, Debug)]
pub enum Error {
    /// A source of truth (fixed-IP controller or proxy manager) failed
    #[error("Source fetch failed ({source_name}): {message}")]
    SourceFetch {
        /// Which source failed (e.g. "unifi", "nginx-proxy-manager")
        source_name: String,
        /// Error message
        message: String,
    },

    /// A target record store rejected authentication
    #[error("Authentication to target {target} failed: {message}")]
    TargetAuth {
        /// Target name
        target: String,
        /// Error message
        message: String,
    },

    /// A target's current record set could not be listed
    #[error("Listing records on target {target} failed: {message}")]
    TargetList {
        /// Target name
        target: String,
        /// Error message
        message: String,
    },

    /// A single create/delete call failed
    #[error("{operation} {record} on target {target} failed: {message}")]
    Operation {
        /// Target name
        target: String,
        /// Operation label (e.g. "create binding")
        operation: String,
        /// The record the operation was applied to
        record: String,
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (reading the configuration file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a source fetch error
    pub fn source_fetch(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceFetch {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a target authentication error
    pub fn target_auth(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TargetAuth {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a target listing error
    pub fn target_list(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TargetList {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create an operation error
    pub fn operation(
        target: impl Into<String>,
        operation: impl Into<String>,
        record: impl std::fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Self::Operation {
            target: target.into(),
            operation: operation.into(),
            record: record.to_string(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Whether this error aborts the whole run rather than a single target
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, Self::SourceFetch { .. } | Self::Config(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
