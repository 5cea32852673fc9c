// # Source Traits
//
// The two sources of truth the desired record set is built from.
//
// ## Implementations
//
// - Fixed-IP clients: `dnsync-source-unifi` crate
// - Proxy domain names: `dnsync-source-npm` crate

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A network client as reported by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedIpClient {
    /// Primary client name
    pub name: String,
    /// Optional display note; takes precedence over `name` when non-empty
    pub note: Option<String>,
    /// Reserved IP address
    pub ip: String,
    /// Whether the controller has a fixed-IP reservation for this client
    pub fixed_ip: bool,
}

impl FixedIpClient {
    pub fn new(name: impl Into<String>, ip: impl Into<String>, fixed_ip: bool) -> Self {
        Self {
            name: name.into(),
            note: None,
            ip: ip.into(),
            fixed_ip,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// The name the hostname is derived from: a non-empty note, else the name
    pub fn display_name(&self) -> &str {
        match self.note.as_deref() {
            Some(note) if !note.is_empty() => note,
            _ => &self.name,
        }
    }
}

/// Source of fixed-IP client bindings
///
/// Returns every client it knows about; filtering on `fixed_ip` belongs to
/// the desired-state builder. Fails with `Error::SourceFetch`.
#[async_trait]
pub trait FixedIpSource: Send + Sync {
    async fn fetch_fixed_ip_clients(&self) -> Result<Vec<FixedIpClient>, crate::Error>;

    /// Source name (for logging)
    fn source_name(&self) -> &'static str;
}

/// Source of externally reachable proxy domain names
///
/// Fails with `Error::SourceFetch`.
#[async_trait]
pub trait AliasSource: Send + Sync {
    async fn fetch_domain_names(&self) -> Result<Vec<String>, crate::Error>;

    /// Source name (for logging)
    fn source_name(&self) -> &'static str;
}
