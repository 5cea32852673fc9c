//! Record types shared by every layer
//!
//! Both record kinds compare by exact string equality on all fields, so a
//! binding whose IP differs from the desired one is a different record
//! (one removal plus one addition), never an update in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A DNS A-record: fully qualified hostname to IP address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Binding {
    /// Fully qualified hostname
    pub hostname: String,
    /// IPv4 address as text
    pub ip_address: String,
}

impl Binding {
    pub fn new(hostname: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ip_address: ip_address.into(),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.hostname, self.ip_address)
    }
}

/// A DNS CNAME-record: alias name to canonical target
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Alias {
    /// The hostname being redirected
    pub alias: String,
    /// The canonical name it resolves to
    pub target: String,
}

impl Alias {
    pub fn new(alias: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.alias, self.target)
    }
}

/// A full record set (desired or actual) for one target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    pub bindings: BTreeSet<Binding>,
    pub aliases: BTreeSet<Alias>,
}

impl RecordSet {
    pub fn new(bindings: BTreeSet<Binding>, aliases: BTreeSet<Alias>) -> Self {
        Self { bindings, aliases }
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.aliases.is_empty()
    }
}

/// Outcome of a single mutation against a record store
///
/// Failures travel as `Err`, so together with `Result` this forms the
/// applied / already-satisfied / failed tri-state the executor reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The store changed
    Applied,
    /// The store already held (create) or lacked (delete) the record
    AlreadyInDesiredState,
}
