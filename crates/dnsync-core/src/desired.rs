//! Desired-state builder
//!
//! Turns the raw output of the two sources of truth into the canonical
//! record set every target converges toward.
//!
//! ## Hostname collisions
//!
//! Two fixed-IP clients whose names normalize to the same hostname collapse
//! into one binding, and the client listed last wins. The collision is
//! logged but the earlier client silently drops out of DNS, so give such
//! clients distinct notes on the controller.

use crate::config::NamingConfig;
use crate::record::{Alias, Binding, RecordSet};
use crate::traits::FixedIpClient;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Mis-encoded right single quote (UTF-8 bytes of U+2019 read as CP-1252)
const MOJIBAKE_APOSTROPHE: &str = "â€™";

/// Turn a client name into a DNS label
///
/// Lowercases, then replaces whitespace, `'`, `:`, `,`, `_` and the
/// mis-encoded apostrophe with `-`. Every other character is kept.
pub fn normalize_hostname(name: &str) -> String {
    name.to_lowercase()
        .replace(MOJIBAKE_APOSTROPHE, "-")
        .chars()
        .map(|c| match c {
            '\'' | ':' | ',' | '_' => '-',
            c if c.is_ascii_whitespace() => '-',
            c => c,
        })
        .collect()
}

/// Builds the desired record set from source data
#[derive(Debug, Clone)]
pub struct DesiredStateBuilder<'a> {
    naming: &'a NamingConfig,
}

impl<'a> DesiredStateBuilder<'a> {
    pub fn new(naming: &'a NamingConfig) -> Self {
        Self { naming }
    }

    /// Canonical name every alias points at
    pub fn alias_target(&self) -> String {
        format!("{}.{}", self.naming.edge_host, self.naming.local_domain)
    }

    /// Bindings for every client with a fixed-IP reservation
    pub fn bindings(&self, clients: &[FixedIpClient]) -> Vec<Binding> {
        let mut by_hostname: BTreeMap<String, String> = BTreeMap::new();

        for client in clients.iter().filter(|c| c.fixed_ip) {
            let label = normalize_hostname(client.display_name());
            if label.is_empty() {
                warn!("Fixed-IP client {} has no usable name, skipping", client.ip);
                continue;
            }

            let hostname = format!("{}.{}", label, self.naming.local_domain);
            if let Some(previous_ip) = by_hostname.insert(hostname.clone(), client.ip.clone()) {
                warn!(
                    "Hostname {} claimed by {} and {}; keeping {}",
                    hostname, previous_ip, client.ip, client.ip
                );
            }
        }

        by_hostname
            .into_iter()
            .map(|(hostname, ip)| Binding::new(hostname, ip))
            .collect()
    }

    /// Aliases for every domain under the filter suffix
    pub fn aliases(&self, domains: &[String]) -> Vec<Alias> {
        let target = self.alias_target();

        domains
            .iter()
            .filter(|domain| {
                let managed = domain.ends_with(&self.naming.filter_domain);
                if !managed {
                    debug!("Domain {} is outside {}, ignoring", domain, self.naming.filter_domain);
                }
                managed
            })
            .map(|domain| Alias::new(domain.clone(), target.clone()))
            .collect()
    }

    /// The complete desired record set
    pub fn build(&self, clients: &[FixedIpClient], domains: &[String]) -> RecordSet {
        RecordSet::new(
            self.bindings(clients).into_iter().collect(),
            self.aliases(domains).into_iter().collect(),
        )
    }
}
