//! Test doubles and common utilities for reconciliation contract tests
//!
//! The mock record store keeps a real in-memory record set, so creates and
//! deletes change what later listings return, and records every call made
//! against it.

#![allow(dead_code)]

use dnsync_core::engine::Operation;
use dnsync_core::error::{Error, Result};
use dnsync_core::traits::{AliasSource, FixedIpClient, FixedIpSource, RecordStore};
use dnsync_core::{Alias, Binding, EngineConfig, NamingConfig, RecordSet, StoreOutcome};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A call made against a MockRecordStore
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Authenticate,
    ListBindings,
    ListAliases,
    Mutate(Operation),
}

/// An in-memory record store that tracks calls
pub struct MockRecordStore {
    name: String,
    /// What the store really holds
    state: Mutex<RecordSet>,
    /// Records present in the store but missing from listings
    hidden: Mutex<RecordSet>,
    calls: Mutex<Vec<Call>>,
    fail_auth: bool,
    fail_list: bool,
    fail_on: Option<Operation>,
}

impl MockRecordStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(RecordSet::default()),
            hidden: Mutex::new(RecordSet::default()),
            calls: Mutex::new(Vec::new()),
            fail_auth: false,
            fail_list: false,
            fail_on: None,
        }
    }

    pub fn with_bindings(self, pairs: &[(&str, &str)]) -> Self {
        self.state
            .lock()
            .unwrap()
            .bindings
            .extend(pairs.iter().map(|(h, ip)| Binding::new(*h, *ip)));
        self
    }

    pub fn with_aliases(self, pairs: &[(&str, &str)]) -> Self {
        self.state
            .lock()
            .unwrap()
            .aliases
            .extend(pairs.iter().map(|(a, t)| Alias::new(*a, *t)));
        self
    }

    /// A binding another writer added after this store was listed
    pub fn with_unlisted_binding(self, hostname: &str, ip: &str) -> Self {
        self.hidden
            .lock()
            .unwrap()
            .bindings
            .insert(Binding::new(hostname, ip));
        self
    }

    pub fn failing_auth(mut self) -> Self {
        self.fail_auth = true;
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_on(mut self, op: Operation) -> Self {
        self.fail_on = Some(op);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Only the mutating calls, in order
    pub fn mutations(&self) -> Vec<Operation> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Mutate(op) => Some(op),
                _ => None,
            })
            .collect()
    }

    /// Everything the store holds, listed or not
    pub fn records(&self) -> RecordSet {
        let state = self.state.lock().unwrap();
        let hidden = self.hidden.lock().unwrap();
        RecordSet::new(
            state.bindings.union(&hidden.bindings).cloned().collect(),
            state.aliases.union(&hidden.aliases).cloned().collect(),
        )
    }

    fn record_call(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn mutate(&self, op: Operation) -> Result<StoreOutcome> {
        self.record_call(Call::Mutate(op.clone()));

        if self.fail_on.as_ref() == Some(&op) {
            return Err(Error::operation(&self.name, op.label(), &op, "HTTP 500"));
        }

        let mut state = self.state.lock().unwrap();
        let mut hidden = self.hidden.lock().unwrap();
        let changed = match op {
            Operation::CreateBinding(b) => {
                !hidden.bindings.remove(&b) & state.bindings.insert(b)
            }
            Operation::DeleteBinding(b) => {
                hidden.bindings.remove(&b) | state.bindings.remove(&b)
            }
            Operation::CreateAlias(a) => {
                !hidden.aliases.remove(&a) & state.aliases.insert(a)
            }
            Operation::DeleteAlias(a) => hidden.aliases.remove(&a) | state.aliases.remove(&a),
        };

        Ok(if changed {
            StoreOutcome::Applied
        } else {
            StoreOutcome::AlreadyInDesiredState
        })
    }
}

#[async_trait::async_trait]
impl RecordStore for MockRecordStore {
    fn target_name(&self) -> &str {
        &self.name
    }

    async fn authenticate(&self) -> Result<()> {
        self.record_call(Call::Authenticate);
        if self.fail_auth {
            return Err(Error::target_auth(&self.name, "password incorrect"));
        }
        Ok(())
    }

    async fn list_bindings(&self) -> Result<Vec<Binding>> {
        self.record_call(Call::ListBindings);
        if self.fail_list {
            return Err(Error::http("503 Service Unavailable"));
        }
        Ok(self.state.lock().unwrap().bindings.iter().cloned().collect())
    }

    async fn list_aliases(&self) -> Result<Vec<Alias>> {
        self.record_call(Call::ListAliases);
        if self.fail_list {
            return Err(Error::http("503 Service Unavailable"));
        }
        Ok(self.state.lock().unwrap().aliases.iter().cloned().collect())
    }

    async fn create_binding(&self, binding: &Binding) -> Result<StoreOutcome> {
        self.mutate(Operation::CreateBinding(binding.clone()))
    }

    async fn delete_binding(&self, binding: &Binding) -> Result<StoreOutcome> {
        self.mutate(Operation::DeleteBinding(binding.clone()))
    }

    async fn create_alias(&self, alias: &Alias) -> Result<StoreOutcome> {
        self.mutate(Operation::CreateAlias(alias.clone()))
    }

    async fn delete_alias(&self, alias: &Alias) -> Result<StoreOutcome> {
        self.mutate(Operation::DeleteAlias(alias.clone()))
    }
}

/// A fixed-IP source returning a canned client list
pub struct StaticFixedIpSource {
    clients: Vec<FixedIpClient>,
    fail: bool,
    pub fetch_count: Arc<AtomicUsize>,
}

impl StaticFixedIpSource {
    pub fn new(clients: Vec<FixedIpClient>) -> Self {
        Self {
            clients,
            fail: false,
            fetch_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fixed-IP clients from (name, ip) pairs
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(name, ip)| FixedIpClient::new(*name, *ip, true))
                .collect(),
        )
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }
}

#[async_trait::async_trait]
impl FixedIpSource for StaticFixedIpSource {
    async fn fetch_fixed_ip_clients(&self) -> Result<Vec<FixedIpClient>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::source_fetch("static", "target site not found"));
        }
        Ok(self.clients.clone())
    }

    fn source_name(&self) -> &'static str {
        "static-fixed-ip"
    }
}

/// An alias source returning a canned domain list
pub struct StaticAliasSource {
    domains: Vec<String>,
    fail: bool,
}

impl StaticAliasSource {
    pub fn new(domains: &[&str]) -> Self {
        Self {
            domains: domains.iter().map(|d| d.to_string()).collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            domains: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait::async_trait]
impl AliasSource for StaticAliasSource {
    async fn fetch_domain_names(&self) -> Result<Vec<String>> {
        if self.fail {
            return Err(Error::http("connection refused"));
        }
        Ok(self.domains.clone())
    }

    fn source_name(&self) -> &'static str {
        "static-alias"
    }
}

/// Naming used throughout the contract tests
pub fn naming() -> NamingConfig {
    NamingConfig {
        local_domain: "home.arpa".to_string(),
        edge_host: "edge".to_string(),
        filter_domain: "example.com".to_string(),
    }
}

/// Engine settings with the given target concurrency
pub fn engine_config(max_concurrent_targets: usize) -> EngineConfig {
    EngineConfig {
        max_concurrent_targets,
        ..EngineConfig::default()
    }
}

/// Upcast for the reconciler's target list
pub fn as_target(store: &Arc<MockRecordStore>) -> Arc<dyn RecordStore> {
    Arc::clone(store) as Arc<dyn RecordStore>
}

pub fn binding_set(pairs: &[(&str, &str)]) -> BTreeSet<Binding> {
    pairs.iter().map(|(h, ip)| Binding::new(*h, *ip)).collect()
}
