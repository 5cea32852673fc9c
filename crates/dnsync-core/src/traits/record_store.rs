// # Record Store Trait
//
// Defines the interface for reading and mutating A and CNAME records on
// one DNS server instance (a "target").
//
// ## Implementations
//
// - Pi-hole v6: `dnsync-store-pihole` crate
//
// ## Usage
//
// ```rust,ignore
// use dnsync_core::{Binding, RecordStore};
//
// async fn example(store: &dyn RecordStore) -> dnsync_core::Result<()> {
//     store.authenticate().await?;
//     let current = store.list_bindings().await?;
//     store.create_binding(&Binding::new("nas.home.arpa", "10.0.0.5")).await?;
//     Ok(())
// }
// ```

use crate::record::{Alias, Binding, StoreOutcome};
use async_trait::async_trait;

/// Trait for record store implementations
///
/// One instance represents one target. The instance owns its session
/// (token, cookie, expiry): it must never read or invalidate the session of
/// another instance, and callers must not drive one instance from more than
/// one reconciliation at a time.
///
/// # Idempotent mutations
///
/// Creating a record that already exists, or deleting one that is already
/// gone, returns `Ok(StoreOutcome::AlreadyInDesiredState)`. Implementations
/// translate their transport-specific signals (status codes, error bodies)
/// into that outcome so the executor never inspects raw responses.
///
/// # No retries
///
/// Implementations perform a single call per method and return the error;
/// the reconciler decides what a failure means for the target.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Name of the target (for logging and error context)
    fn target_name(&self) -> &str;

    /// Ensure a valid session exists
    ///
    /// Reuses the cached session while it is unexpired, otherwise logs in
    /// again. Fails with `Error::TargetAuth`.
    async fn authenticate(&self) -> Result<(), crate::Error>;

    /// List current A-records. Fails with `Error::TargetList`.
    async fn list_bindings(&self) -> Result<Vec<Binding>, crate::Error>;

    /// List current CNAME-records. Fails with `Error::TargetList`.
    async fn list_aliases(&self) -> Result<Vec<Alias>, crate::Error>;

    async fn create_binding(&self, binding: &Binding) -> Result<StoreOutcome, crate::Error>;

    async fn delete_binding(&self, binding: &Binding) -> Result<StoreOutcome, crate::Error>;

    async fn create_alias(&self, alias: &Alias) -> Result<StoreOutcome, crate::Error>;

    async fn delete_alias(&self, alias: &Alias) -> Result<StoreOutcome, crate::Error>;
}
