//! Core traits for the dnsync system
//!
//! This module defines the abstract interfaces that all collaborators implement.
//!
//! - [`RecordStore`]: Read and mutate records on one target
//! - [`FixedIpSource`]: Fixed-IP clients from a network controller
//! - [`AliasSource`]: Domain names from a reverse-proxy manager

pub mod record_store;
pub mod sources;

pub use record_store::RecordStore;
pub use sources::{AliasSource, FixedIpClient, FixedIpSource};
