// # dnsync-core
//
// Core library for the dnsync reconciliation system.
//
// ## Architecture Overview
//
// This library keeps DNS record stores in line with two sources of truth:
// - **FixedIpSource**: Trait for fetching fixed-IP clients (A-records)
// - **AliasSource**: Trait for fetching proxied domain names (CNAME-records)
// - **RecordStore**: Trait for listing and mutating records on one target
// - **DesiredStateBuilder**: Merges both sources into one desired record set
// - **DiffResult**: Pure set difference between desired and actual
// - **Reconciler**: Runs fetch → diff → converge for every target
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from API clients
// 2. **Single Pass**: One run converges every target and exits
// 3. **Target Isolation**: A failing target never stops the others
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Idempotency**: Re-running against a converged target issues no calls

pub mod traits;
pub mod record;
pub mod desired;
pub mod diff;
pub mod engine;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{AliasSource, FixedIpClient, FixedIpSource, RecordStore};
pub use record::{Alias, Binding, RecordSet, StoreOutcome};
pub use desired::{DesiredStateBuilder, normalize_hostname};
pub use diff::{Diff, DiffResult};
pub use engine::{ReconcileEvent, Reconciler, RunReport, TargetReport};
pub use config::{AppConfig, EngineConfig, NamingConfig, TargetConfig};
pub use error::{Error, Result};
