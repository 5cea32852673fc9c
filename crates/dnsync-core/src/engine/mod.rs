//! Reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Building the desired record set from the two sources of truth
//! - Fetching each target's actual record set
//! - Diffing desired against actual, per record kind
//! - Converging each target via its RecordStore
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   ┌─────────────┐
//! │ FixedIpSource │   │ AliasSource │
//! └───────────────┘   └─────────────┘
//!         │                  │
//!         └────────┬─────────┘
//!                  ▼
//!        ┌───────────────────┐
//!        │ DesiredStateBuilder│  (once per run)
//!        └───────────────────┘
//!                  │ read-only RecordSet
//!     ┌────────────┼────────────┐
//!     ▼            ▼            ▼
//! ┌────────┐  ┌────────┐   ┌────────┐
//! │target 1│  │target 2│ … │target n│   fetch → diff → converge
//! └────────┘  └────────┘   └────────┘
//! ```
//!
//! ## Failure isolation
//!
//! A source failure aborts the run before any target is touched. A target
//! failure (authentication, listing, or a single store call) ends that
//! target's pass and is recorded in its [`TargetReport`]; other targets are
//! still reconciled.

pub mod events;
pub mod executor;

pub use events::{EventSink, ReconcileEvent};
pub use executor::{ConvergenceExecutor, ConvergenceSummary, Operation};

use crate::config::{EngineConfig, NamingConfig};
use crate::desired::DesiredStateBuilder;
use crate::diff::DiffResult;
use crate::error::{Error, Result};
use crate::record::RecordSet;
use crate::traits::{AliasSource, FixedIpSource, RecordStore};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Result of one target's pass
#[derive(Debug)]
pub struct TargetReport {
    /// Target name
    pub target: String,
    /// Operations the diff called for (0 if the pass failed before diffing)
    pub planned: usize,
    /// Operations completed before the pass ended
    pub summary: ConvergenceSummary,
    /// `Ok` when the target holds the desired record set
    pub outcome: Result<()>,
}

impl TargetReport {
    fn failed(target: &str, planned: usize, summary: ConvergenceSummary, error: Error) -> Self {
        Self {
            target: target.to_string(),
            planned,
            summary,
            outcome: Err(error),
        }
    }

    pub fn is_converged(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Result of a full run, one report per target in configuration order
#[derive(Debug, Default)]
pub struct RunReport {
    pub targets: Vec<TargetReport>,
}

impl RunReport {
    pub fn all_converged(&self) -> bool {
        self.targets.iter().all(TargetReport::is_converged)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets.iter().filter(|r| !r.is_converged())
    }
}

/// Fetch the records a target currently holds
///
/// Authenticates first (reusing the target's cached session when valid),
/// then lists both record kinds. Either failure aborts with an error; a
/// partial listing is never returned.
pub async fn fetch_actual_state(store: &dyn RecordStore) -> Result<RecordSet> {
    let target = store.target_name();

    store.authenticate().await.map_err(|e| match e {
        Error::TargetAuth { .. } => e,
        other => Error::target_auth(target, other.to_string()),
    })?;

    let as_list_error = |e: Error| match e {
        Error::TargetAuth { .. } | Error::TargetList { .. } => e,
        other => Error::target_list(target, other.to_string()),
    };
    let bindings = store.list_bindings().await.map_err(as_list_error)?;
    let aliases = store.list_aliases().await.map_err(as_list_error)?;

    info!(
        "[{}] {} A records, {} CNAME records found",
        target,
        bindings.len(),
        aliases.len()
    );

    Ok(RecordSet::new(
        bindings.into_iter().collect(),
        aliases.into_iter().collect(),
    ))
}

/// Run fetch → diff → converge against a single target
pub async fn reconcile_target(
    store: &dyn RecordStore,
    desired: &RecordSet,
    events: &EventSink,
) -> TargetReport {
    let target = store.target_name();
    info!("Processing DNS on target: {}", target);
    events.emit(ReconcileEvent::TargetStarted {
        target: target.to_string(),
    });

    let actual = match fetch_actual_state(store).await {
        Ok(actual) => actual,
        Err(e) => {
            error!("[{}] {}", target, e);
            events.emit(ReconcileEvent::TargetFailed {
                target: target.to_string(),
                error: e.to_string(),
            });
            return TargetReport::failed(target, 0, ConvergenceSummary::default(), e);
        }
    };

    let diff = DiffResult::compute(desired, &actual);
    info!(
        "[{}] A records: {} to add, {} to remove; CNAME records: {} to add, {} to remove",
        target,
        diff.bindings.to_add.len(),
        diff.bindings.to_remove.len(),
        diff.aliases.to_add.len(),
        diff.aliases.to_remove.len()
    );

    let planned = diff.operation_count();
    let mut executor = ConvergenceExecutor::new(store, events);
    let result = executor.apply_all(&diff).await;
    let summary = executor.summary();

    match result {
        Ok(()) => {
            info!(
                "[{}] Converged ({} applied, {} already in place)",
                target, summary.applied, summary.already_satisfied
            );
            events.emit(ReconcileEvent::TargetConverged {
                target: target.to_string(),
                applied: summary.applied,
                already_satisfied: summary.already_satisfied,
            });
            TargetReport {
                target: target.to_string(),
                planned,
                summary,
                outcome: Ok(()),
            }
        }
        Err(e) => {
            error!(
                "[{}] Aborted after {} of {} operations: {}",
                target,
                summary.completed(),
                planned,
                e
            );
            events.emit(ReconcileEvent::TargetFailed {
                target: target.to_string(),
                error: e.to_string(),
            });
            TargetReport::failed(target, planned, summary, e)
        }
    }
}

/// Core reconciler
///
/// Owns the two sources, the targets, and the naming settings for one run.
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Call [`Reconciler::run()`] once
/// 3. Inspect the returned [`RunReport`]
///
/// ## Concurrency
///
/// With `max_concurrent_targets == 1` targets are processed one after
/// another in configuration order. Higher values run targets as independent
/// tasks, at most that many at a time. Each target is driven by exactly one
/// task, and its operations keep their fixed order either way.
pub struct Reconciler {
    fixed_ip_source: Box<dyn FixedIpSource>,
    alias_source: Box<dyn AliasSource>,
    targets: Vec<Arc<dyn RecordStore>>,
    naming: NamingConfig,
    max_concurrent_targets: usize,
    events: EventSink,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields reconcile events
    pub fn new(
        fixed_ip_source: Box<dyn FixedIpSource>,
        alias_source: Box<dyn AliasSource>,
        targets: Vec<Arc<dyn RecordStore>>,
        naming: NamingConfig,
        engine: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        naming.validate()?;
        engine.validate()?;
        if targets.is_empty() {
            return Err(Error::config("No record store targets configured"));
        }

        let (events, rx) = EventSink::channel(engine.event_channel_capacity);

        let reconciler = Self {
            fixed_ip_source,
            alias_source,
            targets,
            naming,
            max_concurrent_targets: engine.max_concurrent_targets,
            events,
        };

        Ok((reconciler, rx))
    }

    /// Fetch both sources and build the desired record set
    ///
    /// Both fetches must succeed; there is no partial desired state.
    pub async fn build_desired_state(&self) -> Result<RecordSet> {
        let fixed_name = self.fixed_ip_source.source_name();
        let alias_name = self.alias_source.source_name();

        let (clients, domains) = tokio::try_join!(
            async {
                self.fixed_ip_source
                    .fetch_fixed_ip_clients()
                    .await
                    .map_err(|e| as_source_error(fixed_name, e))
            },
            async {
                self.alias_source
                    .fetch_domain_names()
                    .await
                    .map_err(|e| as_source_error(alias_name, e))
            },
        )?;

        let desired = DesiredStateBuilder::new(&self.naming).build(&clients, &domains);
        info!(
            "{} fixed IP clients found, {} CNAME hosts found",
            desired.bindings.len(),
            desired.aliases.len()
        );
        self.events.emit(ReconcileEvent::DesiredStateBuilt {
            bindings: desired.bindings.len(),
            aliases: desired.aliases.len(),
        });

        Ok(desired)
    }

    /// Run one reconciliation pass over every target
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: every target was attempted; check per-target outcomes
    /// - `Err(Error)`: the desired state could not be built, no target was touched
    pub async fn run(&self) -> Result<RunReport> {
        let desired = Arc::new(self.build_desired_state().await?);

        let targets = if self.max_concurrent_targets == 1 || self.targets.len() == 1 {
            self.run_sequential(&desired).await
        } else {
            self.run_concurrent(desired).await
        };

        let report = RunReport { targets };
        for failed in report.failed() {
            warn!("Target {} did not converge", failed.target);
        }
        Ok(report)
    }

    async fn run_sequential(&self, desired: &RecordSet) -> Vec<TargetReport> {
        let mut reports = Vec::with_capacity(self.targets.len());
        for store in &self.targets {
            reports.push(reconcile_target(store.as_ref(), desired, &self.events).await);
        }
        reports
    }

    async fn run_concurrent(&self, desired: Arc<RecordSet>) -> Vec<TargetReport> {
        debug!(
            "Reconciling {} targets, at most {} at a time",
            self.targets.len(),
            self.max_concurrent_targets
        );

        let permits = Arc::new(Semaphore::new(self.max_concurrent_targets));
        let mut tasks = JoinSet::new();

        for (index, store) in self.targets.iter().enumerate() {
            let store = Arc::clone(store);
            let desired = Arc::clone(&desired);
            let events = self.events.clone();
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                // The semaphore is never closed
                let _permit = permits.acquire_owned().await;
                (index, reconcile_target(store.as_ref(), &desired, &events).await)
            });
        }

        let mut slots: Vec<Option<TargetReport>> = self.targets.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => error!("Target task did not complete: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(&self.targets)
            .map(|(slot, store)| {
                slot.unwrap_or_else(|| {
                    TargetReport::failed(
                        store.target_name(),
                        0,
                        ConvergenceSummary::default(),
                        Error::Other("reconciliation task aborted".to_string()),
                    )
                })
            })
            .collect()
    }
}

fn as_source_error(source_name: &str, error: Error) -> Error {
    match error {
        Error::SourceFetch { .. } => error,
        other => Error::source_fetch(source_name, other.to_string()),
    }
}
