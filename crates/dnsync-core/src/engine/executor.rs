//! Convergence executor
//!
//! Applies a [`DiffResult`] to one target, one store call at a time, in a
//! fixed order: binding creates, binding deletes, alias creates, alias
//! deletes. New records land before stale ones are pulled, so a renamed or
//! re-addressed host is never left without any record for longer than one
//! call.
//!
//! The first failed call stops the target. Nothing already applied is
//! rolled back: every applied call moved the store toward the desired state.

use super::events::{EventSink, ReconcileEvent};
use crate::diff::DiffResult;
use crate::error::{Error, Result};
use crate::record::{Alias, Binding, StoreOutcome};
use crate::traits::RecordStore;
use std::fmt;
use tracing::{debug, info};

/// A single store mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateBinding(Binding),
    DeleteBinding(Binding),
    CreateAlias(Alias),
    DeleteAlias(Alias),
}

impl Operation {
    /// Short label used in logs and errors
    pub fn label(&self) -> &'static str {
        match self {
            Operation::CreateBinding(_) => "create binding",
            Operation::DeleteBinding(_) => "delete binding",
            Operation::CreateAlias(_) => "create alias",
            Operation::DeleteAlias(_) => "delete alias",
        }
    }

    fn record(&self) -> String {
        match self {
            Operation::CreateBinding(b) | Operation::DeleteBinding(b) => b.to_string(),
            Operation::CreateAlias(a) | Operation::DeleteAlias(a) => a.to_string(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.label(), self.record())
    }
}

/// Every operation needed to apply `diff`, in execution order
pub fn plan(diff: &DiffResult) -> Vec<Operation> {
    let mut ops = Vec::with_capacity(diff.operation_count());
    ops.extend(diff.bindings.to_add.iter().cloned().map(Operation::CreateBinding));
    ops.extend(diff.bindings.to_remove.iter().cloned().map(Operation::DeleteBinding));
    ops.extend(diff.aliases.to_add.iter().cloned().map(Operation::CreateAlias));
    ops.extend(diff.aliases.to_remove.iter().cloned().map(Operation::DeleteAlias));
    ops
}

/// Counts of completed operations for one target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvergenceSummary {
    /// Calls that changed the store
    pub applied: usize,
    /// Calls the store answered with "already exists" / "already gone"
    pub already_satisfied: usize,
}

impl ConvergenceSummary {
    pub fn completed(&self) -> usize {
        self.applied + self.already_satisfied
    }
}

/// Applies operations to a single target
pub struct ConvergenceExecutor<'a> {
    store: &'a dyn RecordStore,
    events: &'a EventSink,
    summary: ConvergenceSummary,
}

impl<'a> ConvergenceExecutor<'a> {
    pub fn new(store: &'a dyn RecordStore, events: &'a EventSink) -> Self {
        Self {
            store,
            events,
            summary: ConvergenceSummary::default(),
        }
    }

    /// Progress so far (also meaningful after a failure)
    pub fn summary(&self) -> ConvergenceSummary {
        self.summary
    }

    /// Apply the whole diff, stopping at the first failed call
    pub async fn apply_all(&mut self, diff: &DiffResult) -> Result<()> {
        for op in plan(diff) {
            self.apply(&op).await?;
        }
        Ok(())
    }

    /// Apply one operation and record its outcome
    pub async fn apply(&mut self, op: &Operation) -> Result<StoreOutcome> {
        let store = self.store;
        let target = store.target_name();

        let outcome = match op {
            Operation::CreateBinding(b) => store.create_binding(b).await,
            Operation::DeleteBinding(b) => store.delete_binding(b).await,
            Operation::CreateAlias(a) => store.create_alias(a).await,
            Operation::DeleteAlias(a) => store.delete_alias(a).await,
        }
        .map_err(|e| match e {
            Error::Operation { .. } => e,
            other => Error::operation(target, op.label(), op.record(), other.to_string()),
        })?;

        match outcome {
            StoreOutcome::Applied => {
                info!("[{}] {}", target, op);
                self.summary.applied += 1;
                self.events.emit(ReconcileEvent::OperationApplied {
                    target: target.to_string(),
                    operation: op.clone(),
                });
            }
            StoreOutcome::AlreadyInDesiredState => {
                debug!("[{}] {} already in desired state", target, op);
                self.summary.already_satisfied += 1;
                self.events.emit(ReconcileEvent::OperationAlreadySatisfied {
                    target: target.to_string(),
                    operation: op.clone(),
                });
            }
        }

        Ok(outcome)
    }
}
