//! Events emitted while reconciling

use super::executor::Operation;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{trace, warn};

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Desired state built
    DesiredStateBuilt { bindings: usize, aliases: usize },

    /// Reconciliation of a target started
    TargetStarted { target: String },

    /// A store call changed the target
    OperationApplied { target: String, operation: Operation },

    /// A store call found the target already in the desired state
    OperationAlreadySatisfied { target: String, operation: Operation },

    /// Target holds the desired record set
    TargetConverged {
        target: String,
        applied: usize,
        already_satisfied: usize,
    },

    /// Target pass aborted
    TargetFailed { target: String, error: String },
}

/// Non-blocking sender side of the event channel
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ReconcileEvent>,
}

impl EventSink {
    /// Create a sink and the receiver that drains it
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ReconcileEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Emit an event, dropping it if nobody keeps up
    pub fn emit(&self, event: ReconcileEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing eventChannelCapacity.");
            }
            // Receiver dropped; nobody is listening
            Err(TrySendError::Closed(_)) => trace!("Event receiver closed"),
        }
    }
}
