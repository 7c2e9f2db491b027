//! Reconciliation outcomes

use crate::model::{Annotations, Identity, ObservedState};
use crate::state::ConvergenceState;
use serde::{Deserialize, Serialize};

/// Corrective action taken during one reconciliation tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Remote counterpart was created
    Create,
    /// Full desired configuration was pushed
    Update,
    /// Remote counterpart was removed
    Delete,
    /// Already converged
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Result of reconciling one declared resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub identity: Identity,

    pub action: ActionType,

    /// State the instance ended in
    pub state: ConvergenceState,

    /// Drift explanation from the observe step, empty when nothing was observed
    pub diff: String,

    /// Values the caller must persist on the declared resource
    pub annotations: Annotations,

    pub observed: Option<ObservedState>,

    pub duration_ms: u64,
}

impl ReconcileOutcome {
    /// Whether the caller should schedule another tick soon
    pub fn needs_requeue(&self) -> bool {
        self.action != ActionType::NoOp && self.state != ConvergenceState::Gone
    }
}

/// A resource that could not be reconciled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileFailure {
    pub name: String,
    pub error: String,
}

/// Result of reconciling a batch of resources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub outcomes: Vec<ReconcileOutcome>,

    pub failures: Vec<ReconcileFailure>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ReconcileSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn add_outcome(&mut self, outcome: ReconcileOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn add_failure(&mut self, name: String, error: String) {
        self.failures.push(ReconcileFailure { name, error });
    }

    pub fn count(&self, action: ActionType) -> usize {
        self.outcomes.iter().filter(|o| o.action == action).count()
    }

    pub fn outcome(&self, name: &str) -> Option<&ReconcileOutcome> {
        self.outcomes.iter().find(|o| o.identity.name == name)
    }
}

impl std::fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted, {} unchanged, {} failed",
            self.count(ActionType::Create),
            self.count(ActionType::Update),
            self.count(ActionType::Delete),
            self.count(ActionType::NoOp),
            self.failures.len()
        )
    }
}
