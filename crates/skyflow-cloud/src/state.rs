//! Convergence states and verdicts

use serde::{Deserialize, Serialize};

/// Position of one resource instance in the observe→diff→act cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceState {
    /// Nothing observed yet in this pass
    Unobserved,
    /// Remote counterpart does not exist
    Missing,
    /// Remote counterpart exists but drifted
    Outdated,
    /// Remote counterpart matches the desired spec
    Converged,
    /// Removal in progress
    Deleting,
    /// Remote counterpart removed
    Gone,
}

impl ConvergenceState {
    pub fn can_create(self) -> bool {
        self == ConvergenceState::Missing
    }

    pub fn can_update(self) -> bool {
        self == ConvergenceState::Outdated
    }

    pub fn can_delete(self) -> bool {
        self != ConvergenceState::Gone
    }
}

impl std::fmt::Display for ConvergenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvergenceState::Unobserved => write!(f, "unobserved"),
            ConvergenceState::Missing => write!(f, "missing"),
            ConvergenceState::Outdated => write!(f, "outdated"),
            ConvergenceState::Converged => write!(f, "converged"),
            ConvergenceState::Deleting => write!(f, "deleting"),
            ConvergenceState::Gone => write!(f, "gone"),
        }
    }
}

/// Outcome of comparing a desired spec against an observed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub exists: bool,
    pub up_to_date: bool,
    /// Human-readable explanation, one line per failing check
    pub diff: String,
}

impl Verdict {
    pub fn missing() -> Self {
        Self {
            exists: false,
            up_to_date: false,
            diff: "resource does not exist".to_string(),
        }
    }

    pub fn state(&self) -> ConvergenceState {
        match (self.exists, self.up_to_date) {
            (false, _) => ConvergenceState::Missing,
            (true, false) => ConvergenceState::Outdated,
            (true, true) => ConvergenceState::Converged,
        }
    }
}
