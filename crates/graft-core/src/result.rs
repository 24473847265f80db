//! Outcomes of executing a step and of a whole start/continue invocation.

use graft_git::Oid;
use serde::Serialize;

use crate::step::RebaseStep;

/// What applying a single step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// A commit now holds the step's changes.
    Committed(Oid),
    /// The step left these paths conflicted in the index.
    Conflicts(Vec<String>),
    /// The new base already contained the changes; nothing was committed.
    ChangesAlreadyApplied,
}

impl StepResult {
    /// The commit the step produced, if any.
    #[must_use]
    pub const fn produced_commit(&self) -> Option<Oid> {
        match self {
            Self::Committed(oid) => Some(*oid),
            Self::Conflicts(_) | Self::ChangesAlreadyApplied => None,
        }
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebaseStatus {
    /// Every step applied and the branch moved.
    Complete,
    /// Halted on a step with conflicts.
    Conflicts,
    /// Paused by the per-invocation step budget.
    Stop,
}

/// Terminal result of a start or continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebaseResult {
    pub status: RebaseStatus,
    pub completed_steps: usize,
    pub total_steps: usize,
    /// Step the rebase is halted on; `None` once complete.
    pub current_step: Option<RebaseStep>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
}

impl RebaseResult {
    pub(crate) const fn complete(total_steps: usize) -> Self {
        Self {
            status: RebaseStatus::Complete,
            completed_steps: total_steps,
            total_steps,
            current_step: None,
            conflicts: Vec::new(),
        }
    }

    pub(crate) fn conflicts(step: RebaseStep, conflicts: Vec<String>) -> Self {
        Self {
            status: RebaseStatus::Conflicts,
            completed_steps: step.index(),
            total_steps: step.total(),
            current_step: Some(step),
            conflicts,
        }
    }

    pub(crate) const fn stopped(
        completed_steps: usize,
        total_steps: usize,
        current_step: Option<RebaseStep>,
    ) -> Self {
        Self {
            status: RebaseStatus::Stop,
            completed_steps,
            total_steps,
            current_step,
            conflicts: Vec::new(),
        }
    }

    /// Whether the rebase ran to the end.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == RebaseStatus::Complete
    }
}
