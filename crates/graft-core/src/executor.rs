//! Applying one step to the index and working directory.

use graft_git::{CheckoutOptions, CommitOutcome, GitOps, Oid, Signature};
use tracing::debug;

use crate::error::{Error, Result};
use crate::observer::RebaseOptions;
use crate::result::StepResult;
use crate::step::{RebaseStep, StepOperation};

/// Applies steps with cherry-pick semantics.
pub struct StepExecutor<'r, G: GitOps> {
    repo: &'r G,
    checkout: CheckoutOptions,
    fast_forward: bool,
}

impl<'r, G: GitOps> StepExecutor<'r, G> {
    /// An executor using the checkout and fast-forward settings in `options`.
    #[must_use]
    pub const fn new(repo: &'r G, options: &RebaseOptions<'_>) -> Self {
        Self {
            repo,
            checkout: options.checkout,
            fast_forward: !options.force_rewrite,
        }
    }

    /// Materialize and commit `step`.
    ///
    /// # Errors
    /// `UnsupportedStepOperation` for anything but pick (nothing is touched),
    /// `SequencerDesync` if the index is already conflicted or the
    /// substrate applied something else.
    pub fn execute(&self, step: &RebaseStep, committer: &Signature<'_>) -> Result<StepResult> {
        match step.operation() {
            StepOperation::Pick => self.apply_pick(step, committer),
            op @ (StepOperation::Reword
            | StepOperation::Edit
            | StepOperation::Squash
            | StepOperation::Fixup
            | StepOperation::Exec) => Err(Error::UnsupportedStepOperation(op)),
        }
    }

    /// Commit a step that was materialized earlier, typically after the user
    /// resolved its conflicts.
    ///
    /// # Errors
    /// `UnsupportedStepOperation` for anything but pick.
    pub fn resume(&self, step: &RebaseStep, committer: &Signature<'_>) -> Result<StepResult> {
        match step.operation() {
            StepOperation::Pick => self.commit_step(target(step)?, committer),
            op @ (StepOperation::Reword
            | StepOperation::Edit
            | StepOperation::Squash
            | StepOperation::Fixup
            | StepOperation::Exec) => Err(Error::UnsupportedStepOperation(op)),
        }
    }

    fn apply_pick(&self, step: &RebaseStep, committer: &Signature<'_>) -> Result<StepResult> {
        let commit = target(step)?;

        let leftover = self.repo.conflicting_files()?;
        if !leftover.is_empty() {
            return Err(Error::desync(format!(
                "index has unresolved conflicts ({}) before {step}",
                leftover.join(", ")
            )));
        }

        let materialized = self
            .repo
            .materialize(commit, &self.checkout, self.fast_forward)?;
        if materialized.commit != commit {
            return Err(Error::desync(format!(
                "materialized {} while applying {step}",
                materialized.commit
            )));
        }

        if !materialized.is_clean() {
            debug!(%step, conflicts = materialized.conflicts.len(), "step conflicted");
            return Ok(StepResult::Conflicts(materialized.conflicts));
        }
        if materialized.fast_forwarded {
            debug!(%step, "fast-forwarded");
            return Ok(StepResult::Committed(commit));
        }

        self.commit_step(commit, committer)
    }

    fn commit_step(&self, commit: Oid, committer: &Signature<'_>) -> Result<StepResult> {
        let conflicts = self.repo.conflicting_files()?;
        if !conflicts.is_empty() {
            return Ok(StepResult::Conflicts(conflicts));
        }

        match self.repo.commit_index(commit, committer)? {
            CommitOutcome::Created(oid) => Ok(StepResult::Committed(oid)),
            CommitOutcome::Unchanged => {
                debug!(%commit, "changes already applied");
                Ok(StepResult::ChangesAlreadyApplied)
            }
        }
    }
}

fn target(step: &RebaseStep) -> Result<Oid> {
    step.commit()
        .ok_or_else(|| Error::desync(format!("{step} has no target commit")))
}
