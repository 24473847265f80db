//! The open rebase: persisted state plus exclusive hold on the repository.

use graft_git::{CheckoutOptions, GitOps, Oid, OperationGuard, SequenceOperation, Signature};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::plan::RebasePlan;
use crate::state::RebaseState;
use crate::step::RebaseStep;
use crate::traits::StateStore;

/// Exclusive access to an in-progress rebase.
///
/// Every cursor change goes through the handle and is persisted before the
/// call returns. The repository's operation flag is held for the handle's
/// lifetime and released on drop.
pub struct RebaseHandle<'r, G: GitOps, S: StateStore> {
    repo: &'r G,
    store: &'r S,
    state: RebaseState,
    _guard: OperationGuard<'r>,
}

impl<'r, G: GitOps, S: StateStore> RebaseHandle<'r, G, S> {
    /// Reopen the persisted rebase.
    ///
    /// # Errors
    /// `NoRebaseInProgress` if nothing is persisted, `OperationAlreadyInProgress`
    /// if this process already holds the repository.
    pub fn open(repo: &'r G, store: &'r S) -> Result<Self> {
        let guard = acquire(repo)?;
        if !store.is_rebase_in_progress() {
            return Err(Error::NoRebaseInProgress);
        }
        let state = store.load_rebase_state()?;

        Ok(Self {
            repo,
            store,
            state,
            _guard: guard,
        })
    }

    /// Create and persist a new rebase from `plan`, then detach HEAD at `onto`.
    ///
    /// # Errors
    /// `OperationAlreadyInProgress` if a rebase is persisted, git has an
    /// operation pending, or the flag is held. Git errors if the tree is dirty.
    pub fn init(
        repo: &'r G,
        store: &'r S,
        plan: RebasePlan,
        checkout: &CheckoutOptions,
    ) -> Result<Self> {
        let guard = acquire(repo)?;
        if store.is_rebase_in_progress() {
            return Err(Error::OperationAlreadyInProgress(SequenceOperation::Rebase));
        }
        if let Some(pending) = repo.pending_operation() {
            return Err(Error::OperationAlreadyInProgress(pending));
        }
        repo.require_clean()?;

        let (snapshot, steps) = plan.into_steps(repo)?;
        let state = RebaseState::new(snapshot, steps)?;
        store.save_rebase_state(&state)?;

        if let Err(e) = repo.checkout_detached(state.snapshot.onto, checkout) {
            if let Err(clear) = store.clear_rebase_state() {
                warn!(error = %clear, "failed to discard rebase state after checkout error");
            }
            return Err(e.into());
        }

        info!(
            branch = state.snapshot.branch.as_deref().unwrap_or("(detached)"),
            onto = %state.snapshot.onto,
            steps = state.total_step_count(),
            "rebase started"
        );

        Ok(Self {
            repo,
            store,
            state,
            _guard: guard,
        })
    }

    pub(crate) const fn repo(&self) -> &'r G {
        self.repo
    }

    /// Last applied step; `None` before the first.
    #[must_use]
    pub const fn current_step_index(&self) -> Option<usize> {
        self.state.last_applied()
    }

    /// Index of the step the next run applies.
    #[must_use]
    pub fn next_index(&self) -> usize {
        self.state.next_index()
    }

    /// Number of steps, fixed when the rebase started.
    #[must_use]
    pub fn total_step_count(&self) -> usize {
        self.state.total_step_count()
    }

    /// The step at `index`.
    ///
    /// # Errors
    /// `IndexOutOfRange` outside `[0, total)`.
    pub fn step_at(&self, index: usize) -> Result<&RebaseStep> {
        self.state.step_at(index)
    }

    /// The step in progress, else the last applied one.
    #[must_use]
    pub fn current_step(&self) -> Option<&RebaseStep> {
        self.state.current_step()
    }

    /// The step materialized but not yet committed, if any.
    #[must_use]
    pub fn in_progress_step(&self) -> Option<RebaseStep> {
        self.state
            .in_progress()
            .and_then(|index| self.state.steps().get(index))
            .cloned()
    }

    pub(crate) fn begin_step(&mut self, index: usize) -> Result<()> {
        self.state.begin_step(index)?;
        self.store.save_rebase_state(&self.state)
    }

    pub(crate) fn complete_step(&mut self, index: usize) -> Result<()> {
        self.state.complete_step(index)?;
        self.store.save_rebase_state(&self.state)
    }

    /// Undo a step that failed before it could be committed: reset the
    /// index and workdir to HEAD and clear the in-progress marker, so the
    /// next run applies the step again instead of committing whatever is
    /// left in the index.
    pub(crate) fn abandon_step(&mut self, index: usize, checkout: &CheckoutOptions) -> Result<()> {
        self.repo.discard_step(checkout)?;
        self.state.abandon_step(index)?;
        self.store.save_rebase_state(&self.state)
    }

    /// Move the original branch to the rewritten tip and discard the state.
    ///
    /// # Errors
    /// `SequencerDesync` if steps remain, `FinishFailed` if the branch moved
    /// but the state couldn't be removed.
    pub fn finish(self, committer: &Signature<'_>) -> Result<Oid> {
        if !self.state.is_complete() {
            return Err(Error::desync(format!(
                "finish requested with {} of {} steps applied",
                self.state.next_index(),
                self.state.total_step_count()
            )));
        }

        let snapshot = &self.state.snapshot;
        let tip = self
            .repo
            .finish_rebase(snapshot.branch.as_deref(), snapshot.onto)?;
        self.store
            .clear_rebase_state()
            .map_err(|e| Error::FinishFailed(Box::new(e)))?;

        info!(
            committer = committer.name().unwrap_or_default(),
            %tip,
            steps = self.state.total_step_count(),
            "rebase complete"
        );
        Ok(tip)
    }

    /// Put HEAD, index and working directory back as they were and discard
    /// the state.
    ///
    /// # Errors
    /// Returns error if the restore or the state removal fails.
    pub fn abort(self, checkout: &CheckoutOptions) -> Result<()> {
        let snapshot = &self.state.snapshot;
        self.repo
            .restore(snapshot.branch.as_deref(), snapshot.head, checkout)?;
        self.store.clear_rebase_state()?;
        info!(
            branch = snapshot.branch.as_deref().unwrap_or("(detached)"),
            head = %snapshot.head,
            "rebase aborted"
        );
        Ok(())
    }
}

fn acquire<G: GitOps>(repo: &G) -> Result<OperationGuard<'_>> {
    repo.operation_flag()
        .acquire(SequenceOperation::Rebase)
        .map_err(Error::OperationAlreadyInProgress)
}
