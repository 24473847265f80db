//! Start, continue and abort a rebase, and query where it stands.

use graft_git::{CheckoutOptions, GitOps, SequenceOperation, Signature};
use tracing::info;

use crate::error::{Error, Result};
use crate::executor::StepExecutor;
use crate::handle::RebaseHandle;
use crate::observer::RebaseOptions;
use crate::plan::RebasePlan;
use crate::result::{RebaseResult, StepResult};
use crate::sequencer;
use crate::state::RebaseState;
use crate::step::RebaseStep;
use crate::traits::StateStore;

/// Control surface for the rebase engine.
///
/// Generic over the git substrate and the state store so the whole engine
/// can run against in-memory fakes.
pub struct Rebaser<'r, G: GitOps, S: StateStore> {
    repo: &'r G,
    store: &'r S,
}

impl<'r, G: GitOps, S: StateStore> Rebaser<'r, G, S> {
    #[must_use]
    pub const fn new(repo: &'r G, store: &'r S) -> Self {
        Self { repo, store }
    }

    /// Resolve references and list the steps without starting anything.
    ///
    /// # Errors
    /// Returns error if a reference doesn't resolve.
    pub fn plan(
        &self,
        branch: Option<&str>,
        upstream: &str,
        onto: Option<&str>,
    ) -> Result<RebasePlan> {
        RebasePlan::compute(self.repo, branch, upstream, onto)
    }

    /// Rebase `branch` (default: the checked-out branch) onto `onto`
    /// (default: `upstream`), replaying the commits not in `upstream`.
    ///
    /// # Errors
    /// `OperationAlreadyInProgress` if the repository is busy; otherwise any
    /// error from planning or the first steps.
    pub fn start(
        &self,
        branch: Option<&str>,
        upstream: &str,
        onto: Option<&str>,
        committer: &Signature<'_>,
        options: &mut RebaseOptions<'_>,
    ) -> Result<RebaseResult> {
        self.ensure_idle()?;
        let plan = self.plan(branch, upstream, onto)?;
        self.start_plan(plan, committer, options)
    }

    /// Start a rebase from an already computed (possibly edited) plan.
    ///
    /// # Errors
    /// Same as [`start`](Self::start).
    pub fn start_plan(
        &self,
        plan: RebasePlan,
        committer: &Signature<'_>,
        options: &mut RebaseOptions<'_>,
    ) -> Result<RebaseResult> {
        let handle = RebaseHandle::init(self.repo, self.store, plan, &options.checkout)?;
        sequencer::run(handle, committer, options)
    }

    /// Commit the halted step from the resolved index and keep going.
    ///
    /// If the index is still conflicted the same `Conflicts` result comes
    /// back and nothing moves.
    ///
    /// # Errors
    /// `NoRebaseInProgress` if there is nothing to continue.
    pub fn continue_rebase(
        &self,
        committer: &Signature<'_>,
        options: &mut RebaseOptions<'_>,
    ) -> Result<RebaseResult> {
        let mut handle = RebaseHandle::open(self.repo, self.store)?;

        if let Some(step) = handle.in_progress_step() {
            let executor = StepExecutor::new(self.repo, options);
            match executor.resume(&step, committer)? {
                StepResult::Conflicts(paths) => {
                    return Ok(RebaseResult::conflicts(step, paths));
                }
                result => {
                    handle.complete_step(step.index())?;
                    info!(%step, "resolved step committed");
                    options.notify_completed(&step, result.produced_commit());
                }
            }
        }

        sequencer::run(handle, committer, options)
    }

    /// Throw the rebase away and restore the pre-rebase snapshot.
    ///
    /// # Errors
    /// `NoRebaseInProgress` if there is nothing to abort.
    pub fn abort(&self, checkout: &CheckoutOptions) -> Result<()> {
        RebaseHandle::open(self.repo, self.store)?.abort(checkout)
    }

    /// The step the rebase is on, or `None` when no rebase is in progress.
    ///
    /// # Errors
    /// Returns error if the persisted state can't be read.
    pub fn current_step(&self) -> Result<Option<RebaseStep>> {
        Ok(self
            .state()?
            .and_then(|state| state.current_step().cloned()))
    }

    /// The persisted state, if a rebase is in progress.
    ///
    /// # Errors
    /// Returns error if the persisted state can't be read.
    pub fn state(&self) -> Result<Option<RebaseState>> {
        if !self.store.is_rebase_in_progress() {
            return Ok(None);
        }
        self.store.load_rebase_state().map(Some)
    }

    fn ensure_idle(&self) -> Result<()> {
        if let Some(current) = self.repo.operation_flag().current() {
            return Err(Error::OperationAlreadyInProgress(current));
        }
        if self.store.is_rebase_in_progress() {
            return Err(Error::OperationAlreadyInProgress(SequenceOperation::Rebase));
        }
        if let Some(pending) = self.repo.pending_operation() {
            return Err(Error::OperationAlreadyInProgress(pending));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::StepEvent;
    use crate::result::RebaseStatus;
    use crate::step::StepOperation;
    use crate::test_mocks::{MemoryStore, MockGitOps};
    use crate::plan::TodoEntry;

    fn picks(repo: &MockGitOps) -> Vec<graft_git::Oid> {
        let upstream = repo.branch_commit("main").unwrap();
        let tip = repo.branch_commit("feature").unwrap();
        repo.commits_to_replay(upstream, tip).unwrap()
    }

    #[test]
    fn test_start_completes() {
        let repo = MockGitOps::linear(3);
        let store = MemoryStore::new();
        let rebaser = Rebaser::new(&repo, &store);
        let mut events: Vec<StepEvent> = Vec::new();
        let mut options = RebaseOptions::default().with_observer(&mut events);

        let result = rebaser
            .start(None, "main", None, &MockGitOps::committer(), &mut options)
            .unwrap();
        drop(options);

        assert_eq!(result, RebaseResult::complete(3));
        assert!(!store.is_rebase_in_progress());
        assert_eq!(repo.current_branch().unwrap(), "feature");
        assert_eq!(events.len(), 6);
        assert!(rebaser.current_step().unwrap().is_none());
    }

    #[test]
    fn test_empty_plan_completes() {
        let repo = MockGitOps::linear(0);
        let store = MemoryStore::new();
        let result = Rebaser::new(&repo, &store)
            .start(None, "main", None, &MockGitOps::committer(), &mut RebaseOptions::default())
            .unwrap();
        assert_eq!(result, RebaseResult::complete(0));
        assert!(!store.is_rebase_in_progress());
    }

    #[test]
    fn test_conflict_then_continue() {
        let repo = MockGitOps::linear(3);
        let conflicting = picks(&repo)[1];
        repo.conflict_on(conflicting);
        let store = MemoryStore::new();
        let rebaser = Rebaser::new(&repo, &store);

        let result = rebaser
            .start(None, "main", None, &MockGitOps::committer(), &mut RebaseOptions::default())
            .unwrap();
        assert_eq!(result.status, RebaseStatus::Conflicts);
        assert_eq!(result.completed_steps, 1);
        let current = result.current_step.unwrap();
        assert_eq!(current.index(), 1);
        assert_eq!(current.commit(), Some(conflicting));
        assert_eq!(rebaser.state().unwrap().unwrap().last_applied(), Some(0));
        assert_eq!(rebaser.current_step().unwrap(), Some(current));

        // Unresolved: same answer, nothing moves
        let again = rebaser
            .continue_rebase(&MockGitOps::committer(), &mut RebaseOptions::default())
            .unwrap();
        assert_eq!(again.status, RebaseStatus::Conflicts);
        assert_eq!(rebaser.state().unwrap().unwrap().last_applied(), Some(0));

        repo.resolve_conflicts();
        let mut events: Vec<StepEvent> = Vec::new();
        let mut options = RebaseOptions::default().with_observer(&mut events);
        let done = rebaser
            .continue_rebase(&MockGitOps::committer(), &mut options)
            .unwrap();
        drop(options);

        assert_eq!(done, RebaseResult::complete(3));
        // Resumed step completes once, last step starts and completes
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StepEvent::Completed(step, Some(_)) if step.index() == 1));
    }

    #[test]
    fn test_continue_and_abort_need_a_rebase() {
        let repo = MockGitOps::linear(1);
        let store = MemoryStore::new();
        let rebaser = Rebaser::new(&repo, &store);

        assert!(matches!(
            rebaser.continue_rebase(&MockGitOps::committer(), &mut RebaseOptions::default()),
            Err(Error::NoRebaseInProgress)
        ));
        assert!(matches!(
            rebaser.abort(&CheckoutOptions::default()),
            Err(Error::NoRebaseInProgress)
        ));
        assert_eq!(rebaser.current_step().unwrap(), None);
    }

    #[test]
    fn test_abort_twice() {
        let repo = MockGitOps::linear(2);
        let conflicting = picks(&repo)[0];
        repo.conflict_on(conflicting);
        let store = MemoryStore::new();
        let rebaser = Rebaser::new(&repo, &store);
        let original = repo.branch_commit("feature").unwrap();

        rebaser
            .start(None, "main", None, &MockGitOps::committer(), &mut RebaseOptions::default())
            .unwrap();
        rebaser.abort(&CheckoutOptions::default()).unwrap();

        assert_eq!(repo.head_commit().unwrap(), original);
        assert!(repo.conflicting_files().unwrap().is_empty());
        assert!(matches!(
            rebaser.abort(&CheckoutOptions::default()),
            Err(Error::NoRebaseInProgress)
        ));
    }

    #[test]
    fn test_start_while_in_progress_leaves_state() {
        let repo = MockGitOps::linear(2);
        let conflicting = picks(&repo)[0];
        repo.conflict_on(conflicting);
        let store = MemoryStore::new();
        let rebaser = Rebaser::new(&repo, &store);

        rebaser
            .start(None, "main", None, &MockGitOps::committer(), &mut RebaseOptions::default())
            .unwrap();
        let before = store.raw();

        let err = rebaser
            .start(None, "main", None, &MockGitOps::committer(), &mut RebaseOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::OperationAlreadyInProgress(SequenceOperation::Rebase)
        ));
        assert_eq!(store.raw(), before);
    }

    #[test]
    fn test_start_refused_while_flag_held() {
        let repo = MockGitOps::linear(1);
        let store = MemoryStore::new();
        let _guard = repo
            .operation_flag()
            .acquire(SequenceOperation::Merge)
            .unwrap();

        let err = Rebaser::new(&repo, &store)
            .start(None, "main", None, &MockGitOps::committer(), &mut RebaseOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::OperationAlreadyInProgress(SequenceOperation::Merge)
        ));
        assert!(!store.is_rebase_in_progress());
    }

    #[test]
    fn test_already_applied_completes_once() {
        let repo = MockGitOps::linear(2);
        let skipped = picks(&repo)[0];
        repo.mark_already_applied(skipped);
        let store = MemoryStore::new();
        let mut events: Vec<StepEvent> = Vec::new();
        let mut options = RebaseOptions::default().with_observer(&mut events);

        let result = Rebaser::new(&repo, &store)
            .start(None, "main", None, &MockGitOps::committer(), &mut options)
            .unwrap();
        drop(options);

        assert!(result.is_complete());
        let completions: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                StepEvent::Completed(step, produced) => Some((step.index(), *produced)),
                StepEvent::Starting(_) => None,
            })
            .collect();
        assert_eq!(completions.len(), 2);
        assert_eq!(completions[0], (0, None));
        assert!(completions[1].1.is_some());
    }

    #[test]
    fn test_max_steps_stops_and_resumes() {
        let repo = MockGitOps::linear(3);
        let store = MemoryStore::new();
        let rebaser = Rebaser::new(&repo, &store);
        let mut options = RebaseOptions {
            max_steps: Some(2),
            ..RebaseOptions::default()
        };

        let result = rebaser
            .start(None, "main", None, &MockGitOps::committer(), &mut options)
            .unwrap();
        assert_eq!(result.status, RebaseStatus::Stop);
        assert_eq!(result.completed_steps, 2);
        assert_eq!(result.current_step.map(|s| s.index()), Some(1));
        assert!(store.is_rebase_in_progress());

        let result = rebaser
            .continue_rebase(&MockGitOps::committer(), &mut options)
            .unwrap();
        assert!(result.is_complete());
    }

    #[test]
    fn test_unsupported_step_keeps_cursor() {
        let repo = MockGitOps::linear(2);
        let store = MemoryStore::new();
        let rebaser = Rebaser::new(&repo, &store);
        let mut plan = rebaser.plan(None, "main", None).unwrap();
        plan.todo_mut().insert(1, TodoEntry::exec("make check"));

        let err = rebaser
            .start_plan(plan, &MockGitOps::committer(), &mut RebaseOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedStepOperation(StepOperation::Exec)
        ));

        let state = rebaser.state().unwrap().unwrap();
        assert_eq!(state.last_applied(), Some(0));
        assert_eq!(state.next_index(), 1);
        assert_eq!(state.in_progress(), None);
        assert_eq!(repo.operation_flag().current(), None);

        // Continuing hits the same wall without moving
        assert!(matches!(
            rebaser.continue_rebase(&MockGitOps::committer(), &mut RebaseOptions::default()),
            Err(Error::UnsupportedStepOperation(StepOperation::Exec))
        ));
        assert_eq!(rebaser.state().unwrap().unwrap().last_applied(), Some(0));
    }

    #[test]
    fn test_finish_failure_reported() {
        let repo = MockGitOps::linear(1);
        let store = MemoryStore::new();
        store.fail_clear(true);

        let err = Rebaser::new(&repo, &store)
            .start(None, "main", None, &MockGitOps::committer(), &mut RebaseOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::FinishFailed(_)));
        // Branch was still moved
        assert_eq!(repo.current_branch().unwrap(), "feature");
    }

    #[test]
    fn test_desync_propagates() {
        let repo = MockGitOps::linear(2);
        let wrong = picks(&repo)[1];
        repo.materialize_instead(wrong);
        let store = MemoryStore::new();

        let err = Rebaser::new(&repo, &store)
            .start(None, "main", None, &MockGitOps::committer(), &mut RebaseOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::SequencerDesync(_)));
        let state = store.load_rebase_state().unwrap();
        assert_eq!(state.last_applied(), None);
        assert_eq!(state.in_progress(), None);
        assert_eq!(repo.discards(), 1);

        // The wrong tree is never committed: continue applies step 0 again
        repo.materialize_as_asked();
        let mut events: Vec<StepEvent> = Vec::new();
        let mut options = RebaseOptions::default().with_observer(&mut events);
        let result = Rebaser::new(&repo, &store)
            .continue_rebase(&MockGitOps::committer(), &mut options)
            .unwrap();
        drop(options);

        assert!(result.is_complete());
        assert_eq!(repo.materialize_calls(), 3);
        assert!(matches!(&events[0], StepEvent::Starting(step) if step.index() == 0));
        let tip = repo.branch_commit("feature").unwrap();
        assert_eq!(repo.commit_summary(tip).unwrap(), "feature 1");
        let parent = repo.commit_parent(tip).unwrap().unwrap();
        assert_eq!(repo.commit_summary(parent).unwrap(), "feature 0");
    }

    #[test]
    fn test_substrate_failure_reapplies_step_on_continue() {
        let repo = MockGitOps::linear(2);
        let store = MemoryStore::new();
        let rebaser = Rebaser::new(&repo, &store);
        let mut options = RebaseOptions {
            max_steps: Some(1),
            ..RebaseOptions::default()
        };
        rebaser
            .start(None, "main", None, &MockGitOps::committer(), &mut options)
            .unwrap();

        repo.fail_next_materialize();
        let err = rebaser
            .continue_rebase(&MockGitOps::committer(), &mut RebaseOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Git(_)));

        let state = rebaser.state().unwrap().unwrap();
        assert_eq!(state.last_applied(), Some(0));
        assert_eq!(state.in_progress(), None);
        assert!(repo.conflicting_files().unwrap().is_empty());
        assert_eq!(repo.operation_flag().current(), None);

        let mut events: Vec<StepEvent> = Vec::new();
        let mut options = RebaseOptions::default().with_observer(&mut events);
        let result = rebaser
            .continue_rebase(&MockGitOps::committer(), &mut options)
            .unwrap();
        drop(options);

        assert!(result.is_complete());
        assert_eq!(repo.materialize_calls(), 3);
        // Step 1 was applied for real, not reported as already applied
        assert_eq!(
            events,
            vec![
                StepEvent::Starting(state.steps()[1].clone()),
                StepEvent::Completed(
                    state.steps()[1].clone(),
                    Some(repo.branch_commit("feature").unwrap())
                ),
            ]
        );
    }
}
