//! In-memory fakes of the git substrate and the state store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use graft_git::{
    CheckoutOptions, CommitOutcome, GitOps, Materialized, Oid, OperationFlag, SequenceOperation,
    Signature,
};

use crate::error::{Error, Result};
use crate::state::RebaseState;
use crate::traits::StateStore;

#[derive(Debug, Clone)]
struct MockCommit {
    parent: Option<Oid>,
    summary: String,
}

#[derive(Debug, Clone)]
enum MockHead {
    Branch(String),
    Detached(Oid),
}

#[derive(Debug)]
struct MockRepo {
    commits: HashMap<Oid, MockCommit>,
    branches: HashMap<String, Oid>,
    head: MockHead,
    conflicts: Vec<String>,
    next_id: u8,
}

impl MockRepo {
    fn add_commit(&mut self, parent: Option<Oid>, summary: impl Into<String>) -> Oid {
        self.next_id += 1;
        let oid = Oid::from_bytes(&[self.next_id; 20]).unwrap();
        self.commits.insert(
            oid,
            MockCommit {
                parent,
                summary: summary.into(),
            },
        );
        oid
    }

    fn head_commit(&self) -> Oid {
        match &self.head {
            MockHead::Branch(name) => self.branches[name],
            MockHead::Detached(oid) => *oid,
        }
    }

    fn ancestors(&self, from: Oid) -> HashSet<Oid> {
        let mut seen = HashSet::new();
        let mut cursor = Some(from);
        while let Some(oid) = cursor {
            seen.insert(oid);
            cursor = self.commits.get(&oid).and_then(|c| c.parent);
        }
        seen
    }
}

/// A linear-history repository held in memory.
pub struct MockGitOps {
    git_dir: PathBuf,
    flag: OperationFlag,
    repo: RefCell<MockRepo>,
    conflict_on: RefCell<HashSet<Oid>>,
    already_applied: RefCell<HashSet<Oid>>,
    materialize_instead: Cell<Option<Oid>>,
    materialize_calls: Cell<usize>,
    fail_materialize: Cell<bool>,
    discards: Cell<usize>,
    pending: Cell<Option<SequenceOperation>>,
    dirty: Cell<bool>,
}

impl MockGitOps {
    /// `base <- main` and `base <- f1 <- ... <- fN` with `feature` checked out.
    pub fn linear(feature_commits: usize) -> Self {
        let mut repo = MockRepo {
            commits: HashMap::new(),
            branches: HashMap::new(),
            head: MockHead::Branch("feature".into()),
            conflicts: Vec::new(),
            next_id: 0,
        };

        let base = repo.add_commit(None, "base");
        let main = repo.add_commit(Some(base), "main work");
        let mut tip = base;
        for i in 0..feature_commits {
            tip = repo.add_commit(Some(tip), format!("feature {i}"));
        }
        repo.branches.insert("main".into(), main);
        repo.branches.insert("feature".into(), tip);

        Self {
            git_dir: PathBuf::from("/mock/.git"),
            flag: OperationFlag::new(),
            repo: RefCell::new(repo),
            conflict_on: RefCell::new(HashSet::new()),
            already_applied: RefCell::new(HashSet::new()),
            materialize_instead: Cell::new(None),
            materialize_calls: Cell::new(0),
            fail_materialize: Cell::new(false),
            discards: Cell::new(0),
            pending: Cell::new(None),
            dirty: Cell::new(false),
        }
    }

    pub fn committer() -> Signature<'static> {
        Signature::now("Test User", "test@example.com").unwrap()
    }

    /// Create a branch with one commit on top of `base`.
    pub fn add_branch_commit(&self, name: &str) -> Oid {
        let mut repo = self.repo.borrow_mut();
        let base = repo
            .commits
            .iter()
            .find(|(_, c)| c.parent.is_none())
            .map(|(oid, _)| *oid)
            .unwrap();
        let oid = repo.add_commit(Some(base), format!("{name} work"));
        repo.branches.insert(name.into(), oid);
        oid
    }

    pub fn conflict_on(&self, commit: Oid) {
        self.conflict_on.borrow_mut().insert(commit);
    }

    pub fn mark_already_applied(&self, commit: Oid) {
        self.already_applied.borrow_mut().insert(commit);
    }

    /// Make every later `materialize` apply `commit` instead of what was asked.
    pub fn materialize_instead(&self, commit: Oid) {
        self.materialize_instead.set(Some(commit));
    }

    /// Undo [`materialize_instead`](Self::materialize_instead).
    pub fn materialize_as_asked(&self) {
        self.materialize_instead.set(None);
    }

    /// Make the next `materialize` fail the way a refused checkout does,
    /// after leaving a conflict behind.
    pub fn fail_next_materialize(&self) {
        self.fail_materialize.set(true);
    }

    pub fn discards(&self) -> usize {
        self.discards.get()
    }

    pub fn materialize_calls(&self) -> usize {
        self.materialize_calls.get()
    }

    pub fn resolve_conflicts(&self) {
        self.repo.borrow_mut().conflicts.clear();
    }

    pub fn set_pending(&self, operation: Option<SequenceOperation>) {
        self.pending.set(operation);
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.set(dirty);
    }

    fn missing(oid: Oid) -> graft_git::Error {
        graft_git::Error::RevisionNotFound(oid.to_string())
    }
}

impl GitOps for MockGitOps {
    fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn operation_flag(&self) -> &OperationFlag {
        &self.flag
    }

    fn pending_operation(&self) -> Option<SequenceOperation> {
        self.pending.get()
    }

    fn current_branch(&self) -> graft_git::Result<String> {
        match &self.repo.borrow().head {
            MockHead::Branch(name) => Ok(name.clone()),
            MockHead::Detached(_) => Err(graft_git::Error::DetachedHead),
        }
    }

    fn head_detached(&self) -> graft_git::Result<bool> {
        Ok(matches!(self.repo.borrow().head, MockHead::Detached(_)))
    }

    fn head_commit(&self) -> graft_git::Result<Oid> {
        Ok(self.repo.borrow().head_commit())
    }

    fn branch_commit(&self, branch: &str) -> graft_git::Result<Oid> {
        self.repo
            .borrow()
            .branches
            .get(branch)
            .copied()
            .ok_or_else(|| graft_git::Error::BranchNotFound(branch.into()))
    }

    fn resolve_commit(&self, revision: &str) -> graft_git::Result<Oid> {
        let repo = self.repo.borrow();
        if let Some(oid) = repo.branches.get(revision) {
            return Ok(*oid);
        }
        Oid::from_str(revision)
            .ok()
            .filter(|oid| repo.commits.contains_key(oid))
            .ok_or_else(|| graft_git::Error::RevisionNotFound(revision.into()))
    }

    fn commit_parent(&self, oid: Oid) -> graft_git::Result<Option<Oid>> {
        self.repo
            .borrow()
            .commits
            .get(&oid)
            .map(|c| c.parent)
            .ok_or_else(|| Self::missing(oid))
    }

    fn commit_summary(&self, oid: Oid) -> graft_git::Result<String> {
        self.repo
            .borrow()
            .commits
            .get(&oid)
            .map(|c| c.summary.clone())
            .ok_or_else(|| Self::missing(oid))
    }

    fn commits_to_replay(&self, upstream: Oid, tip: Oid) -> graft_git::Result<Vec<Oid>> {
        let repo = self.repo.borrow();
        let hidden = repo.ancestors(upstream);
        let mut commits = Vec::new();
        let mut cursor = Some(tip);
        while let Some(oid) = cursor.filter(|oid| !hidden.contains(oid)) {
            commits.push(oid);
            cursor = repo.commits.get(&oid).and_then(|c| c.parent);
        }
        commits.reverse();
        Ok(commits)
    }

    fn require_clean(&self) -> graft_git::Result<()> {
        if self.dirty.get() {
            return Err(graft_git::Error::DirtyWorkingDirectory);
        }
        Ok(())
    }

    fn conflicting_files(&self) -> graft_git::Result<Vec<String>> {
        Ok(self.repo.borrow().conflicts.clone())
    }

    fn checkout_detached(&self, commit: Oid, _options: &CheckoutOptions) -> graft_git::Result<()> {
        let mut repo = self.repo.borrow_mut();
        if !repo.commits.contains_key(&commit) {
            return Err(Self::missing(commit));
        }
        repo.head = MockHead::Detached(commit);
        repo.conflicts.clear();
        Ok(())
    }

    fn materialize(
        &self,
        commit: Oid,
        _options: &CheckoutOptions,
        fast_forward: bool,
    ) -> graft_git::Result<Materialized> {
        self.materialize_calls.set(self.materialize_calls.get() + 1);
        if self.fail_materialize.replace(false) {
            self.repo.borrow_mut().conflicts = vec!["partial.txt".into()];
            return Err(git2::Error::from_str("1 uncommitted change would be overwritten").into());
        }
        let applied = self.materialize_instead.get().unwrap_or(commit);
        let mut repo = self.repo.borrow_mut();
        let picked = repo.commits.get(&applied).cloned().ok_or_else(|| Self::missing(applied))?;

        if fast_forward && picked.parent == Some(repo.head_commit()) {
            repo.head = MockHead::Detached(applied);
            return Ok(Materialized {
                commit: applied,
                conflicts: vec![],
                fast_forwarded: true,
            });
        }

        if self.conflict_on.borrow().contains(&applied) {
            repo.conflicts = vec![format!("{}.txt", picked.summary.replace(' ', "_"))];
        }

        Ok(Materialized {
            commit: applied,
            conflicts: repo.conflicts.clone(),
            fast_forwarded: false,
        })
    }

    fn commit_index(
        &self,
        original: Oid,
        _committer: &Signature<'_>,
    ) -> graft_git::Result<CommitOutcome> {
        let mut repo = self.repo.borrow_mut();
        if !repo.conflicts.is_empty() {
            return Err(git2::Error::from_str("cannot commit with unresolved conflicts").into());
        }
        if self.already_applied.borrow().contains(&original) {
            return Ok(CommitOutcome::Unchanged);
        }

        let summary = repo
            .commits
            .get(&original)
            .map(|c| c.summary.clone())
            .ok_or_else(|| Self::missing(original))?;
        let head = repo.head_commit();
        let new = repo.add_commit(Some(head), summary);
        repo.head = MockHead::Detached(new);
        Ok(CommitOutcome::Created(new))
    }

    fn finish_rebase(&self, branch: Option<&str>, _onto: Oid) -> graft_git::Result<Oid> {
        let mut repo = self.repo.borrow_mut();
        let tip = repo.head_commit();
        if let Some(branch) = branch {
            repo.branches.insert(branch.into(), tip);
            repo.head = MockHead::Branch(branch.into());
        }
        Ok(tip)
    }

    fn restore(
        &self,
        branch: Option<&str>,
        head: Oid,
        _options: &CheckoutOptions,
    ) -> graft_git::Result<()> {
        let mut repo = self.repo.borrow_mut();
        if let Some(branch) = branch {
            repo.branches.insert(branch.into(), head);
            repo.head = MockHead::Branch(branch.into());
        } else {
            repo.head = MockHead::Detached(head);
        }
        repo.conflicts.clear();
        Ok(())
    }

    fn discard_step(&self, _options: &CheckoutOptions) -> graft_git::Result<()> {
        self.discards.set(self.discards.get() + 1);
        self.repo.borrow_mut().conflicts.clear();
        Ok(())
    }
}

/// State store backed by a string, so tests can compare exact bytes.
pub struct MemoryStore {
    rebase: RefCell<Option<String>>,
    fail_clear: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rebase: RefCell::new(None),
            fail_clear: Cell::new(false),
        }
    }

    /// The serialized state exactly as stored.
    pub fn raw(&self) -> Option<String> {
        self.rebase.borrow().clone()
    }

    pub fn fail_clear(&self, fail: bool) {
        self.fail_clear.set(fail);
    }
}

impl StateStore for MemoryStore {
    fn is_rebase_in_progress(&self) -> bool {
        self.rebase.borrow().is_some()
    }

    fn load_rebase_state(&self) -> Result<RebaseState> {
        let raw = self.rebase.borrow();
        let json = raw.as_deref().ok_or(Error::NoRebaseInProgress)?;
        Ok(serde_json::from_str(json)?)
    }

    fn save_rebase_state(&self, state: &RebaseState) -> Result<()> {
        *self.rebase.borrow_mut() = Some(serde_json::to_string(state)?);
        Ok(())
    }

    fn clear_rebase_state(&self) -> Result<()> {
        if self.fail_clear.get() {
            return Err(std::io::Error::other("simulated unlink failure").into());
        }
        *self.rebase.borrow_mut() = None;
        Ok(())
    }
}
