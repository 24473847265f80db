//! Trait abstractions for git operations.
//!
//! This module defines the `GitOps` trait which abstracts the substrate the
//! rebase engine consumes, enabling dependency injection and testability.

use std::path::Path;

use git2::{Oid, Signature};

use crate::checkout::CheckoutOptions;
use crate::operation::{OperationFlag, SequenceOperation};
use crate::{CommitOutcome, Materialized, Repository, Result};

/// Trait for git repository operations.
///
/// This trait abstracts git operations, allowing for:
/// - Dependency injection in the rebase engine
/// - Mock implementations for testing
///
/// Note: git operations are synchronous since git2 is a synchronous library.
#[allow(clippy::missing_errors_doc)]
pub trait GitOps {
    // === Repository Info ===

    /// Get the path to the .git directory.
    fn git_dir(&self) -> &Path;

    /// The repository's in-process operation flag.
    fn operation_flag(&self) -> &OperationFlag;

    /// Stateful operation recorded by git on disk, if any.
    fn pending_operation(&self) -> Option<SequenceOperation>;

    /// Get the current branch name.
    ///
    /// Returns an error if HEAD is detached or not on a branch.
    fn current_branch(&self) -> Result<String>;

    /// Check if HEAD is detached.
    fn head_detached(&self) -> Result<bool>;

    /// Commit HEAD points at.
    fn head_commit(&self) -> Result<Oid>;

    // === Commit Lookup ===

    /// Get the commit ID for a branch.
    fn branch_commit(&self, branch: &str) -> Result<Oid>;

    /// Resolve a revision expression to a commit.
    fn resolve_commit(&self, revision: &str) -> Result<Oid>;

    /// First parent of a commit.
    fn commit_parent(&self, oid: Oid) -> Result<Option<Oid>>;

    /// First line of a commit's message.
    fn commit_summary(&self, oid: Oid) -> Result<String>;

    /// Non-merge commits reachable from `tip` but not `upstream`, oldest first.
    fn commits_to_replay(&self, upstream: Oid, tip: Oid) -> Result<Vec<Oid>>;

    // === Working Directory ===

    /// Require that tracked files are unmodified.
    fn require_clean(&self) -> Result<()>;

    /// Paths with unresolved conflicts in the index.
    fn conflicting_files(&self) -> Result<Vec<String>>;

    // === Rebase Primitives ===

    /// Detach HEAD at a commit and check it out.
    fn checkout_detached(&self, commit: Oid, options: &CheckoutOptions) -> Result<()>;

    /// Apply a commit's changes on top of HEAD into index and workdir.
    fn materialize(
        &self,
        commit: Oid,
        options: &CheckoutOptions,
        fast_forward: bool,
    ) -> Result<Materialized>;

    /// Commit the index on top of HEAD using `original`'s author and message.
    fn commit_index(&self, original: Oid, committer: &Signature<'_>) -> Result<CommitOutcome>;

    /// Move `branch` to HEAD and attach HEAD to it.
    fn finish_rebase(&self, branch: Option<&str>, onto: Oid) -> Result<Oid>;

    /// Restore HEAD, index and workdir to a snapshot.
    fn restore(&self, branch: Option<&str>, head: Oid, options: &CheckoutOptions) -> Result<()>;

    /// Reset index and workdir to HEAD after a step failed part-way.
    fn discard_step(&self, options: &CheckoutOptions) -> Result<()>;
}

impl GitOps for Repository {
    fn git_dir(&self) -> &Path {
        Self::git_dir(self)
    }

    fn operation_flag(&self) -> &OperationFlag {
        Self::operation_flag(self)
    }

    fn pending_operation(&self) -> Option<SequenceOperation> {
        Self::pending_operation(self)
    }

    fn current_branch(&self) -> Result<String> {
        Self::current_branch(self)
    }

    fn head_detached(&self) -> Result<bool> {
        Self::head_detached(self)
    }

    fn head_commit(&self) -> Result<Oid> {
        Self::head_commit(self)
    }

    fn branch_commit(&self, branch: &str) -> Result<Oid> {
        Self::branch_commit(self, branch)
    }

    fn resolve_commit(&self, revision: &str) -> Result<Oid> {
        Self::resolve_commit(self, revision)
    }

    fn commit_parent(&self, oid: Oid) -> Result<Option<Oid>> {
        Self::commit_parent(self, oid)
    }

    fn commit_summary(&self, oid: Oid) -> Result<String> {
        Self::commit_summary(self, oid)
    }

    fn commits_to_replay(&self, upstream: Oid, tip: Oid) -> Result<Vec<Oid>> {
        Self::commits_to_replay(self, upstream, tip)
    }

    fn require_clean(&self) -> Result<()> {
        Self::require_clean(self)
    }

    fn conflicting_files(&self) -> Result<Vec<String>> {
        Self::conflicting_files(self)
    }

    fn checkout_detached(&self, commit: Oid, options: &CheckoutOptions) -> Result<()> {
        Self::checkout_detached(self, commit, options)
    }

    fn materialize(
        &self,
        commit: Oid,
        options: &CheckoutOptions,
        fast_forward: bool,
    ) -> Result<Materialized> {
        Self::materialize(self, commit, options, fast_forward)
    }

    fn commit_index(&self, original: Oid, committer: &Signature<'_>) -> Result<CommitOutcome> {
        Self::commit_index(self, original, committer)
    }

    fn finish_rebase(&self, branch: Option<&str>, onto: Oid) -> Result<Oid> {
        Self::finish_rebase(self, branch, onto)
    }

    fn restore(&self, branch: Option<&str>, head: Oid, options: &CheckoutOptions) -> Result<()> {
        Self::restore(self, branch, head, options)
    }

    fn discard_step(&self, options: &CheckoutOptions) -> Result<()> {
        Self::discard_step(self, options)
    }
}
