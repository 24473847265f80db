//! Repository wrapper providing high-level git operations.

use std::path::Path;

use git2::{BranchType, ErrorCode, Oid, Signature, Sort, StatusOptions};
use tracing::debug;

use crate::error::{Error, Result};
use crate::operation::{OperationFlag, SequenceOperation};

/// High-level wrapper around a git repository.
///
/// Each instance owns its own [`OperationFlag`], so two repositories open in
/// the same process never block each other.
pub struct Repository {
    inner: git2::Repository,
    operation: OperationFlag,
}

impl Repository {
    /// Open a repository at the given path.
    ///
    /// # Errors
    /// Returns error if no repository found at path or any parent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let inner = git2::Repository::discover(path).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                Error::NotARepository
            } else {
                Error::Git2(e)
            }
        })?;
        Ok(Self::from_git2(inner))
    }

    /// Open the repository containing the current directory.
    ///
    /// # Errors
    /// Returns error if not inside a git repository.
    pub fn open_current() -> Result<Self> {
        Self::open(".")
    }

    /// Wrap an already-open git2 repository.
    #[must_use]
    pub fn from_git2(inner: git2::Repository) -> Self {
        Self {
            inner,
            operation: OperationFlag::new(),
        }
    }

    /// Get the path to the repository root (workdir).
    #[must_use]
    pub fn workdir(&self) -> Option<&Path> {
        self.inner.workdir()
    }

    /// Get the path to the .git directory.
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        self.inner.path()
    }

    /// The in-process operation flag for this repository.
    #[must_use]
    pub const fn operation_flag(&self) -> &OperationFlag {
        &self.operation
    }

    /// Stateful operation git itself has recorded on disk, if any.
    #[must_use]
    pub fn pending_operation(&self) -> Option<SequenceOperation> {
        SequenceOperation::from_repository_state(self.inner.state())
    }

    // === HEAD and branches ===

    /// Get the name of the current branch.
    ///
    /// # Errors
    /// Returns error if HEAD is detached.
    pub fn current_branch(&self) -> Result<String> {
        let head = self.head_reference()?;
        if !head.is_branch() {
            return Err(Error::DetachedHead);
        }

        head.shorthand()
            .map(String::from)
            .ok_or(Error::DetachedHead)
    }

    /// Check if HEAD is detached.
    ///
    /// # Errors
    /// Returns error if HEAD cannot be read.
    pub fn head_detached(&self) -> Result<bool> {
        Ok(self.inner.head_detached()?)
    }

    /// Commit HEAD points at.
    ///
    /// # Errors
    /// Returns `UnbornHead` if there is no commit yet.
    pub fn head_commit(&self) -> Result<Oid> {
        Ok(self.head_reference()?.peel_to_commit()?.id())
    }

    fn head_reference(&self) -> Result<git2::Reference<'_>> {
        self.inner.head().map_err(|e| {
            if e.code() == ErrorCode::UnbornBranch {
                Error::UnbornHead
            } else {
                Error::Git2(e)
            }
        })
    }

    /// Get the commit SHA for a branch.
    ///
    /// # Errors
    /// Returns error if branch doesn't exist.
    pub fn branch_commit(&self, branch_name: &str) -> Result<Oid> {
        let branch = self
            .inner
            .find_branch(branch_name, BranchType::Local)
            .map_err(|_| Error::BranchNotFound(branch_name.into()))?;

        branch
            .get()
            .target()
            .ok_or_else(|| Error::BranchNotFound(branch_name.into()))
    }

    // === Commit lookup ===

    /// Resolve any revision expression (`main`, `HEAD~2`, a SHA) to a commit.
    ///
    /// # Errors
    /// Returns `RevisionNotFound` if it doesn't name a commit.
    pub fn resolve_commit(&self, revision: &str) -> Result<Oid> {
        let object = self
            .inner
            .revparse_single(revision)
            .map_err(|_| Error::RevisionNotFound(revision.into()))?;
        let commit = object
            .peel_to_commit()
            .map_err(|_| Error::RevisionNotFound(revision.into()))?;
        Ok(commit.id())
    }

    /// Get a commit by its SHA.
    ///
    /// # Errors
    /// Returns error if commit not found.
    pub fn find_commit(&self, oid: Oid) -> Result<git2::Commit<'_>> {
        Ok(self.inner.find_commit(oid)?)
    }

    /// First parent of a commit, `None` for a root commit.
    ///
    /// # Errors
    /// Returns error if the commit doesn't exist.
    pub fn commit_parent(&self, oid: Oid) -> Result<Option<Oid>> {
        let commit = self.find_commit(oid)?;
        Ok(commit.parent_ids().next())
    }

    /// First line of a commit's message.
    ///
    /// # Errors
    /// Returns error if the commit doesn't exist.
    pub fn commit_summary(&self, oid: Oid) -> Result<String> {
        let commit = self.find_commit(oid)?;
        Ok(commit.summary().unwrap_or_default().to_string())
    }

    /// Commits reachable from `tip` but not from `upstream`, oldest first.
    ///
    /// Merge commits are left out, matching a plain `git rebase`.
    ///
    /// # Errors
    /// Returns error if revwalk fails.
    pub fn commits_to_replay(&self, upstream: Oid, tip: Oid) -> Result<Vec<Oid>> {
        let mut revwalk = self.inner.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        revwalk.push(tip)?;
        revwalk.hide(upstream)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid?;
            if self.find_commit(oid)?.parent_count() > 1 {
                debug!(%oid, "skipping merge commit");
                continue;
            }
            commits.push(oid);
        }

        Ok(commits)
    }

    // === Working directory state ===

    /// Check if tracked files match HEAD. Untracked files are ignored.
    ///
    /// # Errors
    /// Returns error if status check fails.
    pub fn is_clean(&self) -> Result<bool> {
        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);
        let statuses = self.inner.statuses(Some(&mut options))?;
        Ok(statuses.is_empty())
    }

    /// Ensure working directory is clean, returning error if not.
    ///
    /// # Errors
    /// Returns `DirtyWorkingDirectory` if there are uncommitted changes.
    pub fn require_clean(&self) -> Result<()> {
        if self.is_clean()? {
            Ok(())
        } else {
            Err(Error::DirtyWorkingDirectory)
        }
    }

    /// Paths with unresolved conflicts in the index.
    ///
    /// # Errors
    /// Returns error if the index can't be read.
    pub fn conflicting_files(&self) -> Result<Vec<String>> {
        let mut index = self.inner.index()?;
        index.read(false)?;
        if !index.has_conflicts() {
            return Ok(vec![]);
        }

        let mut files = Vec::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
            if let Some(entry) = entry {
                let path = String::from_utf8_lossy(&entry.path).into_owned();
                if !files.contains(&path) {
                    files.push(path);
                }
            }
        }

        Ok(files)
    }

    // === Signature ===

    /// Get the default signature for commits.
    ///
    /// # Errors
    /// Returns error if git config doesn't have user.name/email.
    pub fn signature(&self) -> Result<Signature<'static>> {
        Ok(self.inner.signature()?)
    }

    // === Low-level access ===

    /// Get a reference to the underlying git2 repository.
    ///
    /// Use sparingly - prefer high-level methods.
    #[must_use]
    pub const fn inner(&self) -> &git2::Repository {
        &self.inner
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.git_dir())
            .field("operation", &self.operation.current())
            .finish()
    }
}
