//! Per-repository mutual exclusion for stateful sequence operations.
//!
//! At most one of rebase, merge, cherry-pick (and friends) may be active on a
//! repository at a time. Inside a process this is enforced by an
//! [`OperationFlag`] owned by each [`Repository`](crate::Repository); across
//! processes the persisted state files and git's own state files do the job.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use git2::RepositoryState;

/// A stateful operation that can hold a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceOperation {
    /// Rebase (ours, or git's own rebase-merge/rebase-apply).
    Rebase,
    /// Merge with a pending MERGE_HEAD.
    Merge,
    /// Cherry-pick with a pending CHERRY_PICK_HEAD.
    CherryPick,
    /// Revert with a pending REVERT_HEAD.
    Revert,
    /// Bisect session.
    Bisect,
    /// `git am` mailbox application.
    ApplyMailbox,
}

impl SequenceOperation {
    const fn to_raw(self) -> u8 {
        match self {
            Self::Rebase => 1,
            Self::Merge => 2,
            Self::CherryPick => 3,
            Self::Revert => 4,
            Self::Bisect => 5,
            Self::ApplyMailbox => 6,
        }
    }

    const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::Rebase),
            2 => Some(Self::Merge),
            3 => Some(Self::CherryPick),
            4 => Some(Self::Revert),
            5 => Some(Self::Bisect),
            6 => Some(Self::ApplyMailbox),
            _ => None,
        }
    }

    /// Map git's on-disk repository state to an operation, if any.
    #[must_use]
    pub const fn from_repository_state(state: RepositoryState) -> Option<Self> {
        match state {
            RepositoryState::Clean => None,
            RepositoryState::Merge => Some(Self::Merge),
            RepositoryState::Revert | RepositoryState::RevertSequence => Some(Self::Revert),
            RepositoryState::CherryPick | RepositoryState::CherryPickSequence => {
                Some(Self::CherryPick)
            }
            RepositoryState::Bisect => Some(Self::Bisect),
            RepositoryState::Rebase
            | RepositoryState::RebaseInteractive
            | RepositoryState::RebaseMerge => Some(Self::Rebase),
            RepositoryState::ApplyMailbox | RepositoryState::ApplyMailboxOrRebase => {
                Some(Self::ApplyMailbox)
            }
        }
    }
}

impl fmt::Display for SequenceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rebase => "rebase",
            Self::Merge => "merge",
            Self::CherryPick => "cherry-pick",
            Self::Revert => "revert",
            Self::Bisect => "bisect",
            Self::ApplyMailbox => "am",
        };
        f.write_str(name)
    }
}

/// Atomic "current operation" slot owned by a single repository instance.
#[derive(Debug, Default)]
pub struct OperationFlag {
    current: AtomicU8,
}

impl OperationFlag {
    const IDLE: u8 = 0;

    /// Create an idle flag.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: AtomicU8::new(Self::IDLE),
        }
    }

    /// Test-and-set the flag for `operation`.
    ///
    /// The returned guard clears the flag when dropped.
    ///
    /// # Errors
    /// Returns the operation currently holding the flag.
    pub fn acquire(
        &self,
        operation: SequenceOperation,
    ) -> std::result::Result<OperationGuard<'_>, SequenceOperation> {
        match self.current.compare_exchange(
            Self::IDLE,
            operation.to_raw(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(OperationGuard {
                flag: self,
                operation,
            }),
            // An unknown raw value cannot be stored, but report a rebase rather than panic.
            Err(held) => Err(SequenceOperation::from_raw(held).unwrap_or(SequenceOperation::Rebase)),
        }
    }

    /// The operation currently holding the flag.
    #[must_use]
    pub fn current(&self) -> Option<SequenceOperation> {
        SequenceOperation::from_raw(self.current.load(Ordering::Acquire))
    }
}

/// Releases the [`OperationFlag`] on drop.
#[derive(Debug)]
#[must_use = "the operation flag is released as soon as the guard is dropped"]
pub struct OperationGuard<'a> {
    flag: &'a OperationFlag,
    operation: SequenceOperation,
}

impl OperationGuard<'_> {
    /// The operation this guard holds the repository for.
    #[must_use]
    pub const fn operation(&self) -> SequenceOperation {
        self.operation
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.flag.current.store(OperationFlag::IDLE, Ordering::Release);
    }
}
