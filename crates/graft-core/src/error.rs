//! Error types for graft-core.

use std::path::PathBuf;

use graft_git::SequenceOperation;

use crate::step::StepOperation;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in graft-core operations.
///
/// Conflicts and already-applied steps are not errors; they are reported
/// through [`RebaseResult`](crate::RebaseResult) and
/// [`StepResult`](crate::StepResult).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The path isn't a git directory.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepository,

    /// Another stateful operation holds the repository.
    #[error("{0} already in progress - continue or abort it first")]
    OperationAlreadyInProgress(SequenceOperation),

    /// Continue/abort without a persisted rebase.
    #[error("no rebase in progress")]
    NoRebaseInProgress,

    /// Step descriptor violates its construction rules.
    #[error("invalid rebase step: {0}")]
    InvalidStep(String),

    /// Step lookup outside the plan.
    #[error("step index {index} out of range (rebase has {total} steps)")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of steps in the rebase.
        total: usize,
    },

    /// Step kind the executor can't apply.
    #[error("unsupported rebase step operation '{0}'")]
    UnsupportedStepOperation(StepOperation),

    /// Bookkeeping disagreement between sequencer, store and substrate.
    #[error("rebase sequencer out of sync: {0}")]
    SequencerDesync(String),

    /// The rebase completed but its persisted state could not be cleared.
    #[error("rebase finished but its state could not be cleared: {0}")]
    FinishFailed(#[source] Box<Error>),

    /// State file parsing error.
    #[error("failed to parse {file}: {message}")]
    StateParseError { file: PathBuf, message: String },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Git operation error.
    #[error("git error: {0}")]
    Git(#[from] graft_git::Error),
}

impl Error {
    pub(crate) fn desync(message: impl Into<String>) -> Self {
        Self::SequencerDesync(message.into())
    }
}
