//! Step descriptors: one instruction of a rebase plan.

use std::fmt;
use std::str::FromStr;

use graft_git::Oid;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of a rebase instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOperation {
    /// Reapply the commit as-is.
    Pick,
    /// Reapply and edit the message.
    Reword,
    /// Reapply and stop for amending.
    Edit,
    /// Fold into the previous commit, combining messages.
    Squash,
    /// Fold into the previous commit, discarding the message.
    Fixup,
    /// Run a shell command.
    Exec,
}

impl StepOperation {
    /// Every kind except `Exec` targets a commit.
    #[must_use]
    pub const fn targets_commit(self) -> bool {
        !matches!(self, Self::Exec)
    }

    /// The todo-list word for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pick => "pick",
            Self::Reword => "reword",
            Self::Edit => "edit",
            Self::Squash => "squash",
            Self::Fixup => "fixup",
            Self::Exec => "exec",
        }
    }
}

impl fmt::Display for StepOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pick" | "p" => Ok(Self::Pick),
            "reword" | "r" => Ok(Self::Reword),
            "edit" | "e" => Ok(Self::Edit),
            "squash" | "s" => Ok(Self::Squash),
            "fixup" | "f" => Ok(Self::Fixup),
            "exec" | "x" => Ok(Self::Exec),
            other => Err(Error::InvalidStep(format!("unknown operation '{other}'"))),
        }
    }
}

/// One immutable instruction in a rebase, with its position in the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StepRecord", into = "StepRecord")]
pub struct RebaseStep {
    operation: StepOperation,
    commit: Option<Oid>,
    exec: Option<String>,
    index: usize,
    total: usize,
}

impl RebaseStep {
    /// Build a validated step.
    ///
    /// Commit-targeting kinds need a commit and no command; `Exec` needs a
    /// non-empty command and no commit; `index` must lie inside `total`.
    ///
    /// # Errors
    /// Returns `InvalidStep` when any of those rules is broken.
    pub fn new(
        operation: StepOperation,
        commit: Option<Oid>,
        exec: Option<String>,
        index: usize,
        total: usize,
    ) -> Result<Self> {
        if index >= total {
            return Err(Error::InvalidStep(format!(
                "position {index} outside a plan of {total} steps"
            )));
        }

        if operation.targets_commit() {
            if commit.is_none() {
                return Err(Error::InvalidStep(format!("{operation} requires a commit")));
            }
            if exec.is_some() {
                return Err(Error::InvalidStep(format!(
                    "{operation} does not take a command"
                )));
            }
        } else {
            if commit.is_some() {
                return Err(Error::InvalidStep("exec does not take a commit".into()));
            }
            if exec.as_deref().is_none_or(|cmd| cmd.trim().is_empty()) {
                return Err(Error::InvalidStep("exec requires a command".into()));
            }
        }

        Ok(Self {
            operation,
            commit,
            exec,
            index,
            total,
        })
    }

    /// A pick of `commit` at `index` of `total`.
    ///
    /// # Errors
    /// Returns `InvalidStep` if `index >= total`.
    pub fn pick(commit: Oid, index: usize, total: usize) -> Result<Self> {
        Self::new(StepOperation::Pick, Some(commit), None, index, total)
    }

    /// An exec of `command` at `index` of `total`.
    ///
    /// # Errors
    /// Returns `InvalidStep` if the command is blank or `index >= total`.
    pub fn exec(command: impl Into<String>, index: usize, total: usize) -> Result<Self> {
        Self::new(StepOperation::Exec, None, Some(command.into()), index, total)
    }

    /// What this step does.
    #[must_use]
    pub const fn operation(&self) -> StepOperation {
        self.operation
    }

    /// Target commit; `None` only for `Exec`.
    #[must_use]
    pub const fn commit(&self) -> Option<Oid> {
        self.commit
    }

    /// Shell command; `Some` only for `Exec`.
    #[must_use]
    pub fn exec_command(&self) -> Option<&str> {
        self.exec.as_deref()
    }

    /// Zero-based position in the plan.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Number of steps in the plan.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }
}

impl fmt::Display for RebaseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let position = format!("({}/{})", self.index + 1, self.total);
        match (&self.commit, &self.exec) {
            (Some(commit), _) => {
                let sha = commit.to_string();
                write!(f, "{} {} {position}", self.operation, &sha[..8.min(sha.len())])
            }
            (None, Some(cmd)) => write!(f, "{} {cmd} {position}", self.operation),
            (None, None) => write!(f, "{} {position}", self.operation),
        }
    }
}

/// On-disk shape of a step; validated back into a [`RebaseStep`] on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StepRecord {
    operation: StepOperation,
    #[serde(
        default,
        with = "crate::serde_oid::option",
        skip_serializing_if = "Option::is_none"
    )]
    commit: Option<Oid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exec: Option<String>,
    index: usize,
    total: usize,
}

impl TryFrom<StepRecord> for RebaseStep {
    type Error = Error;

    fn try_from(record: StepRecord) -> Result<Self> {
        Self::new(
            record.operation,
            record.commit,
            record.exec,
            record.index,
            record.total,
        )
    }
}

impl From<RebaseStep> for StepRecord {
    fn from(step: RebaseStep) -> Self {
        Self {
            operation: step.operation,
            commit: step.commit,
            exec: step.exec,
            index: step.index,
            total: step.total,
        }
    }
}
