//! Computing the todo list a rebase will run.

use graft_git::{GitOps, Oid};
use tracing::debug;

use crate::error::{Error, Result};
use crate::state::Snapshot;
use crate::step::{RebaseStep, StepOperation};

/// One editable line of a plan, before positions are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoEntry {
    pub operation: StepOperation,
    pub commit: Option<Oid>,
    pub exec: Option<String>,
}

impl TodoEntry {
    /// Replay `commit`.
    #[must_use]
    pub const fn pick(commit: Oid) -> Self {
        Self {
            operation: StepOperation::Pick,
            commit: Some(commit),
            exec: None,
        }
    }

    #[must_use]
    pub fn exec(command: impl Into<String>) -> Self {
        Self {
            operation: StepOperation::Exec,
            commit: None,
            exec: Some(command.into()),
        }
    }
}

/// A rebase that has been resolved but not started.
///
/// All references are resolved to commit ids here, once. The todo list can
/// be edited before it is handed to [`Rebaser::start_plan`](crate::Rebaser::start_plan).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebasePlan {
    snapshot: Snapshot,
    todo: Vec<TodoEntry>,
}

impl RebasePlan {
    /// Resolve `branch`, `upstream` and `onto` and list the commits to replay.
    ///
    /// `branch` defaults to the checked-out branch (or the detached HEAD),
    /// `onto` to `upstream`.
    ///
    /// # Errors
    /// Returns error if any reference fails to resolve.
    pub fn compute<G: GitOps>(
        repo: &G,
        branch: Option<&str>,
        upstream: &str,
        onto: Option<&str>,
    ) -> Result<Self> {
        let (branch, head) = match branch {
            Some(name) => (Some(name.to_string()), repo.branch_commit(name)?),
            None if repo.head_detached()? => (None, repo.head_commit()?),
            None => {
                let name = repo.current_branch()?;
                let head = repo.branch_commit(&name)?;
                (Some(name), head)
            }
        };

        let upstream = repo.resolve_commit(upstream)?;
        let onto = match onto {
            Some(rev) => repo.resolve_commit(rev)?,
            None => upstream,
        };

        let todo = repo
            .commits_to_replay(upstream, head)?
            .into_iter()
            .map(TodoEntry::pick)
            .collect::<Vec<_>>();

        debug!(
            branch = branch.as_deref().unwrap_or("(detached)"),
            %head,
            %upstream,
            %onto,
            steps = todo.len(),
            "computed rebase plan"
        );

        Ok(Self {
            snapshot: Snapshot {
                branch,
                head,
                upstream,
                onto,
            },
            todo,
        })
    }

    /// References captured before the rebase.
    #[must_use]
    pub const fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The todo list in replay order.
    #[must_use]
    pub fn todo(&self) -> &[TodoEntry] {
        &self.todo
    }

    /// Edit the todo list: reorder, drop, change kinds, insert exec lines.
    pub fn todo_mut(&mut self) -> &mut Vec<TodoEntry> {
        &mut self.todo
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.todo.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.todo.is_empty()
    }

    /// Number the entries and validate them into steps.
    ///
    /// # Errors
    /// Returns `InvalidStep` if an entry breaks the step rules or names a
    /// commit that doesn't exist.
    pub fn into_steps<G: GitOps>(self, repo: &G) -> Result<(Snapshot, Vec<RebaseStep>)> {
        let total = self.todo.len();
        let steps = self
            .todo
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                if let Some(commit) = entry.commit {
                    repo.commit_summary(commit).map_err(|_| {
                        Error::InvalidStep(format!("commit {commit} not found"))
                    })?;
                }
                RebaseStep::new(entry.operation, entry.commit, entry.exec, index, total)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((self.snapshot, steps))
    }
}
