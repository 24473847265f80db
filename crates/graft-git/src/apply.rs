//! Primitives the rebase engine drives: detached checkout, cherry-pick
//! materialization, commit creation from the index, and ref restoration.

use git2::{CherrypickOptions, Oid, ResetType, Signature};
use tracing::{debug, info};

use crate::Repository;
use crate::checkout::CheckoutOptions;
use crate::error::Result;

/// What the cherry-pick primitive just wrote into the index and workdir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    /// The commit whose changes were applied.
    pub commit: Oid,
    /// Paths left with conflict markers; empty when fully merged.
    pub conflicts: Vec<String>,
    /// HEAD moved straight to `commit` because it already sat on HEAD.
    pub fast_forwarded: bool,
}

impl Materialized {
    /// Whether the index is fully merged.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Outcome of committing the current index on top of HEAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A new commit was written and HEAD advanced to it.
    Created(Oid),
    /// The index tree equals HEAD's tree; nothing was written.
    Unchanged,
}

fn short(oid: Oid) -> String {
    oid.to_string().chars().take(8).collect()
}

impl Repository {
    /// Detach HEAD at `commit` and check out its tree.
    ///
    /// # Errors
    /// Returns error if the commit doesn't exist or checkout fails.
    pub fn checkout_detached(&self, commit: Oid, options: &CheckoutOptions) -> Result<()> {
        let target = self.find_commit(commit)?;
        let mut builder = options.builder();
        self.inner()
            .checkout_tree(target.as_object(), Some(&mut builder))?;
        self.inner().set_head_detached(commit)?;
        debug!(commit = %short(commit), "detached HEAD");
        Ok(())
    }

    /// Apply the changes introduced by `commit` on top of HEAD.
    ///
    /// Writes the merged result (with conflict markers if any) into the index
    /// and working directory, then clears git's cherry-pick state files so the
    /// repository stays under the rebase engine's control. When
    /// `fast_forward` is set and `commit`'s parent already is HEAD, HEAD is
    /// moved to `commit` instead.
    ///
    /// # Errors
    /// Returns error if the commit doesn't exist or the merge fails outright.
    pub fn materialize(
        &self,
        commit: Oid,
        options: &CheckoutOptions,
        fast_forward: bool,
    ) -> Result<Materialized> {
        let picked = self.find_commit(commit)?;
        let head = self.head_commit()?;

        if fast_forward && picked.parent_count() == 1 && picked.parent_id(0)? == head {
            self.checkout_detached(commit, options)?;
            return Ok(Materialized {
                commit,
                conflicts: vec![],
                fast_forwarded: true,
            });
        }

        let mut cherrypick = CherrypickOptions::new();
        cherrypick.checkout_builder(options.builder());
        if picked.parent_count() > 1 {
            cherrypick.mainline(1);
        }
        self.inner().cherrypick(&picked, Some(&mut cherrypick))?;
        self.inner().cleanup_state()?;

        let conflicts = self.conflicting_files()?;
        debug!(
            commit = %short(commit),
            onto = %short(head),
            conflicts = conflicts.len(),
            "materialized commit"
        );

        Ok(Materialized {
            commit,
            conflicts,
            fast_forwarded: false,
        })
    }

    /// Commit the index on top of HEAD, reusing `original`'s author and message.
    ///
    /// # Errors
    /// Returns error if the index has conflicts or the commit can't be written.
    pub fn commit_index(&self, original: Oid, committer: &Signature<'_>) -> Result<CommitOutcome> {
        let mut index = self.inner().index()?;
        index.read(false)?;
        let tree_id = index.write_tree()?;

        let head = self.find_commit(self.head_commit()?)?;
        if head.tree_id() == tree_id {
            debug!(original = %short(original), "tree unchanged, skipping commit");
            return Ok(CommitOutcome::Unchanged);
        }

        let original = self.find_commit(original)?;
        let tree = self.inner().find_tree(tree_id)?;
        let message = original.message_raw().unwrap_or_default();
        let oid = self.inner().commit(
            Some("HEAD"),
            &original.author(),
            committer,
            message,
            &tree,
            &[&head],
        )?;

        debug!(original = %short(original.id()), new = %short(oid), "created commit");
        Ok(CommitOutcome::Created(oid))
    }

    /// Point `branch` at HEAD and attach HEAD to it.
    ///
    /// With no branch (the rebase started from a detached HEAD) HEAD simply
    /// stays where it is. Returns the final tip.
    ///
    /// # Errors
    /// Returns error if the ref update fails.
    pub fn finish_rebase(&self, branch: Option<&str>, onto: Oid) -> Result<Oid> {
        let tip = self.head_commit()?;
        if let Some(branch) = branch {
            let refname = format!("refs/heads/{branch}");
            self.inner().reference(
                &refname,
                tip,
                true,
                &format!("graft (finish): {refname} onto {}", short(onto)),
            )?;
            self.inner().set_head(&refname)?;
        }
        info!(branch = branch.unwrap_or("(detached)"), tip = %short(tip), "rebase finished");
        Ok(tip)
    }

    /// Put HEAD, index and working directory back to a saved snapshot.
    ///
    /// # Errors
    /// Returns error if the snapshot commit is gone or the reset fails.
    pub fn restore(&self, branch: Option<&str>, head: Oid, options: &CheckoutOptions) -> Result<()> {
        let commit = self.find_commit(head)?;

        if let Some(branch) = branch {
            let refname = format!("refs/heads/{branch}");
            self.inner().reference(
                &refname,
                head,
                true,
                &format!("graft (abort): returning to {refname}"),
            )?;
            self.inner().set_head(&refname)?;
        } else {
            self.inner().set_head_detached(head)?;
        }

        let mut builder = options.forced().builder();
        self.inner()
            .reset(commit.as_object(), ResetType::Hard, Some(&mut builder))?;
        self.inner().cleanup_state()?;

        info!(branch = branch.unwrap_or("(detached)"), head = %short(head), "restored snapshot");
        Ok(())
    }

    /// Throw away whatever a failed step left in the index and working
    /// directory, keeping HEAD where it is.
    ///
    /// # Errors
    /// Returns error if HEAD can't be resolved or the reset fails.
    pub fn discard_step(&self, options: &CheckoutOptions) -> Result<()> {
        let head = self.head_commit()?;
        let commit = self.find_commit(head)?;
        let mut builder = options.forced().builder();
        self.inner()
            .reset(commit.as_object(), ResetType::Hard, Some(&mut builder))?;
        self.inner().cleanup_state()?;

        debug!(head = %short(head), "discarded partial step");
        Ok(())
    }
}
