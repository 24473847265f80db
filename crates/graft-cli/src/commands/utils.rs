use anyhow::{Context, Result};
use graft_core::{Config, State};
use graft_git::Repository;
use tracing::debug;

/// Helper to open repo, state and config.
pub fn open_repo_and_state() -> Result<(Repository, State, Config)> {
    let repo = Repository::open_current().context("Not inside a git repository")?;
    if repo.workdir().is_none() {
        return Err(graft_git::Error::BareRepository.into());
    }

    let state = State::new(repo.git_dir())?;
    let config = state.load_config().context("Failed to read .git/graft/config.toml")?;
    let state = state.with_durable_writes(config.rebase.durable_writes);
    debug!(
        git_dir = %repo.git_dir().display(),
        conflict_style = ?config.rebase.conflict_style,
        force_rewrite = config.rebase.force_rewrite,
        durable_writes = config.rebase.durable_writes,
        "opened repository"
    );

    Ok((repo, state, config))
}

/// First eight characters of a commit id.
pub fn short(oid: graft_git::Oid) -> String {
    oid.to_string().chars().take(8).collect()
}
