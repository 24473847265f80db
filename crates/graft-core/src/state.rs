//! State persistence for the .git/graft/ directory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use graft_git::Oid;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::step::RebaseStep;
use crate::traits::StateStore;

/// Manages the .git/graft/ directory state.
#[derive(Debug)]
pub struct State {
    /// Path to the .git/graft/ directory.
    graft_dir: PathBuf,
    /// fsync state files and their directory on every write.
    durable: bool,
}

impl State {
    /// File names within .git/graft/
    const REBASE_FILE: &'static str = "rebase.json";
    const CONFIG_FILE: &'static str = "config.toml";

    /// Create a new State instance for the given git directory.
    ///
    /// # Errors
    /// Returns error if the git directory doesn't exist.
    pub fn new(git_dir: impl AsRef<Path>) -> Result<Self> {
        let git_dir = git_dir.as_ref();
        if !git_dir.is_dir() {
            return Err(Error::NotARepository);
        }

        Ok(Self {
            graft_dir: git_dir.join("graft"),
            durable: true,
        })
    }

    /// Turn fsync on state writes on or off.
    #[must_use]
    pub fn with_durable_writes(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Get the path to the graft directory.
    #[must_use]
    pub fn graft_dir(&self) -> &Path {
        &self.graft_dir
    }

    fn rebase_state_path(&self) -> PathBuf {
        self.graft_dir.join(Self::REBASE_FILE)
    }

    fn config_path(&self) -> PathBuf {
        self.graft_dir.join(Self::CONFIG_FILE)
    }

    // === Rebase state operations ===

    /// Check if a rebase is in progress.
    #[must_use]
    pub fn is_rebase_in_progress(&self) -> bool {
        self.rebase_state_path().exists()
    }

    /// Load the current rebase state.
    ///
    /// # Errors
    /// Returns `NoRebaseInProgress` if there is none, `StateParseError` if the
    /// file is unreadable as rebase state.
    pub fn load_rebase_state(&self) -> Result<RebaseState> {
        let path = self.rebase_state_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::NoRebaseInProgress),
            Err(e) => return Err(e.into()),
        };

        let state: RebaseState =
            serde_json::from_str(&content).map_err(|e| Error::StateParseError {
                file: path.clone(),
                message: e.to_string(),
            })?;
        state.validate().map_err(|message| Error::StateParseError {
            file: path,
            message,
        })?;
        Ok(state)
    }

    /// Save rebase state, replacing the previous file atomically.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save_rebase_state(&self, state: &RebaseState) -> Result<()> {
        let content = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.rebase_state_path(), &content, self.durable)?;
        Ok(())
    }

    /// Clear rebase state (called when a rebase finishes or aborts).
    ///
    /// # Errors
    /// Returns error if file removal fails.
    pub fn clear_rebase_state(&self) -> Result<()> {
        let path = self.rebase_state_path();
        if path.exists() {
            fs::remove_file(path)?;
            if self.durable {
                fsync_dir(&self.graft_dir)?;
            }
        }
        Ok(())
    }

    // === Config operations ===

    /// Load config, falling back to defaults when the file is missing.
    ///
    /// # Errors
    /// Returns error if the file exists but can't be parsed.
    pub fn load_config(&self) -> Result<Config> {
        Config::load(self.config_path())
    }
}

impl StateStore for State {
    fn is_rebase_in_progress(&self) -> bool {
        Self::is_rebase_in_progress(self)
    }

    fn load_rebase_state(&self) -> Result<RebaseState> {
        Self::load_rebase_state(self)
    }

    fn save_rebase_state(&self, state: &RebaseState) -> Result<()> {
        Self::save_rebase_state(self, state)
    }

    fn clear_rebase_state(&self) -> Result<()> {
        Self::clear_rebase_state(self)
    }
}

/// Write `bytes` to `path` via `<path>.tmp` and a rename, so readers see
/// either the old file or the new one and never a partial write.
fn write_atomic(path: &Path, bytes: &[u8], durable: bool) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::other("state path has no parent directory"))?;
    fs::create_dir_all(dir)?;

    let tmp_path = path.with_extension("json.tmp");
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(bytes)?;
        if durable {
            file.sync_all()?;
        }
    }

    fs::rename(&tmp_path, path)?;

    if durable {
        fsync_dir(dir)?;
    }
    Ok(())
}

/// Make directory entry changes (create, rename, unlink) durable.
fn fsync_dir(dir: &Path) -> io::Result<()> {
    // Directories can't be opened for syncing on Windows.
    if cfg!(windows) {
        return Ok(());
    }
    File::open(dir)?.sync_all()
}

/// Pre-rebase snapshot, resolved once when the rebase starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Branch being rebased; `None` when HEAD was detached.
    pub branch: Option<String>,

    /// Commit HEAD pointed at before the rebase.
    #[serde(with = "crate::serde_oid")]
    pub head: Oid,

    /// Commits reachable from here are not replayed.
    #[serde(with = "crate::serde_oid")]
    pub upstream: Oid,

    /// New base the steps are replayed onto.
    #[serde(with = "crate::serde_oid")]
    pub onto: Oid,
}

/// Persisted record of an in-progress rebase.
///
/// The step list is fixed at creation. `last_applied` is the cursor: the
/// last step whose result is committed (`None` before any step ran).
/// `in_progress` names a step that was materialized but not yet committed,
/// e.g. because it stopped on conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseState {
    version: u32,

    /// When the rebase started.
    pub started_at: DateTime<Utc>,

    /// What to restore on abort, and where the result goes on finish.
    pub snapshot: Snapshot,

    steps: Vec<RebaseStep>,

    #[serde(default)]
    last_applied: Option<usize>,

    #[serde(default)]
    in_progress: Option<usize>,
}

impl RebaseState {
    const VERSION: u32 = 1;

    /// Create state for a fresh rebase.
    ///
    /// # Errors
    /// Returns `InvalidStep` if the steps aren't numbered `0..n` of `n`.
    pub fn new(snapshot: Snapshot, steps: Vec<RebaseStep>) -> Result<Self> {
        check_numbering(&steps).map_err(Error::InvalidStep)?;
        Ok(Self {
            version: Self::VERSION,
            started_at: Utc::now(),
            snapshot,
            steps,
            last_applied: None,
            in_progress: None,
        })
    }

    /// Check invariants of state read back from disk.
    fn validate(&self) -> std::result::Result<(), String> {
        if self.version != Self::VERSION {
            return Err(format!(
                "unsupported state version {} (expected {})",
                self.version,
                Self::VERSION
            ));
        }
        check_numbering(&self.steps)?;
        if self.next_index() > self.steps.len() {
            return Err(format!(
                "cursor {:?} beyond {} steps",
                self.last_applied,
                self.steps.len()
            ));
        }
        if let Some(index) = self.in_progress.filter(|&i| i != self.next_index()) {
            return Err(format!(
                "step {index} in progress but cursor expects {}",
                self.next_index()
            ));
        }
        Ok(())
    }

    /// All steps, in order.
    #[must_use]
    pub fn steps(&self) -> &[RebaseStep] {
        &self.steps
    }

    /// Number of steps; fixed for the life of the rebase.
    #[must_use]
    pub fn total_step_count(&self) -> usize {
        self.steps.len()
    }

    /// Step at `index`.
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` if `index >= total_step_count()`.
    pub fn step_at(&self, index: usize) -> Result<&RebaseStep> {
        self.steps.get(index).ok_or(Error::IndexOutOfRange {
            index,
            total: self.steps.len(),
        })
    }

    /// Last applied step; `None` before the first one.
    #[must_use]
    pub const fn last_applied(&self) -> Option<usize> {
        self.last_applied
    }

    /// Index of the next step to run, equal to the step count when done.
    #[must_use]
    pub fn next_index(&self) -> usize {
        self.last_applied.map_or(0, |last| last + 1)
    }

    /// Step materialized but not yet committed.
    #[must_use]
    pub const fn in_progress(&self) -> Option<usize> {
        self.in_progress
    }

    /// The step a caller would consider "current": the open step if there is
    /// one, otherwise the last applied step.
    #[must_use]
    pub fn current_step(&self) -> Option<&RebaseStep> {
        self.in_progress
            .or(self.last_applied)
            .and_then(|index| self.steps.get(index))
    }

    /// Every step has been applied.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.next_index() == self.steps.len()
    }

    /// Record that step `index` is being materialized.
    ///
    /// # Errors
    /// Returns `SequencerDesync` unless `index` is the next step.
    pub fn begin_step(&mut self, index: usize) -> Result<()> {
        if index != self.next_index() {
            return Err(Error::desync(format!(
                "asked to start step {index} but next step is {}",
                self.next_index()
            )));
        }
        self.in_progress = Some(index);
        Ok(())
    }

    /// Forget that step `index` was started, so it runs again from scratch.
    ///
    /// # Errors
    /// Returns `SequencerDesync` unless `index` is the step in progress.
    pub fn abandon_step(&mut self, index: usize) -> Result<()> {
        if self.in_progress != Some(index) {
            return Err(Error::desync(format!(
                "asked to abandon step {index} but step in progress is {:?}",
                self.in_progress
            )));
        }
        self.in_progress = None;
        Ok(())
    }

    /// Advance the cursor past step `index`.
    ///
    /// # Errors
    /// Returns `SequencerDesync` unless `index` is the next step.
    pub fn complete_step(&mut self, index: usize) -> Result<()> {
        if index != self.next_index() || index >= self.steps.len() {
            return Err(Error::desync(format!(
                "asked to complete step {index} but next step is {}",
                self.next_index()
            )));
        }
        self.last_applied = Some(index);
        self.in_progress = None;
        Ok(())
    }
}

fn check_numbering(steps: &[RebaseStep]) -> std::result::Result<(), String> {
    let total = steps.len();
    for (position, step) in steps.iter().enumerate() {
        if step.index() != position || step.total() != total {
            return Err(format!(
                "step numbered {}/{} found at position {position} of {total}",
                step.index(),
                step.total()
            ));
        }
    }
    Ok(())
}
