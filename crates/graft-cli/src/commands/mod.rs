//! CLI command definitions.

use clap::{Parser, Subcommand};
use clap_complete::Shell;

pub mod completions;
pub mod rebase;
pub mod status;
pub mod utils;

/// Graft - resumable rebases with continue and abort.
#[derive(Parser)]
#[command(name = "graft")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Suppress informational output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log engine activity to stderr (overridden by GRAFT_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay the current branch's commits onto a new base
    #[command(alias = "rb")]
    Rebase {
        /// Commits reachable from here are not replayed
        #[arg(required_unless_present_any = ["continue_", "abort"])]
        upstream: Option<String>,

        /// New base (defaults to UPSTREAM)
        #[arg(long, value_name = "REV")]
        onto: Option<String>,

        /// Branch to rebase (defaults to the checked-out branch)
        #[arg(short, long, value_name = "NAME")]
        branch: Option<String>,

        /// Pause after applying this many steps
        #[arg(long, value_name = "N")]
        max_steps: Option<usize>,

        /// Create new commits even where a pick could fast-forward
        #[arg(long)]
        force_rewrite: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Commit the resolved step and keep going
        #[arg(long = "continue", conflicts_with = "abort")]
        continue_: bool,

        /// Restore the branch as it was before the rebase
        #[arg(long)]
        abort: bool,
    },

    /// Show the rebase in progress, if any
    #[command(alias = "st")]
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}
