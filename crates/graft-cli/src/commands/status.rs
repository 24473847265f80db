//! `graft status` command - Display the rebase in progress.

use anyhow::Result;
use colored::Colorize;
use graft_core::{RebaseState, RebaseStep, Rebaser};
use graft_git::Repository;
use serde::Serialize;

use crate::commands::utils;
use crate::output;

/// JSON output for status command.
#[derive(Debug, Serialize)]
struct StatusOutput {
    in_progress: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    onto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<String>,
    completed_steps: usize,
    total_steps: usize,
    current_step: Option<RebaseStep>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    conflicts: Vec<String>,
}

impl StatusOutput {
    const fn idle() -> Self {
        Self {
            in_progress: false,
            branch: None,
            onto: None,
            started_at: None,
            completed_steps: 0,
            total_steps: 0,
            current_step: None,
            conflicts: Vec::new(),
        }
    }

    fn from_state(state: &RebaseState, conflicts: Vec<String>) -> Self {
        Self {
            in_progress: true,
            branch: state.snapshot.branch.clone(),
            onto: Some(state.snapshot.onto.to_string()),
            started_at: Some(state.started_at.to_rfc3339()),
            completed_steps: state.next_index(),
            total_steps: state.total_step_count(),
            current_step: state.current_step().cloned(),
            conflicts,
        }
    }
}

/// Run the status command.
pub fn run(json: bool) -> Result<()> {
    let (repo, state, _config) = utils::open_repo_and_state()?;
    let rebaser = Rebaser::new(&repo, &state);

    let Some(current) = rebaser.state()? else {
        if json {
            println!("{}", serde_json::to_string_pretty(&StatusOutput::idle())?);
        } else {
            output::info("No rebase in progress");
        }
        return Ok(());
    };

    let conflicts = repo.conflicting_files()?;
    if json {
        let output = StatusOutput::from_state(&current, conflicts);
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_status(&repo, &current, &conflicts);
    }

    Ok(())
}

fn print_status(repo: &Repository, state: &RebaseState, conflicts: &[String]) {
    let branch = state.snapshot.branch.as_deref().unwrap_or("(detached HEAD)");

    println!();
    println!(
        "  {} {} onto {}",
        "Rebasing".bold(),
        branch.cyan(),
        utils::short(state.snapshot.onto).yellow()
    );
    output::hr();

    for step in state.steps() {
        let summary = step
            .commit()
            .and_then(|oid| repo.commit_summary(oid).ok());
        let marker = if state.in_progress() == Some(step.index()) {
            "▶".red().to_string()
        } else if step.index() < state.next_index() {
            "✓".green().to_string()
        } else {
            " ".to_string()
        };
        println!("  {marker} {}", output::step_line(step, summary.as_deref()));
    }

    output::hr();
    output::detail(&format!(
        "  {} of {} step(s) applied",
        state.next_index(),
        state.total_step_count()
    ));

    if !conflicts.is_empty() {
        output::warn("Unresolved conflicts:");
        for file in conflicts {
            output::detail(&format!("  {file}"));
        }
        output::detail("  Resolve them, `git add`, then run: graft rebase --continue");
    } else if state.in_progress().is_some() {
        output::detail("  Conflicts resolved - run: graft rebase --continue");
    }
    println!();
}
