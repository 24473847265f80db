//! `graft rebase` command - Replay commits onto a new base.
//!
//! Stops on conflicts and leaves the state on disk so the rebase can be
//! resumed with `--continue` or rolled back with `--abort`.

use anyhow::{Context, Result, bail};
use graft_core::{Config, RebaseOptions, RebaseResult, RebaseStatus, Rebaser, State};
use graft_git::Repository;
use tracing::debug;

use crate::commands::utils;
use crate::output::{self, StepProgress};

/// Options for the rebase command.
#[derive(Debug)]
#[allow(clippy::struct_excessive_bools)] // CLI options map directly to flags
pub struct RebaseArgs<'a> {
    pub json: bool,
    pub upstream: Option<&'a str>,
    pub onto: Option<&'a str>,
    pub branch: Option<&'a str>,
    pub max_steps: Option<usize>,
    pub force_rewrite: bool,
    pub continue_: bool,
    pub abort: bool,
}

/// Run the rebase command.
pub fn run(args: &RebaseArgs<'_>) -> Result<()> {
    let (repo, state, config) = utils::open_repo_and_state()?;
    let rebaser = Rebaser::new(&repo, &state);

    // Check for conflicting flags
    if args.continue_ && args.abort {
        bail!("Cannot use --continue and --abort together");
    }

    // Handle abort
    if args.abort {
        rebaser.abort(&config.checkout_options())?;
        if args.json {
            let output = serde_json::json!({ "status": "aborted" });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            output::success("Rebase aborted - branch restored");
        }
        return Ok(());
    }

    let committer = repo
        .signature()
        .context("Set user.name and user.email to create commits")?;

    // Handle continue
    if args.continue_ {
        let Some(current) = rebaser.state()? else {
            bail!("No rebase in progress to continue");
        };
        if !args.json {
            output::info("Continuing rebase...");
        }

        let mut progress = StepProgress::new(
            &repo,
            current.next_index(),
            current.total_step_count(),
            args.json,
        );
        let mut options = engine_options(&config, args).with_observer(&mut progress);
        let result = rebaser.continue_rebase(&committer, &mut options);
        drop(options);
        progress.finish();
        return handle_result(&repo, &state, &result?, args.json);
    }

    // Check for existing rebase in progress
    if state.is_rebase_in_progress() {
        bail!("Rebase already in progress - use --continue to resume or --abort to cancel");
    }

    let Some(upstream) = args.upstream else {
        bail!("Missing <UPSTREAM> - the branch or commit to rebase onto");
    };
    let plan = rebaser.plan(args.branch, upstream, args.onto)?;

    if !args.json {
        let target = args.onto.unwrap_or(upstream);
        let branch = plan.snapshot().branch.as_deref().unwrap_or("HEAD");
        output::info(&format!(
            "Rebasing '{branch}' onto '{target}' ({} commit(s))...",
            plan.len()
        ));
    }

    let mut progress = StepProgress::new(&repo, 0, plan.len(), args.json);
    let mut options = engine_options(&config, args).with_observer(&mut progress);
    let result = rebaser.start_plan(plan, &committer, &mut options);
    drop(options);
    progress.finish();
    handle_result(&repo, &state, &result?, args.json)
}

/// Engine options: config values, overridden by flags.
fn engine_options<'a>(config: &Config, args: &RebaseArgs<'_>) -> RebaseOptions<'a> {
    let mut options = RebaseOptions::from_config(config);
    options.max_steps = args.max_steps;
    options.force_rewrite |= args.force_rewrite;
    options
}

/// Report the outcome of a start or continue.
fn handle_result(repo: &Repository, state: &State, result: &RebaseResult, json: bool) -> Result<()> {
    debug!(
        status = ?result.status,
        completed = result.completed_steps,
        total = result.total_steps,
        "rebase returned"
    );
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    }

    match result.status {
        RebaseStatus::Complete => {
            if !json {
                output::success(&format!(
                    "Rebased {} commit(s) - now on {}",
                    result.total_steps,
                    describe_head(repo)
                ));
            }
            Ok(())
        }
        RebaseStatus::Stop => {
            if !json {
                output::info(&format!(
                    "Paused after {} of {} step(s)",
                    result.completed_steps, result.total_steps
                ));
                output::detail("  Resume with: graft rebase --continue");
            }
            Ok(())
        }
        RebaseStatus::Conflicts => {
            if !json {
                output_conflict(repo, result);
                output::detail(&format!(
                    "  (state kept in {})",
                    state.graft_dir().join("rebase.json").display()
                ));
            }
            bail!("Rebase conflict - resolve and run `graft rebase --continue`");
        }
    }
}

/// Output conflict information
fn output_conflict(repo: &Repository, result: &RebaseResult) {
    let step = result.current_step.as_ref();
    let summary = step
        .and_then(|s| s.commit())
        .and_then(|oid| repo.commit_summary(oid).ok());
    match step {
        Some(step) => output::error(&format!(
            "Could not apply {}",
            output::step_line(step, summary.as_deref())
        )),
        None => output::error("Rebase conflict detected"),
    }
    output::detail("Resolve conflicts, then run:");
    output::detail("  git add <resolved-files>");
    output::detail("  graft rebase --continue");
    output::detail("");
    output::detail("Or abort and restore with:");
    output::detail("  graft rebase --abort");
    if !result.conflicts.is_empty() {
        output::hr();
        output::detail("Conflicting files:");
        for file in &result.conflicts {
            output::detail(&format!("  {file}"));
        }
    }
}

fn describe_head(repo: &Repository) -> String {
    match repo.current_branch() {
        Ok(branch) => format!("'{branch}'"),
        Err(_) => repo
            .head_commit()
            .map_or_else(|_| "HEAD".to_string(), utils::short),
    }
}
