//! Terminal output formatting utilities.

use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use graft_core::{RebaseObserver, RebaseStep};
use graft_git::{GitOps, Oid};
use indicatif::{ProgressBar, ProgressStyle};

static QUIET_MODE: AtomicBool = AtomicBool::new(false);

/// Set quiet mode globally. Call once at startup.
pub fn set_quiet(quiet: bool) {
    QUIET_MODE.store(quiet, Ordering::Relaxed);
}

fn is_quiet() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

/// Print a success message (suppressed in quiet mode).
pub fn success(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "✓".green(), msg);
    }
}

/// Print an error message (always prints to stderr).
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a warning message (always prints to stderr).
pub fn warn(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Print an info message (suppressed in quiet mode).
pub fn info(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "→".blue(), msg);
    }
}

/// Print a detail line without prefix (suppressed in quiet mode).
///
/// Use for indented detail lines that accompany info or warn messages.
pub fn detail(msg: &str) {
    if !is_quiet() {
        println!("{msg}");
    }
}

/// Print a horizontal line (suppressed in quiet mode).
pub fn hr() {
    if !is_quiet() {
        println!("{}", "─".repeat(50).dimmed());
    }
}

/// One-line description of a step: kind, short id, summary.
#[must_use]
pub fn step_line(step: &RebaseStep, summary: Option<&str>) -> String {
    let position = format!("[{}/{}]", step.index() + 1, step.total()).dimmed();
    let target = match (step.commit(), step.exec_command()) {
        (Some(oid), _) => oid.to_string().chars().take(8).collect::<String>().yellow().to_string(),
        (None, Some(cmd)) => cmd.to_string(),
        (None, None) => String::new(),
    };
    match summary {
        Some(summary) => format!("{position} {} {target} {summary}", step.operation()),
        None => format!("{position} {} {target}", step.operation()),
    }
}

/// Progress bar over the steps of a rebase, fed by the engine's callbacks.
pub struct StepProgress<'r, G: GitOps> {
    bar: ProgressBar,
    repo: &'r G,
}

impl<'r, G: GitOps> StepProgress<'r, G> {
    /// A bar of `total` steps starting at `completed`; hidden in quiet or
    /// JSON mode.
    pub fn new(repo: &'r G, completed: usize, total: usize, hidden: bool) -> Self {
        let bar = if hidden || is_quiet() {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX))
        };
        if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {pos}/{len} {wide_msg}") {
            bar.set_style(style);
        }
        bar.set_position(u64::try_from(completed).unwrap_or(u64::MAX));
        Self { bar, repo }
    }

    /// Remove the bar so regular output follows cleanly.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl<G: GitOps> RebaseObserver for StepProgress<'_, G> {
    fn on_step_starting(&mut self, step: &RebaseStep) {
        let summary = step.commit().and_then(|oid| self.repo.commit_summary(oid).ok());
        self.bar.set_message(step_line(step, summary.as_deref()));
    }

    fn on_step_completed(&mut self, step: &RebaseStep, produced: Option<Oid>) {
        self.bar.inc(1);
        if produced.is_none() {
            self.bar
                .println(format!("  {} already applied", step_line(step, None)));
        }
    }
}
