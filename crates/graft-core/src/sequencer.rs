//! Drives the step loop of an open rebase to its next stopping point.

use std::cmp::Ordering;

use graft_git::{GitOps, Signature};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::executor::StepExecutor;
use crate::handle::RebaseHandle;
use crate::observer::RebaseOptions;
use crate::result::{RebaseResult, StepResult};
use crate::step::RebaseStep;
use crate::traits::StateStore;

#[derive(Debug)]
enum SequencerPhase {
    SelectingNext,
    ApplyingStep(usize),
    HaltedOnConflict(RebaseStep, Vec<String>),
    Finishing,
}

/// Run steps until the rebase finishes, conflicts, or the step budget in
/// `options` runs out.
///
/// The handle's persisted cursor is the only cursor. An error leaves it
/// where it was before the failing step, with the step's partial changes
/// discarded so it is applied again on the next run.
pub(crate) fn run<G: GitOps, S: StateStore>(
    mut handle: RebaseHandle<'_, G, S>,
    committer: &Signature<'_>,
    options: &mut RebaseOptions<'_>,
) -> Result<RebaseResult> {
    let executor = StepExecutor::new(handle.repo(), options);
    let mut applied = 0usize;
    let mut phase = SequencerPhase::SelectingNext;

    loop {
        phase = match phase {
            SequencerPhase::SelectingNext => {
                let next = handle.next_index();
                let total = handle.total_step_count();
                match next.cmp(&total) {
                    Ordering::Less if options.max_steps.is_some_and(|max| applied >= max) => {
                        info!(applied, remaining = total - next, "step budget reached");
                        return Ok(RebaseResult::stopped(
                            next,
                            total,
                            handle.current_step().cloned(),
                        ));
                    }
                    Ordering::Less => SequencerPhase::ApplyingStep(next),
                    Ordering::Equal => SequencerPhase::Finishing,
                    Ordering::Greater => {
                        return Err(Error::desync(format!(
                            "cursor at {next} beyond {total} steps"
                        )));
                    }
                }
            }

            SequencerPhase::ApplyingStep(index) => {
                handle.begin_step(index)?;
                let step = handle.step_at(index)?.clone();
                options.notify_starting(&step);

                let outcome = match executor.execute(&step, committer) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        if let Err(rollback) = handle.abandon_step(index, &options.checkout) {
                            warn!(%step, error = %rollback, "could not roll back failed step");
                        }
                        return Err(err);
                    }
                };
                match outcome {
                    StepResult::Conflicts(paths) => SequencerPhase::HaltedOnConflict(step, paths),
                    result => {
                        handle.complete_step(index)?;
                        debug!(%step, produced = ?result.produced_commit(), "step applied");
                        options.notify_completed(&step, result.produced_commit());
                        applied += 1;
                        SequencerPhase::SelectingNext
                    }
                }
            }

            SequencerPhase::HaltedOnConflict(step, conflicts) => {
                info!(%step, conflicts = conflicts.len(), "rebase stopped on conflicts");
                return Ok(RebaseResult::conflicts(step, conflicts));
            }

            SequencerPhase::Finishing => {
                let total = handle.total_step_count();
                handle.finish(committer)?;
                return Ok(RebaseResult::complete(total));
            }
        };
        debug!(?phase, "sequencer transition");
    }
}
