//! Progress notifications and per-invocation options.

use std::fmt;

use graft_git::{CheckoutOptions, Oid};

use crate::config::Config;
use crate::step::RebaseStep;

/// Receives synchronous progress callbacks from the sequencer.
///
/// Each step fires `on_step_starting` once when it is materialized and
/// `on_step_completed` once when it is committed or found already applied.
/// A step halted on conflicts completes on a later `continue`.
pub trait RebaseObserver {
    /// A step is about to be applied.
    fn on_step_starting(&mut self, _step: &RebaseStep) {}

    /// A step finished. `produced` is the new commit, or `None` when the
    /// changes were already present.
    fn on_step_completed(&mut self, _step: &RebaseStep, _produced: Option<Oid>) {}
}

/// A recorded callback, for callers that just want the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    Starting(RebaseStep),
    Completed(RebaseStep, Option<Oid>),
}

impl RebaseObserver for Vec<StepEvent> {
    fn on_step_starting(&mut self, step: &RebaseStep) {
        self.push(StepEvent::Starting(step.clone()));
    }

    fn on_step_completed(&mut self, step: &RebaseStep, produced: Option<Oid>) {
        self.push(StepEvent::Completed(step.clone(), produced));
    }
}

/// Options for one start or continue invocation.
#[derive(Default)]
pub struct RebaseOptions<'a> {
    /// Passed unchanged to every checkout.
    pub checkout: CheckoutOptions,

    /// Progress callbacks.
    pub observer: Option<&'a mut dyn RebaseObserver>,

    /// Stop after applying this many steps, leaving the rest for a later
    /// continue.
    pub max_steps: Option<usize>,

    /// Never fast-forward over commits that already sit on the new base.
    pub force_rewrite: bool,
}

impl<'a> RebaseOptions<'a> {
    /// Options seeded from the repository's config.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            checkout: config.checkout_options(),
            force_rewrite: config.rebase.force_rewrite,
            ..Self::default()
        }
    }

    /// Attach an observer.
    #[must_use]
    pub fn with_observer(mut self, observer: &'a mut dyn RebaseObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub(crate) fn notify_starting(&mut self, step: &RebaseStep) {
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.on_step_starting(step);
        }
    }

    pub(crate) fn notify_completed(&mut self, step: &RebaseStep, produced: Option<Oid>) {
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.on_step_completed(step, produced);
        }
    }
}

impl fmt::Debug for RebaseOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RebaseOptions")
            .field("checkout", &self.checkout)
            .field("observer", &self.observer.is_some())
            .field("max_steps", &self.max_steps)
            .field("force_rewrite", &self.force_rewrite)
            .finish()
    }
}
