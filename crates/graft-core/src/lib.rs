//! # graft-core
//!
//! Resumable rebase engine for graft.
//! Replays a branch's commits onto a new base one step at a time, persisting
//! progress under `.git/graft/` so a rebase halted on conflicts can be
//! continued or aborted from a later process.

mod config;
mod error;
mod executor;
mod handle;
mod observer;
mod plan;
mod rebase;
mod result;
mod sequencer;
mod serde_oid;
mod state;
mod step;
mod traits;

#[cfg(test)]
mod test_mocks;

pub use config::{Config, RebaseConfig};
pub use error::{Error, Result};
pub use executor::StepExecutor;
pub use handle::RebaseHandle;
pub use observer::{RebaseObserver, RebaseOptions, StepEvent};
pub use plan::{RebasePlan, TodoEntry};
pub use rebase::Rebaser;
pub use result::{RebaseResult, RebaseStatus, StepResult};
pub use state::{RebaseState, Snapshot, State};
pub use step::{RebaseStep, StepOperation};
pub use traits::StateStore;
