//! # graft-git
//!
//! Git substrate for graft, built on git2-rs.
//! Provides the commit lookup, checkout, cherry-pick and commit-creation
//! primitives the rebase engine drives, plus the per-repository flag that
//! keeps stateful operations mutually exclusive.

mod apply;
mod checkout;
mod error;
mod operation;
mod repository;
mod traits;

pub use apply::{CommitOutcome, Materialized};
pub use checkout::{CheckoutOptions, CheckoutStrategy, ConflictStyle};
pub use error::{Error, Result};
pub use git2::{Oid, Signature};
pub use operation::{OperationFlag, OperationGuard, SequenceOperation};
pub use repository::Repository;
pub use traits::GitOps;
