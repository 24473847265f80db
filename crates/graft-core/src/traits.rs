//! Trait abstractions for state storage operations.
//!
//! This module defines the `StateStore` trait which abstracts state persistence,
//! enabling dependency injection and testability.

use crate::Result;
use crate::state::RebaseState;

/// Trait for state storage operations.
///
/// This trait abstracts state persistence, allowing for:
/// - Dependency injection in the rebase engine
/// - Mock implementations for testing
/// - Alternative implementations (e.g., in-memory state)
#[allow(clippy::missing_errors_doc)]
pub trait StateStore {
    /// Check if a rebase is in progress.
    fn is_rebase_in_progress(&self) -> bool;

    /// Load the current rebase state.
    fn load_rebase_state(&self) -> Result<RebaseState>;

    /// Save rebase state (called after every cursor change).
    fn save_rebase_state(&self, state: &RebaseState) -> Result<()>;

    /// Clear rebase state (called when a rebase finishes or aborts).
    fn clear_rebase_state(&self) -> Result<()>;
}
