//! Checkout options passed through to libgit2.

use git2::build::CheckoutBuilder;
use serde::{Deserialize, Serialize};

/// How checkout treats files that differ from the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStrategy {
    /// Refuse to overwrite local modifications.
    #[default]
    Safe,
    /// Overwrite anything in the way.
    Force,
}

/// Marker layout written into conflicted files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStyle {
    /// `<<<<<<<` ours / `>>>>>>>` theirs.
    #[default]
    Merge,
    /// Also includes the common ancestor section.
    Diff3,
}

/// Options handed to every checkout the rebase performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutOptions {
    /// Overwrite behaviour.
    #[serde(default)]
    pub strategy: CheckoutStrategy,
    /// Conflict marker style.
    #[serde(default)]
    pub conflict_style: ConflictStyle,
}

impl CheckoutOptions {
    /// Build a git2 checkout builder for these options.
    ///
    /// Conflicts are always allowed so a conflicted merge can still be
    /// written to the working directory for the user to resolve.
    #[must_use]
    pub fn builder(&self) -> CheckoutBuilder<'static> {
        let mut builder = CheckoutBuilder::new();
        match self.strategy {
            CheckoutStrategy::Safe => builder.safe(),
            CheckoutStrategy::Force => builder.force(),
        };
        match self.conflict_style {
            ConflictStyle::Merge => builder.conflict_style_merge(true),
            ConflictStyle::Diff3 => builder.conflict_style_diff3(true),
        };
        builder.allow_conflicts(true);
        builder
    }

    /// Same options with the force strategy, used for restoring snapshots.
    #[must_use]
    pub const fn forced(self) -> Self {
        Self {
            strategy: CheckoutStrategy::Force,
            conflict_style: self.conflict_style,
        }
    }
}
