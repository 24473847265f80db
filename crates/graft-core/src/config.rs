//! Configuration management for graft.

use std::fs;
use std::path::Path;

use graft_git::{CheckoutOptions, ConflictStyle};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Graft configuration loaded from .git/graft/config.toml.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Rebase settings.
    #[serde(default)]
    pub rebase: RebaseConfig,
}

impl Config {
    /// Load config from a TOML file.
    ///
    /// # Errors
    /// Returns error if file can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to a TOML file.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| std::io::Error::other(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Checkout options derived from the rebase settings.
    #[must_use]
    pub fn checkout_options(&self) -> CheckoutOptions {
        CheckoutOptions {
            conflict_style: self.rebase.conflict_style,
            ..CheckoutOptions::default()
        }
    }
}

/// Rebase settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseConfig {
    /// Marker style for conflicted files.
    #[serde(default)]
    pub conflict_style: ConflictStyle,

    /// Always write new commits, even when a pick could fast-forward.
    #[serde(default)]
    pub force_rewrite: bool,

    /// fsync rebase state on every write.
    #[serde(default = "default_durable_writes")]
    pub durable_writes: bool,
}

impl Default for RebaseConfig {
    fn default() -> Self {
        Self {
            conflict_style: ConflictStyle::default(),
            force_rewrite: false,
            durable_writes: default_durable_writes(),
        }
    }
}

const fn default_durable_writes() -> bool {
    true
}
