//! On-disk locations of the two storage areas.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "BAINIAN_HOME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    /// `--home`, then `$BAINIAN_HOME`, then the platform data directory.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        let from_env = std::env::var_os(HOME_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        if let Some(root) = explicit.or(from_env) {
            return Ok(Self::from_root(root));
        }
        let dirs = directories::ProjectDirs::from("com.local", "BaiNian", "BaiNian")
            .context("could not determine a home directory; set BAINIAN_HOME")?;
        Ok(Self::from_root(dirs.data_dir()))
    }

    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Synced area: settings.
    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    /// Local area: history.
    pub fn history_file(&self) -> PathBuf {
        self.root.join("history.json")
    }
}
