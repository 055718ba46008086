use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

const MARKER_FILE: &str = ".sandcastle";

/// The sandbox picked with `sandcastle use <name>` for one working directory.
///
/// Stored as a single-line marker file. Commands receive the value read at
/// startup rather than consulting the file themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSandbox {
    path: PathBuf,
}

impl ActiveSandbox {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(MARKER_FILE),
        }
    }

    pub fn current_dir() -> Result<Self> {
        let dir = std::env::current_dir().context("Failed to determine working directory")?;
        Ok(Self::in_dir(&dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The recorded name, if the marker exists and is non-empty.
    pub fn read(&self) -> Option<String> {
        let content = fs::read_to_string(&self.path).ok()?;
        let name = content.lines().next().unwrap_or_default().trim();
        if name.is_empty() {
            None
        } else {
            debug!(name, "active sandbox marker found");
            Some(name.to_string())
        }
    }

    pub fn write(&self, name: &str) -> Result<()> {
        fs::write(&self.path, format!("{}\n", name.trim()))
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

/// Pick the explicit argument, else the active sandbox.
pub fn resolve_sandbox_name(arg: Option<String>, active: Option<&str>) -> Option<String> {
    arg.filter(|n| !n.trim().is_empty())
        .or_else(|| active.map(str::to_string))
}
